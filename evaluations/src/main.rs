mod args;
mod gate;
mod metrics;
mod report;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _ = fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let config = args::parse();

    let records = metrics::read_records(config.runs_path.as_path())
        .await
        .with_context(|| format!("reading run records from {}", config.runs_path.display()))?;
    info!(runs = records.len(), "Loaded run records");

    let mut computed = metrics::compute_metrics(&records, config.recall_depth);
    let thresholds = config.thresholds();
    let outcome = thresholds.evaluate(&computed);
    computed.promoted = outcome.promoted;

    let paths = report::write_reports(
        &computed,
        &outcome,
        &records,
        config.report_dir.as_path(),
        &config.label,
    )
    .await
    .with_context(|| format!("writing reports to {}", config.report_dir.display()))?;

    println!(
        "[{}] precision {:.3} | recall {:.3} | F1 {:.3} | faithfulness {:.3} | unsupported {:.1}% → {} (JSON: {}, Markdown: {})",
        config.label,
        computed.precision,
        computed.recall,
        computed.f1,
        computed.faithfulness,
        computed.unsupported_percent,
        if outcome.promoted {
            "PROMOTED"
        } else {
            "not promoted"
        },
        paths.json.display(),
        paths.markdown.display(),
    );

    if !outcome.promoted {
        for violation in &outcome.violations {
            println!("  floor violated: {violation}");
        }
        std::process::exit(1);
    }

    Ok(())
}
