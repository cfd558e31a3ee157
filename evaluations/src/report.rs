//! Report writing: a JSON record for tooling, a Markdown summary for
//! humans, and a JSONL mirror of the evaluated runs for audit.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tokio::io::AsyncWriteExt;

use crate::{
    gate::GateOutcome,
    metrics::{RunMetrics, RunRecord},
};

pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
    pub runs: PathBuf,
}

pub async fn write_reports(
    metrics: &RunMetrics,
    outcome: &GateOutcome,
    records: &[RunRecord],
    report_dir: &Path,
    label: &str,
) -> Result<ReportPaths> {
    tokio::fs::create_dir_all(report_dir)
        .await
        .with_context(|| format!("creating report directory {}", report_dir.display()))?;

    let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let paths = ReportPaths {
        json: report_dir.join(format!("{label}.json")),
        markdown: report_dir.join(format!("{label}.md")),
        runs: report_dir.join(format!("{label}.runs.jsonl")),
    };

    let record = json!({
        "generated_at": stamp,
        "label": label,
        "metrics": metrics,
        "promoted": outcome.promoted,
        "violations": outcome.violations,
    });
    tokio::fs::write(
        &paths.json,
        serde_json::to_vec_pretty(&record).context("serialising report record")?,
    )
    .await
    .with_context(|| format!("writing {}", paths.json.display()))?;

    tokio::fs::write(&paths.markdown, render_markdown(metrics, outcome, label, &stamp))
        .await
        .with_context(|| format!("writing {}", paths.markdown.display()))?;

    let mut file = tokio::fs::File::create(&paths.runs)
        .await
        .with_context(|| format!("creating {}", paths.runs.display()))?;
    for record in records {
        let line = serde_json::to_vec(record).context("serialising run record")?;
        file.write_all(&line).await?;
        file.write_all(b"\n").await?;
    }
    file.flush().await?;

    Ok(paths)
}

fn render_markdown(
    metrics: &RunMetrics,
    outcome: &GateOutcome,
    label: &str,
    stamp: &str,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Evaluation report: {label}\n\n"));
    out.push_str(&format!("Generated {stamp} over {} runs.\n\n", metrics.runs));
    out.push_str("| metric | value |\n|---|---|\n");
    out.push_str(&format!("| precision | {:.3} |\n", metrics.precision));
    out.push_str(&format!("| recall | {:.3} |\n", metrics.recall));
    out.push_str(&format!("| f1 | {:.3} |\n", metrics.f1));
    out.push_str(&format!("| faithfulness | {:.3} |\n", metrics.faithfulness));
    out.push_str(&format!(
        "| unsupported | {:.1}% |\n",
        metrics.unsupported_percent
    ));
    out.push_str(&format!(
        "| anchor coverage | {:.3} |\n",
        metrics.anchor_coverage
    ));
    out.push_str(&format!("| fusion gain | {:.3} |\n", metrics.fusion_gain));
    out.push_str(&format!(
        "\n**{}**\n",
        if outcome.promoted {
            "Promoted"
        } else {
            "Not promoted"
        }
    ));
    for violation in &outcome.violations {
        out.push_str(&format!("\n- {violation}"));
    }
    out.push('\n');
    out
}
