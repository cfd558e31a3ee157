mod corpus;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use common::{config::get_config, types::Query};
use retrieval_pipeline::{drafting, run_retrieval, InvocationQueue, OpenAiBackend, RetrievalDeps};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use verification_pipeline::verify_draft;

#[derive(Debug, Parser)]
#[command(
    name = "belagg",
    about = "Run one query through evidence-gated retrieval and claim verification"
)]
struct Args {
    /// The question to answer
    #[arg(long)]
    query: String,

    /// JSONL corpus of chunks standing in for the index collaborators
    #[arg(long)]
    corpus: PathBuf,

    /// Pre-written draft to verify; omitted means the model drafts one
    #[arg(long)]
    draft: Option<PathBuf>,

    /// Where the composed answer and its evidence trace are written
    #[arg(long, default_value = "answer.json")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    let config = get_config().context("loading configuration")?;
    let tuning = config.tuning();

    let chunks = corpus::load(&args.corpus)?;
    info!(chunks = chunks.len(), "Corpus loaded");
    let dense = corpus::DenseIndex::new(&chunks);
    let sparse = corpus::SparseIndex::new(&chunks);
    let anchors = corpus::AnchorTable::new(&chunks);

    let openai_client = async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    );
    let backend = Arc::new(OpenAiBackend::new(openai_client, &config.completion_model));
    let queue = InvocationQueue::new(backend, config.queue.clone());

    let query = Query::new(args.query.clone(), None);
    let run = run_retrieval(
        RetrievalDeps {
            dense: &dense,
            sparse: &sparse,
            anchors: &anchors,
            queue: &queue,
        },
        query.clone(),
        &tuning,
    )
    .await
    .context("running retrieval")?;
    info!(
        candidates = run.fused.len(),
        rewrites = run.rewrites_used,
        "Retrieval complete"
    );

    let draft = match &args.draft {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading draft {}", path.display()))?,
        None => drafting::generate_draft(&queue, &query, &run.fused)
            .await
            .context("drafting answer")?,
    };

    let embedder = |text: &str| Some(corpus::hashed_embedding(text));
    let answer = verify_draft(&query.id, &draft, &run.fused, &tuning, Some(&embedder))
        .context("verifying draft")?;

    std::fs::write(
        &args.out,
        serde_json::to_vec_pretty(&answer).context("serialising answer trace")?,
    )
    .with_context(|| format!("writing {}", args.out.display()))?;

    println!("{}", answer.text());
    println!(
        "claims kept {}/{} | unique anchors {} | words {} → trace {}",
        answer.claims.len(),
        answer.total_claims,
        answer.unique_anchors,
        answer.word_count,
        args.out.display()
    );

    Ok(())
}
