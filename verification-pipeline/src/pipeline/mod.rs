mod context;
mod stages;
mod state;

pub use context::{ClaimEmbedder, VerificationContext, VerifyStage};

use common::{
    config::PipelineTuning,
    error::AppError,
    types::{ComposedAnswer, FusedList},
};
use tracing::info;

/// Verify a draft answer against one run's fused evidence: extract
/// claims, score and select evidence, bind under the risk rules, control
/// redundancy, compose. Pure computation over in-memory data; a draft
/// nothing supports still composes a (near-empty) answer rather than
/// failing.
pub fn verify_draft(
    query_id: &str,
    draft: &str,
    fused: &FusedList,
    tuning: &PipelineTuning,
    embedder: Option<ClaimEmbedder<'_>>,
) -> Result<ComposedAnswer, AppError> {
    info!(
        query_id,
        draft_chars = draft.chars().count(),
        candidates = fused.len(),
        "Starting claim verification"
    );

    let mut ctx = VerificationContext::new(query_id, draft, fused, tuning, embedder);
    let machine = state::ready();

    let machine = stages::extract_claims(machine, &mut ctx)?;
    let machine = stages::score_links(machine, &mut ctx)?;
    let machine = stages::select_evidence(machine, &mut ctx)?;
    let machine = stages::bind(machine, &mut ctx)?;
    let machine = stages::deduplicate(machine, &mut ctx)?;
    let machine = stages::compose(machine, &mut ctx)?;

    drop(machine);

    ctx.into_answer().ok_or_else(|| {
        AppError::InternalError("verification finished without a composed answer".to_string())
    })
}
