use std::time::Instant;

use tracing::info;

use crate::signals;

use super::super::{
    context::{VerificationContext, VerifyStage},
    state::{ClaimsExtracted, LinksScored, VerificationMachine},
};
use super::{map_guard_error, StageResult};

pub(crate) fn score_links(
    machine: VerificationMachine<(), ClaimsExtracted>,
    ctx: &mut VerificationContext<'_>,
) -> StageResult<LinksScored> {
    let stage = VerifyStage::ScoreLinks;
    let started = Instant::now();

    ctx.links = signals::score_all(&ctx.claims, ctx.fused, ctx.tuning, ctx.embedder);

    let elapsed = started.elapsed();
    ctx.record_stage_duration(stage, elapsed);
    info!(
        verification_stage = stage.label(),
        pairs = ctx.links.iter().map(Vec::len).sum::<usize>(),
        duration_ms = elapsed.as_millis(),
        "completed verification stage"
    );

    machine
        .score_links()
        .map_err(|(_, guard)| map_guard_error("score_links", guard))
}
