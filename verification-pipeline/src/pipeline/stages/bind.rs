use std::time::Instant;

use common::types::SupportDecision;
use tracing::info;

use crate::binder;

use super::super::{
    context::{VerificationContext, VerifyStage},
    state::{Bound, EvidenceSelected, VerificationMachine},
};
use super::{map_guard_error, StageResult};

pub(crate) fn bind(
    machine: VerificationMachine<(), EvidenceSelected>,
    ctx: &mut VerificationContext<'_>,
) -> StageResult<Bound> {
    let stage = VerifyStage::Bind;
    let started = Instant::now();

    ctx.bound = binder::bind_claims(&ctx.claims, &ctx.selected, ctx.fused, ctx.tuning);

    // The full link arena has served its purpose; only bound evidence
    // survives into the trace.
    ctx.links.clear();
    ctx.links.shrink_to_fit();

    let elapsed = started.elapsed();
    ctx.record_stage_duration(stage, elapsed);
    info!(
        verification_stage = stage.label(),
        kept = ctx
            .bound
            .iter()
            .filter(|entry| entry.decision == SupportDecision::Keep)
            .count(),
        soft_dropped = ctx
            .bound
            .iter()
            .filter(|entry| entry.decision == SupportDecision::SoftDrop)
            .count(),
        hard_dropped = ctx
            .bound
            .iter()
            .filter(|entry| entry.decision == SupportDecision::HardDrop)
            .count(),
        duration_ms = elapsed.as_millis(),
        "completed verification stage"
    );

    machine
        .bind()
        .map_err(|(_, guard)| map_guard_error("bind", guard))
}
