use std::time::Instant;

use tracing::info;

use crate::redundancy;

use super::super::{
    context::{VerificationContext, VerifyStage},
    state::{Bound, Deduplicated, VerificationMachine},
};
use super::{map_guard_error, StageResult};

pub(crate) fn deduplicate(
    machine: VerificationMachine<(), Bound>,
    ctx: &mut VerificationContext<'_>,
) -> StageResult<Deduplicated> {
    let stage = VerifyStage::Deduplicate;
    let started = Instant::now();

    ctx.bound = redundancy::control_redundancy(std::mem::take(&mut ctx.bound), ctx.tuning);

    let elapsed = started.elapsed();
    ctx.record_stage_duration(stage, elapsed);
    info!(
        verification_stage = stage.label(),
        retained = ctx.bound.iter().filter(|entry| entry.retained()).count(),
        duration_ms = elapsed.as_millis(),
        "completed verification stage"
    );

    machine
        .deduplicate()
        .map_err(|(_, guard)| map_guard_error("deduplicate", guard))
}
