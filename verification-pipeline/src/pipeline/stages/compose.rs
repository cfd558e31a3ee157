use std::time::Instant;

use common::types::ComposedAnswer;
use tracing::info;

use super::super::{
    context::{VerificationContext, VerifyStage},
    state::{Composed, Deduplicated, VerificationMachine},
};
use super::{map_guard_error, StageResult};

pub(crate) fn compose(
    machine: VerificationMachine<(), Deduplicated>,
    ctx: &mut VerificationContext<'_>,
) -> StageResult<Composed> {
    let stage = VerifyStage::Compose;
    let started = Instant::now();

    let answer = ComposedAnswer::compose(ctx.query_id, std::mem::take(&mut ctx.bound));

    let elapsed = started.elapsed();
    ctx.record_stage_duration(stage, elapsed);
    info!(
        verification_stage = stage.label(),
        total_claims = answer.total_claims,
        dropped_claims = answer.dropped_claims,
        unique_anchors = answer.unique_anchors,
        word_count = answer.word_count,
        duration_ms = elapsed.as_millis(),
        "completed verification stage"
    );
    ctx.answer = Some(answer);

    machine
        .compose()
        .map_err(|(_, guard)| map_guard_error("compose", guard))
}
