use std::time::Instant;

use tracing::info;

use crate::selector;

use super::super::{
    context::{VerificationContext, VerifyStage},
    state::{EvidenceSelected, LinksScored, VerificationMachine},
};
use super::{map_guard_error, StageResult};

pub(crate) fn select_evidence(
    machine: VerificationMachine<(), LinksScored>,
    ctx: &mut VerificationContext<'_>,
) -> StageResult<EvidenceSelected> {
    let stage = VerifyStage::SelectEvidence;
    let started = Instant::now();

    ctx.selected = ctx
        .links
        .iter()
        .map(|links| selector::select_evidence(links, ctx.tuning))
        .collect();

    let elapsed = started.elapsed();
    ctx.record_stage_duration(stage, elapsed);
    info!(
        verification_stage = stage.label(),
        bound_links = ctx.selected.iter().map(Vec::len).sum::<usize>(),
        duration_ms = elapsed.as_millis(),
        "completed verification stage"
    );

    machine
        .select_evidence()
        .map_err(|(_, guard)| map_guard_error("select_evidence", guard))
}
