use std::time::Instant;

use tracing::info;

use super::super::{
    context::{VerificationContext, VerifyStage},
    state::{ClaimsExtracted, Ready, VerificationMachine},
};
use super::{map_guard_error, StageResult};

pub(crate) fn extract_claims(
    machine: VerificationMachine<(), Ready>,
    ctx: &mut VerificationContext<'_>,
) -> StageResult<ClaimsExtracted> {
    let stage = VerifyStage::ExtractClaims;
    let started = Instant::now();

    ctx.claims = crate::claims::extract(ctx.draft);

    let elapsed = started.elapsed();
    ctx.record_stage_duration(stage, elapsed);
    info!(
        verification_stage = stage.label(),
        claims = ctx.claims.len(),
        risky = ctx.claims.iter().filter(|claim| claim.is_risky()).count(),
        duration_ms = elapsed.as_millis(),
        "completed verification stage"
    );

    machine
        .extract_claims()
        .map_err(|(_, guard)| map_guard_error("extract_claims", guard))
}
