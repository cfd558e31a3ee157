mod bind;
mod compose;
mod deduplicate;
mod extract_claims;
mod score_links;
mod select_evidence;

pub(crate) use bind::bind;
pub(crate) use compose::compose;
pub(crate) use deduplicate::deduplicate;
pub(crate) use extract_claims::extract_claims;
pub(crate) use score_links::score_links;
pub(crate) use select_evidence::select_evidence;

use anyhow::Result;
use state_machines::core::GuardError;

use super::state::VerificationMachine;

fn map_guard_error(event: &str, guard: GuardError) -> anyhow::Error {
    anyhow::anyhow!("invalid verification pipeline transition during {event}: {guard:?}")
}

type StageResult<S> = Result<VerificationMachine<(), S>>;
