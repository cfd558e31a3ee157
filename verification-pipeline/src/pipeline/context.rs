use std::time::Duration;

use common::{
    config::PipelineTuning,
    types::{BoundClaim, Claim, ComposedAnswer, EvidenceLink, FusedList},
};

pub use crate::signals::ClaimEmbedder;

/// Stage labels for logging and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStage {
    ExtractClaims,
    ScoreLinks,
    SelectEvidence,
    Bind,
    Deduplicate,
    Compose,
}

impl VerifyStage {
    pub const fn label(self) -> &'static str {
        match self {
            VerifyStage::ExtractClaims => "extract_claims",
            VerifyStage::ScoreLinks => "score_links",
            VerifyStage::SelectEvidence => "select_evidence",
            VerifyStage::Bind => "bind",
            VerifyStage::Deduplicate => "deduplicate",
            VerifyStage::Compose => "compose",
        }
    }
}

/// Working state of one verification run. The scored links live only in
/// this context and are cleared once support decisions exist, so link
/// arenas never accumulate across runs.
pub struct VerificationContext<'a> {
    pub query_id: &'a str,
    pub draft: &'a str,
    pub fused: &'a FusedList,
    pub tuning: &'a PipelineTuning,
    pub embedder: Option<ClaimEmbedder<'a>>,
    pub claims: Vec<Claim>,
    pub links: Vec<Vec<EvidenceLink>>,
    pub selected: Vec<Vec<EvidenceLink>>,
    pub bound: Vec<BoundClaim>,
    pub answer: Option<ComposedAnswer>,
    stage_timings: Vec<(VerifyStage, Duration)>,
}

impl<'a> VerificationContext<'a> {
    pub fn new(
        query_id: &'a str,
        draft: &'a str,
        fused: &'a FusedList,
        tuning: &'a PipelineTuning,
        embedder: Option<ClaimEmbedder<'a>>,
    ) -> Self {
        Self {
            query_id,
            draft,
            fused,
            tuning,
            embedder,
            claims: Vec::new(),
            links: Vec::new(),
            selected: Vec::new(),
            bound: Vec::new(),
            answer: None,
            stage_timings: Vec::new(),
        }
    }

    pub fn record_stage_duration(&mut self, stage: VerifyStage, duration: Duration) {
        self.stage_timings.push((stage, duration));
    }

    pub fn stage_timings(&self) -> &[(VerifyStage, Duration)] {
        &self.stage_timings
    }

    pub fn into_answer(self) -> Option<ComposedAnswer> {
        self.answer
    }
}
