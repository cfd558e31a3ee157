use serde::{Deserialize, Serialize};

use crate::text::word_count;

use super::claim::{Claim, EvidenceLink, SupportDecision};

/// A claim after binding: its decision, bound evidence and blended
/// confidence, plus whether the word floor reinstated it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundClaim {
    pub claim: Claim,
    pub decision: SupportDecision,
    pub evidence: Vec<EvidenceLink>,
    pub confidence: f32,
    #[serde(default)]
    pub reinstated: bool,
}

impl BoundClaim {
    pub fn retained(&self) -> bool {
        self.decision.retained()
    }

    /// Chunk keys of anchor evidence this claim cites.
    pub fn anchor_keys(&self) -> Vec<String> {
        self.evidence
            .iter()
            .filter(|link| link.is_anchor)
            .map(EvidenceLink::chunk_key)
            .collect()
    }
}

/// Terminal artifact of one pipeline run: the retained claims in draft
/// order with their evidence trace, plus audit aggregates. Serializable
/// for offline metrics computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedAnswer {
    pub query_id: String,
    /// Retained claims (kept and soft-dropped), in draft order.
    pub claims: Vec<BoundClaim>,
    /// Hard-dropped claims, preserved for the audit trace only.
    pub dropped: Vec<BoundClaim>,
    pub total_claims: usize,
    pub dropped_claims: usize,
    pub soft_flagged: usize,
    pub unique_anchors: usize,
    pub word_count: usize,
}

impl ComposedAnswer {
    /// Assemble from every bound claim of a run. Claims are re-sorted by
    /// draft position so output order never depends on processing order.
    pub fn compose(query_id: impl Into<String>, mut bound: Vec<BoundClaim>) -> Self {
        bound.sort_by_key(|entry| entry.claim.position);
        let total_claims = bound.len();

        let (retained, dropped): (Vec<BoundClaim>, Vec<BoundClaim>) =
            bound.into_iter().partition(BoundClaim::retained);

        let soft_flagged = retained
            .iter()
            .filter(|entry| entry.decision == SupportDecision::SoftDrop)
            .count();
        let words = retained
            .iter()
            .map(|entry| word_count(&entry.claim.text))
            .sum();

        let mut anchor_keys: Vec<String> = retained
            .iter()
            .flat_map(BoundClaim::anchor_keys)
            .collect();
        anchor_keys.sort();
        anchor_keys.dedup();

        Self {
            query_id: query_id.into(),
            dropped_claims: dropped.len(),
            total_claims,
            soft_flagged,
            unique_anchors: anchor_keys.len(),
            word_count: words,
            claims: retained,
            dropped,
        }
    }

    /// The answer text as handed back to the caller.
    pub fn text(&self) -> String {
        self.claims
            .iter()
            .map(|entry| entry.claim.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
