use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::text::{extract_entities, extract_numbers};

/// Why a claim is held to the stricter support rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    None,
    Numeric,
    Entity,
    NumericEntity,
}

impl RiskClass {
    pub const fn is_risky(self) -> bool {
        !matches!(self, RiskClass::None)
    }

    pub const fn requires_numeric_evidence(self) -> bool {
        matches!(self, RiskClass::Numeric | RiskClass::NumericEntity)
    }

    pub const fn requires_entity_evidence(self) -> bool {
        matches!(self, RiskClass::Entity | RiskClass::NumericEntity)
    }

    /// Ordering used when reinstating dropped claims: lowest risk first.
    pub const fn rank(self) -> u8 {
        match self {
            RiskClass::None => 0,
            RiskClass::Entity => 1,
            RiskClass::Numeric => 2,
            RiskClass::NumericEntity => 3,
        }
    }
}

/// A sentence extracted from a draft answer, subject to verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub text: String,
    /// Sentence index within the draft, for stable output ordering.
    pub position: usize,
    pub risk: RiskClass,
    /// Normalized numbers found in the sentence, cached for binding.
    pub numbers: Vec<String>,
    /// Entity strings found in the sentence, cached for binding.
    pub entities: Vec<String>,
}

impl Claim {
    pub fn new(text: impl Into<String>, position: usize) -> Self {
        let text = text.into();
        let numbers = extract_numbers(&text);
        let entities = extract_entities(&text);
        let risk = match (numbers.is_empty(), entities.is_empty()) {
            (false, false) => RiskClass::NumericEntity,
            (false, true) => RiskClass::Numeric,
            (true, false) => RiskClass::Entity,
            (true, true) => RiskClass::None,
        };
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            position,
            risk,
            numbers,
            entities,
        }
    }

    pub fn is_risky(&self) -> bool {
        self.risk.is_risky()
    }
}

/// The four independent signals tying a claim to a candidate.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SignalScores {
    pub jaccard: f32,
    pub coverage: f32,
    pub cosine: f32,
    pub rouge: f32,
}

/// A scored claim/candidate pair. Links are only ever built against the
/// fused list of the same pipeline run and are dropped once the support
/// decision is made; only links bound as evidence survive into the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceLink {
    pub claim_id: String,
    /// Index of the candidate within the run's fused list.
    pub candidate_index: usize,
    pub doc_id: String,
    pub chunk_id: String,
    pub is_anchor: bool,
    pub signals: SignalScores,
    /// Weighted blend used for ranking and redundancy tie-breaks.
    pub confidence: f32,
}

impl EvidenceLink {
    pub fn chunk_key(&self) -> String {
        format!("{}:{}", self.doc_id, self.chunk_id)
    }
}

/// Outcome of binding a claim to evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportDecision {
    Keep,
    /// Retained in the answer but flagged low-confidence.
    SoftDrop,
    /// Removed from the composed answer entirely.
    HardDrop,
}

impl SupportDecision {
    pub const fn retained(self) -> bool {
        !matches!(self, SupportDecision::HardDrop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_classification_from_sentence_content() {
        let numeric = Claim::new("Throughput rose by 12% in 2024.", 0);
        assert_eq!(numeric.risk, RiskClass::Numeric);
        assert!(numeric.is_risky());

        let entity = Claim::new("The fix landed in the Hyperion Gateway release.", 1);
        assert_eq!(entity.risk, RiskClass::Entity);

        let both = Claim::new("Review by Project Atlas found 3 regressions.", 2);
        assert_eq!(both.risk, RiskClass::NumericEntity);
        assert!(both.risk.requires_numeric_evidence());
        assert!(both.risk.requires_entity_evidence());

        let plain = Claim::new("the latency numbers looked fine afterwards.", 3);
        assert_eq!(plain.risk, RiskClass::None);
        assert!(!plain.is_risky());
    }

    #[test]
    fn reinstatement_rank_orders_by_risk() {
        assert!(RiskClass::None.rank() < RiskClass::Entity.rank());
        assert!(RiskClass::Entity.rank() < RiskClass::Numeric.rank());
        assert!(RiskClass::Numeric.rank() < RiskClass::NumericEntity.rank());
    }
}
