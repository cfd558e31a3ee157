//! Binds claims to their selected evidence and applies the
//! risk-differentiated support rules.

use std::cmp::Ordering;

use common::{
    config::PipelineTuning,
    text::{extract_numbers, word_count},
    types::{BoundClaim, Claim, EvidenceLink, FusedList, SupportDecision},
};
use tracing::debug;

use crate::signals::is_semantically_strong;

/// Decide keep / soft-drop / hard-drop for every claim.
///
/// Risky claims need all three signal families satisfied across their
/// bound evidence; numeric and entity claims additionally need the number
/// or entity repeated in multiple distinct evidence items. Non-risky
/// claims pass on two of three families. Afterwards the word floor
/// reinstates hard-dropped claims, lowest risk first, so filtering never
/// hollows out the answer.
pub fn bind_claims(
    claims: &[Claim],
    selected: &[Vec<EvidenceLink>],
    fused: &FusedList,
    tuning: &PipelineTuning,
) -> Vec<BoundClaim> {
    let mut bound: Vec<BoundClaim> = claims
        .iter()
        .zip(selected.iter())
        .map(|(claim, evidence)| decide(claim, evidence, fused, tuning))
        .collect();

    apply_word_floor(&mut bound, tuning);
    bound
}

fn decide(
    claim: &Claim,
    evidence: &[EvidenceLink],
    fused: &FusedList,
    tuning: &PipelineTuning,
) -> BoundClaim {
    let lexical = evidence
        .iter()
        .any(|link| link.signals.jaccard >= tuning.evidence_jaccard);
    let coverage = evidence
        .iter()
        .any(|link| link.signals.coverage >= tuning.evidence_coverage);
    let semantic = evidence
        .iter()
        .any(|link| is_semantically_strong(&link.signals, tuning));

    let satisfied = usize::from(lexical) + usize::from(coverage) + usize::from(semantic);
    let required = if claim.is_risky() { 3 } else { 2 };

    let numeric_ok = !claim.risk.requires_numeric_evidence()
        || corroborating_items(claim, evidence, fused, |claim, text| {
            let numbers = extract_numbers(text);
            claim.numbers.iter().any(|n| numbers.contains(n))
        }) >= tuning.multi_evidence_for_numeric;

    let entity_ok = !claim.risk.requires_entity_evidence()
        || corroborating_items(claim, evidence, fused, |claim, text| {
            let lowered = text.to_lowercase();
            claim
                .entities
                .iter()
                .any(|entity| lowered.contains(&entity.to_lowercase()))
        }) >= tuning.multi_evidence_for_entity;

    let supported = satisfied >= required && numeric_ok && entity_ok;
    let decision = if supported {
        SupportDecision::Keep
    } else if tuning.drop_unsupported {
        SupportDecision::HardDrop
    } else {
        SupportDecision::SoftDrop
    };

    if !supported {
        debug!(
            claim = claim.text.as_str(),
            satisfied,
            required,
            numeric_ok,
            entity_ok,
            "claim failed its support rule"
        );
    }

    let confidence = if evidence.is_empty() {
        0.0
    } else {
        evidence.iter().map(|link| link.confidence).sum::<f32>() / evidence.len() as f32
    };

    BoundClaim {
        claim: claim.clone(),
        decision,
        evidence: evidence.to_vec(),
        confidence,
        reinstated: false,
    }
}

/// Distinct evidence items whose candidate text corroborates the claim
/// under the given predicate.
fn corroborating_items(
    claim: &Claim,
    evidence: &[EvidenceLink],
    fused: &FusedList,
    matches: impl Fn(&Claim, &str) -> bool,
) -> usize {
    evidence
        .iter()
        .filter_map(|link| fused.candidates.get(link.candidate_index))
        .filter(|entry| matches(claim, &entry.candidate.text))
        .count()
}

/// Reinstate hard-dropped claims until the retained answer meets the word
/// floor, preferring the least risky and then the most confident.
fn apply_word_floor(bound: &mut [BoundClaim], tuning: &PipelineTuning) {
    let mut retained_words: usize = bound
        .iter()
        .filter(|entry| entry.retained())
        .map(|entry| word_count(&entry.claim.text))
        .sum();
    if retained_words >= tuning.min_words_after_binding {
        return;
    }

    let mut order: Vec<usize> = bound
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.decision == SupportDecision::HardDrop)
        .map(|(index, _)| index)
        .collect();
    order.sort_by(|&a, &b| {
        let (left, right) = (&bound[a], &bound[b]);
        left.claim
            .risk
            .rank()
            .cmp(&right.claim.risk.rank())
            .then_with(|| {
                right
                    .confidence
                    .partial_cmp(&left.confidence)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| left.claim.position.cmp(&right.claim.position))
    });

    for index in order {
        if retained_words >= tuning.min_words_after_binding {
            break;
        }
        if let Some(entry) = bound.get_mut(index) {
            entry.decision = SupportDecision::SoftDrop;
            entry.reinstated = true;
            retained_words += word_count(&entry.claim.text);
            debug!(
                claim = entry.claim.text.as_str(),
                "reinstated claim to preserve the word floor"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{Candidate, FusedCandidate, Scores, SignalScores};

    fn fused_with_texts(texts: &[&str]) -> FusedList {
        FusedList {
            candidates: texts
                .iter()
                .enumerate()
                .map(|(i, text)| FusedCandidate {
                    candidate: Candidate {
                        doc_id: format!("doc-{i}"),
                        chunk_id: "c0".to_string(),
                        line_start: 0,
                        line_end: 1,
                        is_anchor: false,
                        facet: "base".to_string(),
                        text: (*text).to_string(),
                        embedding: None,
                    },
                    scores: Scores::default(),
                    fused: 0.5,
                })
                .collect(),
        }
    }

    fn link(index: usize, signals: SignalScores) -> EvidenceLink {
        EvidenceLink {
            claim_id: "claim".to_string(),
            candidate_index: index,
            doc_id: format!("doc-{index}"),
            chunk_id: "c0".to_string(),
            is_anchor: false,
            signals,
            confidence: 0.5,
        }
    }

    #[test]
    fn risky_claim_with_failing_semantic_family_soft_drops() {
        // Jaccard 0.09 passes, coverage 0.25 passes, cosine 0.40 fails the
        // 0.58 floor: two families are not enough for a risky claim.
        let claim = Claim::new("X increased by 12% in 2024.", 0);
        assert!(claim.is_risky());
        let fused = fused_with_texts(&["X increased by 12% in 2024", "by 12% overall in 2024"]);
        let evidence = vec![
            link(
                0,
                SignalScores {
                    jaccard: 0.09,
                    coverage: 0.25,
                    cosine: 0.40,
                    rouge: 0.0,
                },
            ),
            link(
                1,
                SignalScores {
                    jaccard: 0.08,
                    coverage: 0.22,
                    cosine: 0.35,
                    rouge: 0.1,
                },
            ),
        ];
        let tuning = PipelineTuning::default();

        let bound = bind_claims(&[claim], &[evidence], &fused, &tuning);
        assert_eq!(bound[0].decision, SupportDecision::SoftDrop);
    }

    #[test]
    fn risky_claim_passes_with_all_families_and_multi_evidence() {
        let claim = Claim::new("X increased by 12% in 2024.", 0);
        let fused = fused_with_texts(&["X increased by 12% in 2024", "growth hit 12% that year 2024"]);
        let strong = SignalScores {
            jaccard: 0.2,
            coverage: 0.5,
            cosine: 0.7,
            rouge: 0.3,
        };
        let evidence = vec![link(0, strong), link(1, strong)];
        let tuning = PipelineTuning::default();

        let bound = bind_claims(&[claim], &[evidence], &fused, &tuning);
        assert_eq!(bound[0].decision, SupportDecision::Keep);
    }

    #[test]
    fn numeric_claim_needs_two_corroborating_items() {
        let claim = Claim::new("X increased by 12% in 2024.", 0);
        // Only one candidate actually repeats the number.
        let fused = fused_with_texts(&["X increased by 12% in 2024", "growth was strong that year"]);
        let strong = SignalScores {
            jaccard: 0.2,
            coverage: 0.5,
            cosine: 0.7,
            rouge: 0.3,
        };
        let evidence = vec![link(0, strong), link(1, strong)];
        let tuning = PipelineTuning::default();

        let bound = bind_claims(&[claim], &[evidence], &fused, &tuning);
        assert_eq!(bound[0].decision, SupportDecision::SoftDrop);
    }

    #[test]
    fn plain_claim_keeps_on_two_of_three() {
        let claim = Claim::new("the cache layer was rebuilt for speed.", 0);
        assert!(!claim.is_risky());
        let fused = fused_with_texts(&["the cache layer was rebuilt for speed"]);
        let evidence = vec![link(
            0,
            SignalScores {
                jaccard: 0.2,
                coverage: 0.5,
                cosine: 0.0,
                rouge: 0.0,
            },
        )];
        let tuning = PipelineTuning::default();

        let bound = bind_claims(&[claim], &[evidence], &fused, &tuning);
        assert_eq!(bound[0].decision, SupportDecision::Keep);
    }

    #[test]
    fn drop_unsupported_hard_drops_failing_claims() {
        let claim = Claim::new("entirely unsupported statement here.", 0);
        let fused = fused_with_texts(&["unrelated"]);
        let evidence = vec![link(0, SignalScores::default())];
        let mut tuning = PipelineTuning::default();
        tuning.drop_unsupported = true;
        tuning.min_words_after_binding = 1;

        let bound = bind_claims(&[claim], &[evidence], &fused, &tuning);
        assert_eq!(bound[0].decision, SupportDecision::HardDrop);
    }

    #[test]
    fn word_floor_reinstates_lowest_risk_first() {
        let supported = Claim::new("the cache layer was rebuilt for speed.", 0);
        let risky = Claim::new("latency fell 40% afterwards.", 1);
        let plain = Claim::new("operators reported smoother deploys.", 2);
        let fused = fused_with_texts(&["the cache layer was rebuilt for speed"]);
        let keep_signals = SignalScores {
            jaccard: 0.2,
            coverage: 0.5,
            cosine: 0.0,
            rouge: 0.0,
        };
        let mut tuning = PipelineTuning::default();
        tuning.drop_unsupported = true;
        tuning.min_words_after_binding = 11;

        let bound = bind_claims(
            &[supported, risky, plain],
            &[
                vec![link(0, keep_signals)],
                Vec::new(),
                Vec::new(),
            ],
            &fused,
            &tuning,
        );

        assert_eq!(bound[0].decision, SupportDecision::Keep);
        // The non-risky claim comes back first; seven kept words plus four
        // reinstated words meet the floor, so the risky one stays dropped.
        assert_eq!(bound[2].decision, SupportDecision::SoftDrop);
        assert!(bound[2].reinstated);
        assert_eq!(bound[1].decision, SupportDecision::HardDrop);
    }
}
