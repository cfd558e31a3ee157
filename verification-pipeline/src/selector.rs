//! Chooses the evidence keep-set for each claim from its scored links.

use std::cmp::Ordering;

use common::{
    config::{PipelineTuning, SelectionPolicy},
    types::EvidenceLink,
};

use crate::signals::{is_semantically_strong, is_strong};

/// Rank a claim's links by blended confidence and keep the evidence set.
///
/// Under the threshold policy only links clearing a signal floor survive,
/// capped at the claim top-k — or the strong-case top-k when the claim is
/// already well supported. The dynamic-target policy keeps the best links
/// up to a fixed set size regardless of floors.
pub fn select_evidence(links: &[EvidenceLink], tuning: &PipelineTuning) -> Vec<EvidenceLink> {
    let mut ranked: Vec<&EvidenceLink> = links.iter().collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.candidate_index.cmp(&b.candidate_index))
    });

    match tuning.selection_policy {
        SelectionPolicy::Threshold => {
            let well_supported = ranked
                .iter()
                .filter(|link| {
                    is_strong(&link.signals, tuning) && is_semantically_strong(&link.signals, tuning)
                })
                .count()
                >= tuning.claim_topk;
            let top_k = if well_supported {
                tuning.claim_topk_strong
            } else {
                tuning.claim_topk
            };
            ranked
                .into_iter()
                .filter(|link| {
                    is_strong(&link.signals, tuning)
                        || is_semantically_strong(&link.signals, tuning)
                })
                .take(top_k)
                .cloned()
                .collect()
        }
        SelectionPolicy::DynamicTarget => ranked
            .into_iter()
            .take(tuning.selection_target)
            .cloned()
            .collect(),
    }
}
