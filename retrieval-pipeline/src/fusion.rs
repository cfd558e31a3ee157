//! Rank-based fusion of per-facet dense and sparse result lists into one
//! deterministic evidence ranking.

use std::{cmp::Ordering, collections::HashMap};

use common::{
    config::PipelineTuning,
    types::{Candidate, FusedCandidate, FusedList, Scores},
};
use tracing::debug;

/// Ranked hits gathered for one facet: the dense and sparse lists share
/// the facet's query text but come from different collaborators.
#[derive(Debug, Default)]
pub struct FacetLists {
    pub facet: String,
    pub is_base: bool,
    pub dense: Vec<(Candidate, f32)>,
    pub sparse: Vec<(Candidate, f32)>,
}

/// Fusion knobs, lifted out of the full tuning struct.
#[derive(Debug, Clone, Copy)]
pub struct FusionConfig {
    pub rrf_k: f32,
    pub anchor_boost: f32,
    pub facet_downweight_no_anchor: f32,
    pub per_doc_line_cap: usize,
}

impl From<&PipelineTuning> for FusionConfig {
    fn from(tuning: &PipelineTuning) -> Self {
        Self {
            rrf_k: tuning.rrf_k,
            anchor_boost: tuning.anchor_boost,
            facet_downweight_no_anchor: tuning.facet_downweight_no_anchor,
            per_doc_line_cap: tuning.per_doc_line_cap,
        }
    }
}

struct Accumulated {
    candidate: Candidate,
    scores: Scores,
    fused: f32,
    seen_in_base: bool,
}

/// Merge every facet's ranked lists into one fused list. Each candidate
/// contributes `1 / (k + rank)` per list it appears in; anchors are
/// boosted, non-base facet hits without an anchor flag are downweighted,
/// and no document keeps more than the per-document line cap.
pub fn fuse(inputs: Vec<FacetLists>, config: &FusionConfig) -> FusedList {
    let mut merged: HashMap<String, Accumulated> = HashMap::new();

    for input in inputs {
        accumulate_list(&mut merged, input.dense, input.is_base, config, true);
        accumulate_list(&mut merged, input.sparse, input.is_base, config, false);
    }

    let mut fused: Vec<FusedCandidate> = merged
        .into_values()
        .map(|entry| {
            let mut score = entry.fused;
            if entry.candidate.is_anchor {
                score *= config.anchor_boost;
            } else if !entry.seen_in_base {
                score *= config.facet_downweight_no_anchor;
            }
            FusedCandidate {
                candidate: entry.candidate,
                scores: entry.scores,
                fused: score,
            }
        })
        .collect();

    fused.sort_by(compare_fused);

    let capped = enforce_per_doc_cap(fused, config.per_doc_line_cap);
    debug!(candidates = capped.len(), "fusion pass complete");
    FusedList { candidates: capped }
}

fn accumulate_list(
    merged: &mut HashMap<String, Accumulated>,
    mut list: Vec<(Candidate, f32)>,
    is_base: bool,
    config: &FusionConfig,
    dense: bool,
) {
    if list.is_empty() {
        return;
    }

    // Deterministic ranking within the list: raw score, then identity.
    list.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.key().cmp(&b.0.key()))
    });

    for (rank, (candidate, raw)) in list.into_iter().enumerate() {
        let key = candidate.key();
        let entry = merged.entry(key).or_insert_with(|| Accumulated {
            candidate: candidate.clone(),
            scores: Scores::default(),
            fused: 0.0,
            seen_in_base: false,
        });

        let slot = if dense {
            &mut entry.scores.dense
        } else {
            &mut entry.scores.sparse
        };
        match slot {
            Some(existing) if *existing >= raw => {}
            _ => *slot = Some(raw),
        }

        entry.seen_in_base |= is_base;
        entry.candidate.is_anchor |= candidate.is_anchor;
        entry.fused += 1.0 / (config.rrf_k + rank as f32 + 1.0);
    }
}

fn compare_fused(a: &FusedCandidate, b: &FusedCandidate) -> Ordering {
    b.fused
        .partial_cmp(&a.fused)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.candidate.doc_id.cmp(&b.candidate.doc_id))
        .then_with(|| a.candidate.chunk_id.cmp(&b.candidate.chunk_id))
        .then_with(|| a.candidate.line_start.cmp(&b.candidate.line_start))
}

/// Keep at most `cap` lines per document, favoring the highest fused
/// scores; the input is already sorted descending.
fn enforce_per_doc_cap(sorted: Vec<FusedCandidate>, cap: usize) -> Vec<FusedCandidate> {
    let mut per_doc: HashMap<String, usize> = HashMap::new();
    sorted
        .into_iter()
        .filter(|entry| {
            let count = per_doc.entry(entry.candidate.doc_id.clone()).or_insert(0);
            if *count < cap {
                *count += 1;
                true
            } else {
                false
            }
        })
        .collect()
}
