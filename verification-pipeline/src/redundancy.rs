//! Final pass over bound claims: collapse near-duplicates, cap citations
//! per source chunk, and require each kept claim to bring a new anchor.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use common::{
    config::PipelineTuning,
    types::{BoundClaim, EvidenceLink, SupportDecision},
};
use tracing::debug;

/// Apply all redundancy rules. Hard-dropped claims pass through untouched
/// and never count toward caps or anchor bookkeeping.
pub fn control_redundancy(mut bound: Vec<BoundClaim>, tuning: &PipelineTuning) -> Vec<BoundClaim> {
    collapse_near_duplicates(&mut bound, tuning);
    enforce_per_chunk_cap(&mut bound, tuning);
    enforce_anchor_novelty(&mut bound, tuning);
    bound
}

/// Confidence-descending processing order over the retained claims, ties
/// broken by draft position for determinism.
fn retained_by_confidence(bound: &[BoundClaim]) -> Vec<usize> {
    let mut order: Vec<usize> = bound
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.retained())
        .map(|(index, _)| index)
        .collect();
    order.sort_by(|&a, &b| {
        bound[b]
            .confidence
            .partial_cmp(&bound[a].confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| bound[a].claim.position.cmp(&bound[b].claim.position))
    });
    order
}

/// Any retained pair above the trigram ceiling collapses into the
/// higher-confidence claim.
fn collapse_near_duplicates(bound: &mut [BoundClaim], tuning: &PipelineTuning) {
    let order = retained_by_confidence(bound);
    let mut accepted: Vec<usize> = Vec::new();

    for index in order {
        let duplicate_of = accepted.iter().find(|&&kept| {
            common::text::trigram_similarity(&bound[index].claim.text, &bound[kept].claim.text)
                > tuning.redundancy_trigram_max
        });
        match duplicate_of {
            Some(&kept) => {
                debug!(
                    dropped = bound[index].claim.text.as_str(),
                    kept = bound[kept].claim.text.as_str(),
                    "collapsing near-duplicate claim"
                );
                if let Some(entry) = bound.get_mut(index) {
                    entry.decision = SupportDecision::HardDrop;
                }
            }
            None => accepted.push(index),
        }
    }
}

fn cited_chunks(entry: &BoundClaim) -> Vec<String> {
    let mut chunks: Vec<String> = entry.evidence.iter().map(EvidenceLink::chunk_key).collect();
    chunks.sort();
    chunks.dedup();
    chunks
}

/// No more than `per_chunk_cap` retained claims may cite one chunk. A
/// claim whose every citation is saturated is collapsed; otherwise it
/// counts against each chunk it cites.
fn enforce_per_chunk_cap(bound: &mut [BoundClaim], tuning: &PipelineTuning) {
    let order = retained_by_confidence(bound);
    let mut citations: HashMap<String, usize> = HashMap::new();

    for index in order {
        let chunks = cited_chunks(&bound[index]);
        if chunks.is_empty() {
            continue;
        }
        let saturated = chunks
            .iter()
            .all(|chunk| citations.get(chunk).copied().unwrap_or(0) >= tuning.per_chunk_cap);
        if saturated {
            debug!(
                claim = bound[index].claim.text.as_str(),
                "dropping claim whose cited chunks are all saturated"
            );
            if let Some(entry) = bound.get_mut(index) {
                entry.decision = SupportDecision::HardDrop;
            }
            continue;
        }
        for chunk in chunks {
            *citations.entry(chunk).or_insert(0) += 1;
        }
    }
}

/// Each kept claim must introduce an anchor not yet referenced, unless no
/// other retained claim shares any of its evidence documents (the escape
/// valve for claims that alone cover their topic).
fn enforce_anchor_novelty(bound: &mut [BoundClaim], tuning: &PipelineTuning) {
    if tuning.unique_anchor_min == 0 {
        return;
    }

    let mut order: Vec<usize> = bound
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.retained())
        .map(|(index, _)| index)
        .collect();
    order.sort_by_key(|&index| bound[index].claim.position);

    let mut referenced: HashSet<String> = HashSet::new();
    for index in order {
        let anchors = bound[index].anchor_keys();
        let novel = anchors
            .iter()
            .filter(|anchor| !referenced.contains(*anchor))
            .count();
        if novel >= tuning.unique_anchor_min {
            referenced.extend(anchors);
            continue;
        }

        let docs: HashSet<&str> = bound[index]
            .evidence
            .iter()
            .map(|link| link.doc_id.as_str())
            .collect();
        let shares_topic = bound.iter().enumerate().any(|(other, entry)| {
            other != index
                && entry.retained()
                && entry
                    .evidence
                    .iter()
                    .any(|link| docs.contains(link.doc_id.as_str()))
        });

        if shares_topic {
            debug!(
                claim = bound[index].claim.text.as_str(),
                "dropping claim that adds no new anchor"
            );
            if let Some(entry) = bound.get_mut(index) {
                entry.decision = SupportDecision::HardDrop;
            }
        } else {
            referenced.extend(anchors);
        }
    }
}
