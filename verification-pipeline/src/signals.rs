//! Claim/candidate signal computation. Four independent signals per pair:
//! lexical Jaccard, claim-token coverage, embedding cosine, and an n-gram
//! overlap in the ROUGE style.

use common::{
    config::PipelineTuning,
    text::{cosine_unit, coverage, jaccard, ngram_recall, token_set},
    types::{Claim, EvidenceLink, FusedList, SignalScores},
};

/// Claim-side embedding seam. Candidates carry their embeddings from
/// ingestion; claims are embedded on demand through this function. Absent
/// embeddings zero the cosine signal instead of failing the run.
pub type ClaimEmbedder<'a> = &'a dyn Fn(&str) -> Option<Vec<f32>>;

/// A link clears the lexical bar on either surface-overlap signal.
pub fn is_strong(signals: &SignalScores, tuning: &PipelineTuning) -> bool {
    signals.jaccard >= tuning.evidence_jaccard || signals.coverage >= tuning.evidence_coverage
}

/// A link clears the semantic bar on either deep signal.
pub fn is_semantically_strong(signals: &SignalScores, tuning: &PipelineTuning) -> bool {
    signals.cosine >= tuning.cos_floor || signals.rouge >= tuning.rouge_floor
}

/// Score every claim against every fused candidate. Output is indexed by
/// claim, then by candidate position in the fused list; links never
/// outlive the run that produced them.
pub fn score_all(
    claims: &[Claim],
    fused: &FusedList,
    tuning: &PipelineTuning,
    embedder: Option<ClaimEmbedder<'_>>,
) -> Vec<Vec<EvidenceLink>> {
    let candidate_tokens: Vec<_> = fused
        .iter()
        .map(|entry| token_set(&entry.candidate.text))
        .collect();

    claims
        .iter()
        .map(|claim| {
            let claim_tokens = token_set(&claim.text);
            let claim_embedding = embedder.and_then(|embed| embed(&claim.text));

            fused
                .iter()
                .zip(candidate_tokens.iter())
                .enumerate()
                .map(|(index, (entry, cand_tokens))| {
                    let cosine = match (&claim_embedding, &entry.candidate.embedding) {
                        (Some(a), Some(b)) => cosine_unit(a, b),
                        _ => 0.0,
                    };
                    let signals = SignalScores {
                        jaccard: jaccard(&claim_tokens, cand_tokens),
                        coverage: coverage(&claim_tokens, cand_tokens),
                        cosine,
                        rouge: ngram_recall(&claim.text, &entry.candidate.text, 2),
                    };
                    let confidence = blend_confidence(&signals, entry.candidate.is_anchor, tuning);
                    EvidenceLink {
                        claim_id: claim.id.clone(),
                        candidate_index: index,
                        doc_id: entry.candidate.doc_id.clone(),
                        chunk_id: entry.candidate.chunk_id.clone(),
                        is_anchor: entry.candidate.is_anchor,
                        signals,
                        confidence,
                    }
                })
                .collect()
        })
        .collect()
}

/// Weighted blend ranking candidate evidence for a claim: cosine, anchor
/// match, and span overlap (coverage stands in for the span signal).
fn blend_confidence(signals: &SignalScores, is_anchor: bool, tuning: &PipelineTuning) -> f32 {
    let anchor_match = if is_anchor { 1.0 } else { 0.0 };
    tuning.confidence_weight_cosine * signals.cosine
        + tuning.confidence_weight_anchor * anchor_match
        + tuning.confidence_weight_span * signals.coverage
}
