//! Per-batch aggregation of pipeline run outcomes into promotion metrics.

use std::{
    collections::HashSet,
    path::Path,
};

use anyhow::{Context, Result};
use common::types::{BoundClaim, ComposedAnswer, SupportDecision};
use serde::{Deserialize, Serialize};

/// One evaluated run: the composed answer plus the evaluation harness's
/// ground truth and the rankings needed for fusion gain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub query_id: String,
    pub answer: ComposedAnswer,
    /// Chunk keys (`doc:chunk`) judged relevant for the query.
    pub gold_chunks: Vec<String>,
    /// Chunk keys of the fused ranking, best first.
    pub fused_chunks: Vec<String>,
    /// Chunk keys of a dense-only ranking over the same query.
    pub dense_chunks: Vec<String>,
}

/// Aggregate metrics for one evaluation batch. `promoted` is filled in by
/// the gate, never by the aggregation itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub runs: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Pass rate of risky claims.
    pub faithfulness: f64,
    /// Share of claims that failed their support rule.
    pub unsupported_percent: f64,
    /// Share of retained claims citing at least one anchor.
    pub anchor_coverage: f64,
    /// Mean hit-rate improvement of the fused ranking over dense-only.
    pub fusion_gain: f64,
    pub promoted: bool,
}

fn cited_chunks(answer: &ComposedAnswer) -> HashSet<String> {
    answer
        .claims
        .iter()
        .flat_map(|entry| entry.evidence.iter().map(|link| link.chunk_key()))
        .collect()
}

fn all_claims(answer: &ComposedAnswer) -> impl Iterator<Item = &BoundClaim> {
    answer.claims.iter().chain(answer.dropped.iter())
}

fn hit_at(ranking: &[String], gold: &HashSet<&str>, depth: usize) -> f64 {
    let hit = ranking
        .iter()
        .take(depth)
        .any(|chunk| gold.contains(chunk.as_str()));
    if hit {
        1.0
    } else {
        0.0
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Micro-averaged citation agreement plus the faithfulness, redundancy
/// and fusion aggregates, over one batch of records.
pub fn compute_metrics(records: &[RunRecord], recall_depth: usize) -> RunMetrics {
    let mut true_positives = 0usize;
    let mut cited_total = 0usize;
    let mut gold_total = 0usize;
    let mut risky_total = 0usize;
    let mut risky_kept = 0usize;
    let mut claims_total = 0usize;
    let mut claims_kept = 0usize;
    let mut retained_total = 0usize;
    let mut retained_with_anchor = 0usize;
    let mut gain_sum = 0.0f64;

    for record in records {
        let gold: HashSet<&str> = record.gold_chunks.iter().map(String::as_str).collect();
        let cited = cited_chunks(&record.answer);
        true_positives += cited
            .iter()
            .filter(|chunk| gold.contains(chunk.as_str()))
            .count();
        cited_total += cited.len();
        gold_total += gold.len();

        for entry in all_claims(&record.answer) {
            claims_total += 1;
            if entry.decision == SupportDecision::Keep {
                claims_kept += 1;
            }
            if entry.claim.is_risky() {
                risky_total += 1;
                if entry.decision == SupportDecision::Keep {
                    risky_kept += 1;
                }
            }
        }
        for entry in &record.answer.claims {
            retained_total += 1;
            if entry.evidence.iter().any(|link| link.is_anchor) {
                retained_with_anchor += 1;
            }
        }

        gain_sum += hit_at(&record.fused_chunks, &gold, recall_depth)
            - hit_at(&record.dense_chunks, &gold, recall_depth);
    }

    let precision = ratio(true_positives, cited_total);
    let recall = ratio(true_positives, gold_total);
    let f1 = if precision + recall <= f64::EPSILON {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    RunMetrics {
        runs: records.len(),
        precision,
        recall,
        f1,
        faithfulness: ratio(risky_kept, risky_total),
        unsupported_percent: 100.0 * ratio(claims_total - claims_kept, claims_total),
        anchor_coverage: ratio(retained_with_anchor, retained_total),
        fusion_gain: if records.is_empty() {
            0.0
        } else {
            gain_sum / records.len() as f64
        },
        promoted: false,
    }
}

/// Load run records from a JSONL trace written by the pipeline.
pub async fn read_records(path: &Path) -> Result<Vec<RunRecord>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parsing run record on line {}", number + 1))
        })
        .collect()
}
