//! In-memory corpus adapter for offline runs: a JSONL chunk file stands in
//! for the dense index, the sparse index and the anchor metadata
//! collaborators. The dense side scores with deterministic hashed
//! embeddings so runs reproduce without a model-backed embedder.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    path::Path,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::{error::AppError, text::tokenize};
use retrieval_pipeline::{AnchorIndex, SearchHit, SearchIndex};
use serde::Deserialize;

pub const HASH_DIM: usize = 64;

#[derive(Debug, Clone, Deserialize)]
pub struct CorpusChunk {
    pub doc_id: String,
    pub chunk_id: String,
    #[serde(default)]
    pub line_start: u32,
    #[serde(default)]
    pub line_end: u32,
    pub text: String,
    #[serde(default)]
    pub anchor: bool,
    #[serde(default)]
    pub anchor_priority: Option<u8>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

pub fn load(path: &Path) -> Result<Vec<CorpusChunk>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading corpus {}", path.display()))?;
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parsing corpus chunk on line {}", number + 1))
        })
        .collect()
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Deterministic bag-of-tokens embedding: token counts scattered over a
/// fixed number of hashed buckets, L2-normalized.
pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; HASH_DIM];
    for token in tokenize(text) {
        let bucket = (fnv1a(&token) % HASH_DIM as u64) as usize;
        if let Some(slot) = vector.get_mut(bucket) {
            *slot += 1.0;
        }
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

fn chunk_vector(chunk: &CorpusChunk) -> Vec<f32> {
    match &chunk.embedding {
        Some(stored) if stored.len() == HASH_DIM => stored.clone(),
        _ => hashed_embedding(&chunk.text),
    }
}

fn hit_from(chunk: &CorpusChunk, score: f32, embedding: &[f32]) -> SearchHit {
    SearchHit {
        doc_id: chunk.doc_id.clone(),
        chunk_id: chunk.chunk_id.clone(),
        line_start: chunk.line_start,
        line_end: chunk.line_end.max(chunk.line_start + 1),
        score,
        text: chunk.text.clone(),
        embedding: Some(embedding.to_vec()),
    }
}

fn rank_and_take(mut scored: Vec<(usize, f32)>, top_k: usize) -> Vec<(usize, f32)> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(top_k);
    scored
}

pub struct DenseIndex {
    chunks: Vec<CorpusChunk>,
    vectors: Vec<Vec<f32>>,
}

impl DenseIndex {
    pub fn new(chunks: &[CorpusChunk]) -> Self {
        Self {
            vectors: chunks.iter().map(chunk_vector).collect(),
            chunks: chunks.to_vec(),
        }
    }
}

#[async_trait]
impl SearchIndex for DenseIndex {
    async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<SearchHit>, AppError> {
        let query = hashed_embedding(query_text);
        let scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| (index, common::text::cosine_unit(&query, vector)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        Ok(rank_and_take(scored, top_k)
            .into_iter()
            .filter_map(|(index, score)| {
                let chunk = self.chunks.get(index)?;
                let vector = self.vectors.get(index)?;
                Some(hit_from(chunk, score, vector))
            })
            .collect())
    }
}

pub struct SparseIndex {
    chunks: Vec<CorpusChunk>,
    token_sets: Vec<HashSet<String>>,
    vectors: Vec<Vec<f32>>,
}

impl SparseIndex {
    pub fn new(chunks: &[CorpusChunk]) -> Self {
        Self {
            token_sets: chunks
                .iter()
                .map(|chunk| tokenize(&chunk.text).into_iter().collect())
                .collect(),
            vectors: chunks.iter().map(chunk_vector).collect(),
            chunks: chunks.to_vec(),
        }
    }
}

#[async_trait]
impl SearchIndex for SparseIndex {
    async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<SearchHit>, AppError> {
        let query_tokens: HashSet<String> = tokenize(query_text).into_iter().collect();
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let scored: Vec<(usize, f32)> = self
            .token_sets
            .iter()
            .enumerate()
            .filter_map(|(index, tokens)| {
                let overlap = query_tokens.intersection(tokens).count();
                if overlap == 0 {
                    return None;
                }
                // Overlap count damped by chunk length, a cheap BM25 stand-in.
                let score = overlap as f32 / (1.0 + (tokens.len() as f32).sqrt());
                Some((index, score))
            })
            .collect();

        Ok(rank_and_take(scored, top_k)
            .into_iter()
            .filter_map(|(index, score)| {
                let chunk = self.chunks.get(index)?;
                let vector = self.vectors.get(index)?;
                Some(hit_from(chunk, score, vector))
            })
            .collect())
    }
}

pub struct AnchorTable {
    priorities: HashMap<(String, String), Option<u8>>,
}

impl AnchorTable {
    pub fn new(chunks: &[CorpusChunk]) -> Self {
        Self {
            priorities: chunks
                .iter()
                .filter(|chunk| chunk.anchor)
                .map(|chunk| {
                    (
                        (chunk.doc_id.clone(), chunk.chunk_id.clone()),
                        chunk.anchor_priority,
                    )
                })
                .collect(),
        }
    }
}

impl AnchorIndex for AnchorTable {
    fn is_anchor(&self, doc_id: &str, chunk_id: &str) -> bool {
        self.priorities
            .contains_key(&(doc_id.to_string(), chunk_id.to_string()))
    }

    fn anchor_priority(&self, doc_id: &str, chunk_id: &str) -> Option<u8> {
        self.priorities
            .get(&(doc_id.to_string(), chunk_id.to_string()))
            .copied()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, id: &str, text: &str, anchor: bool) -> CorpusChunk {
        CorpusChunk {
            doc_id: doc.to_string(),
            chunk_id: id.to_string(),
            line_start: 0,
            line_end: 1,
            text: text.to_string(),
            anchor,
            anchor_priority: None,
            embedding: None,
        }
    }

    #[tokio::test]
    async fn dense_index_ranks_matching_text_first() {
        let chunks = vec![
            chunk("doc-a", "c1", "tokio scheduler cooperative multitasking", false),
            chunk("doc-b", "c1", "postgres vacuum tuning guide", false),
        ];
        let index = DenseIndex::new(&chunks);
        let hits = index
            .search("how does the tokio scheduler work", 5)
            .await
            .expect("search");
        assert!(!hits.is_empty());
        assert_eq!(hits[0].doc_id, "doc-a");
    }

    #[tokio::test]
    async fn sparse_index_scores_token_overlap() {
        let chunks = vec![
            chunk("doc-a", "c1", "cache eviction policy rewrite", false),
            chunk("doc-b", "c1", "unrelated networking content", false),
        ];
        let index = SparseIndex::new(&chunks);
        let hits = index.search("cache eviction", 5).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "doc-a");
    }

    #[test]
    fn anchor_table_round_trips_priority() {
        let mut anchored = chunk("doc-a", "c1", "pinned", true);
        anchored.anchor_priority = Some(3);
        let table = AnchorTable::new(&[anchored, chunk("doc-b", "c1", "plain", false)]);
        assert!(table.is_anchor("doc-a", "c1"));
        assert!(!table.is_anchor("doc-b", "c1"));
        assert_eq!(table.anchor_priority("doc-a", "c1"), Some(3));
    }

    #[test]
    fn hashed_embeddings_are_deterministic_and_normalized() {
        let a = hashed_embedding("one two three");
        let b = hashed_embedding("one two three");
        assert_eq!(a, b);
        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
