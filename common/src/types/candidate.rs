use serde::{Deserialize, Serialize};

/// One retrieval hit, read-only after the collect stage creates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub doc_id: String,
    pub chunk_id: String,
    pub line_start: u32,
    pub line_end: u32,
    pub is_anchor: bool,
    /// Facet whose lookup surfaced this hit first.
    pub facet: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Candidate {
    /// Identity of the underlying line span, independent of facet.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.doc_id, self.chunk_id, self.line_start)
    }

    /// Identity of the source chunk, used for per-chunk citation caps.
    pub fn chunk_key(&self) -> String {
        format!("{}:{}", self.doc_id, self.chunk_id)
    }
}

/// Raw subscores a candidate accumulated from the retrieval signals.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Scores {
    pub dense: Option<f32>,
    pub sparse: Option<f32>,
}

/// Candidate plus its fused rank score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedCandidate {
    pub candidate: Candidate,
    pub scores: Scores,
    pub fused: f32,
}

/// Ordered output of one fusion pass. Ordering is deterministic given
/// identical inputs, and no document exceeds the per-document line cap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusedList {
    pub candidates: Vec<FusedCandidate>,
}

impl FusedList {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FusedCandidate> {
        self.candidates.iter()
    }
}
