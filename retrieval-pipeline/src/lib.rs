pub mod drafting;
pub mod fusion;
pub mod invocation;
pub mod pipeline;
pub mod rewriter;

use async_trait::async_trait;
use common::error::AppError;

pub use invocation::{CompletionBackend, InvocationQueue, OpenAiBackend, QueuePhase};
pub use pipeline::{
    run_retrieval, PipelineStageTimings, RetrievalDeps, RetrievalRun, StageKind,
};

/// One hit returned by a retrieval collaborator.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub doc_id: String,
    pub chunk_id: String,
    pub line_start: u32,
    pub line_end: u32,
    pub score: f32,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

/// Ranked-list query interface the pipeline expects from both the dense
/// and sparse indices. Treated as pure and idempotent; an unreachable
/// index surfaces as `AppError::RetrievalUnavailable`.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<SearchHit>, AppError>;
}

/// Anchor metadata collaborator. The priority tag influences ranking
/// only, never filtering.
pub trait AnchorIndex: Send + Sync {
    fn is_anchor(&self, doc_id: &str, chunk_id: &str) -> bool;

    fn anchor_priority(&self, doc_id: &str, chunk_id: &str) -> Option<u8> {
        let _ = (doc_id, chunk_id);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        config::{PipelineTuning, QueueConfig},
        error::InvocationError,
        types::Query,
    };
    use std::{collections::HashSet, sync::Arc};

    struct SilentBackend;

    #[async_trait]
    impl CompletionBackend for SilentBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, InvocationError> {
            Ok("[]".to_string())
        }
    }

    struct StaticIndex {
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl SearchIndex for StaticIndex {
        async fn search(&self, _query_text: &str, top_k: usize) -> Result<Vec<SearchHit>, AppError> {
            Ok(self.hits.iter().take(top_k).cloned().collect())
        }
    }

    struct AnchorSet {
        keys: HashSet<(String, String)>,
    }

    impl AnchorIndex for AnchorSet {
        fn is_anchor(&self, doc_id: &str, chunk_id: &str) -> bool {
            self.keys
                .contains(&(doc_id.to_string(), chunk_id.to_string()))
        }
    }

    fn hit(doc: &str, chunk: &str, line: u32, score: f32) -> SearchHit {
        SearchHit {
            doc_id: doc.to_string(),
            chunk_id: chunk.to_string(),
            line_start: line,
            line_end: line + 1,
            score,
            text: format!("{doc} {chunk} content at line {line}"),
            embedding: None,
        }
    }

    fn fast_queue() -> InvocationQueue {
        let config = QueueConfig {
            max_rps: 1000.0,
            burst: 8.0,
            ..QueueConfig::default()
        };
        InvocationQueue::new(Arc::new(SilentBackend), config)
    }

    #[tokio::test]
    async fn end_to_end_retrieval_is_deterministic_and_capped() {
        let dense = StaticIndex {
            hits: (0..10).map(|i| hit("doc-a", "c1", i, 1.0 - i as f32 * 0.05)).collect(),
        };
        let sparse = StaticIndex {
            hits: vec![hit("doc-b", "c2", 0, 9.0), hit("doc-a", "c1", 0, 7.0)],
        };
        let anchors = AnchorSet {
            keys: HashSet::from([("doc-b".to_string(), "c2".to_string())]),
        };
        let queue = fast_queue();
        let mut tuning = PipelineTuning::default();
        tuning.rewrite_k = 0;
        tuning.per_doc_line_cap = 5;

        let run_once = || async {
            run_retrieval(
                RetrievalDeps {
                    dense: &dense,
                    sparse: &sparse,
                    anchors: &anchors,
                    queue: &queue,
                },
                Query::new("what changed in the scheduler", None),
                &tuning,
            )
            .await
            .expect("retrieval run")
        };

        let first = run_once().await;
        let second = run_once().await;

        assert_eq!(first.rewrites_used, 1, "base facet only");
        let doc_a = first
            .fused
            .iter()
            .filter(|c| c.candidate.doc_id == "doc-a")
            .count();
        assert!(doc_a <= 5, "per-document cap enforced, saw {doc_a}");
        assert!(first
            .fused
            .iter()
            .any(|c| c.candidate.is_anchor && c.candidate.doc_id == "doc-b"));

        let keys = |run: &RetrievalRun| {
            run.fused
                .iter()
                .map(|c| c.candidate.key())
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&first), keys(&second));
    }
}
