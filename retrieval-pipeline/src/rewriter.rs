//! Expands a query into facet rewrites and keeps only the ones whose
//! probed retrieval yield justifies an extra fusion pass.

use std::collections::HashSet;

use common::{
    config::PipelineTuning,
    error::AppError,
    types::{Query, Rewrite},
};
use serde::Deserialize;
use tracing::debug;

use crate::{invocation::InvocationQueue, SearchIndex};

#[derive(Debug, Deserialize)]
struct FacetSuggestion {
    facet: String,
    query: String,
}

pub struct QueryRewriter<'a> {
    queue: &'a InvocationQueue,
    probe: &'a dyn SearchIndex,
    tuning: &'a PipelineTuning,
}

impl<'a> QueryRewriter<'a> {
    pub fn new(
        queue: &'a InvocationQueue,
        probe: &'a dyn SearchIndex,
        tuning: &'a PipelineTuning,
    ) -> Self {
        Self {
            queue,
            probe,
            tuning,
        }
    }

    /// Produce the base rewrite plus up to `rewrite_keep` facet rewrites.
    /// Each facet is probed against the sparse index; its yield is the
    /// growth in distinct documents over the base result set. The yield
    /// floor relaxes when the base query itself came back sparse.
    pub async fn expand(&self, query: &Query) -> Result<Vec<Rewrite>, AppError> {
        let mut rewrites = vec![Rewrite::base(&query.text)];
        if self.tuning.rewrite_k == 0 || self.tuning.rewrite_keep == 0 {
            return Ok(rewrites);
        }

        let base_hits = self
            .probe
            .search(&query.text, self.tuning.rewrite_probe_take)
            .await?;
        let base_docs: HashSet<String> =
            base_hits.iter().map(|hit| hit.doc_id.clone()).collect();

        let yield_min = if base_hits.len() < self.tuning.sparse_hit_threshold {
            self.tuning.rewrite_yield_min_sparse
        } else {
            self.tuning.rewrite_yield_min
        };

        let raw = self
            .queue
            .invoke(&build_rewrite_prompt(&query.text, self.tuning.rewrite_k))
            .await?;
        let suggestions = parse_facets(&raw)?;

        let mut slots = self.tuning.rewrite_keep;
        for suggestion in suggestions.into_iter().take(self.tuning.rewrite_k) {
            if slots == 0 {
                break;
            }
            let hits = self
                .probe
                .search(&suggestion.query, self.tuning.rewrite_probe_take)
                .await?;
            let novel = hits
                .iter()
                .filter(|hit| !base_docs.contains(&hit.doc_id))
                .map(|hit| hit.doc_id.clone())
                .collect::<HashSet<String>>()
                .len();
            let yield_score =
                (base_docs.len() + novel) as f32 / base_docs.len().max(1) as f32;

            if yield_score >= yield_min {
                debug!(
                    facet = suggestion.facet.as_str(),
                    yield_score, "keeping facet rewrite"
                );
                rewrites.push(Rewrite::facet(suggestion.facet, suggestion.query, yield_score));
                slots -= 1;
            } else {
                debug!(
                    facet = suggestion.facet.as_str(),
                    yield_score, yield_min, "discarding low-yield facet rewrite"
                );
            }
        }

        Ok(rewrites)
    }
}

fn build_rewrite_prompt(query: &str, count: usize) -> String {
    format!(
        r#"Rewrite the following search query into at most {count} facet variants that would surface different relevant evidence. Respond with a JSON array of objects with "facet" (a short label) and "query" (the rewritten query). No other text.

Query: {query}"#
    )
}

/// The model occasionally wraps its JSON in a code fence; tolerate that
/// but nothing else.
fn parse_facets(raw: &str) -> Result<Vec<FacetSuggestion>, AppError> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(trimmed)
        .map_err(|e| AppError::LLMParsing(format!("Failed to parse facet rewrites: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{invocation::CompletionBackend, SearchHit};
    use async_trait::async_trait;
    use common::{config::QueueConfig, error::InvocationError};
    use std::{collections::HashMap, sync::Arc};

    struct CannedBackend(String);

    #[async_trait]
    impl CompletionBackend for CannedBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, InvocationError> {
            Ok(self.0.clone())
        }
    }

    struct MapIndex {
        hits: HashMap<String, Vec<&'static str>>,
    }

    #[async_trait]
    impl SearchIndex for MapIndex {
        async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<SearchHit>, AppError> {
            let docs = self.hits.get(query_text).cloned().unwrap_or_default();
            Ok(docs
                .into_iter()
                .take(top_k)
                .map(|doc| SearchHit {
                    doc_id: doc.to_string(),
                    chunk_id: "c1".to_string(),
                    line_start: 0,
                    line_end: 1,
                    score: 1.0,
                    text: format!("{doc} text"),
                    embedding: None,
                })
                .collect())
        }
    }

    fn fast_queue(response: &str) -> InvocationQueue {
        let config = QueueConfig {
            max_rps: 1000.0,
            burst: 8.0,
            ..QueueConfig::default()
        };
        InvocationQueue::new(Arc::new(CannedBackend(response.to_string())), config)
    }

    fn tuning() -> PipelineTuning {
        PipelineTuning::default()
    }

    #[tokio::test]
    async fn keeps_high_yield_facet_and_discards_weak_one() {
        let queue = fast_queue(
            r#"[{"facet": "causes", "query": "root causes"}, {"facet": "dates", "query": "timeline"}]"#,
        );
        let probe = MapIndex {
            hits: HashMap::from([
                ("base question".to_string(), vec!["d1", "d2"]),
                ("root causes".to_string(), vec!["d3", "d4"]),
                ("timeline".to_string(), vec!["d1"]),
            ]),
        };
        let mut tuning = tuning();
        tuning.rewrite_keep = 2;
        let rewriter = QueryRewriter::new(&queue, &probe, &tuning);

        let rewrites = rewriter
            .expand(&Query::new("base question", None))
            .await
            .expect("expand");

        // Base plus the high-yield facet; the timeline facet adds nothing.
        assert_eq!(rewrites.len(), 2);
        assert!(rewrites[0].is_base);
        assert_eq!(rewrites[1].facet, "causes");
        assert!((rewrites[1].yield_score - 2.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn sparse_base_results_relax_the_yield_floor() {
        let queue = fast_queue(r#"[{"facet": "alt", "query": "alternative phrasing"}]"#);
        let probe = MapIndex {
            hits: HashMap::from([
                ("rare topic".to_string(), vec!["d1"]),
                ("alternative phrasing".to_string(), vec!["d1", "d2"]),
            ]),
        };
        // yield = (1 + 1) / 1 = 2.0, above even the normal floor; shrink the
        // facet's novelty to sit between the sparse and normal floors.
        let probe_between = MapIndex {
            hits: HashMap::from([
                ("rare topic".to_string(), vec!["d1", "d2", "d3", "d4", "d5"]),
                (
                    "alternative phrasing".to_string(),
                    vec!["d1", "d2", "n1", "n2"],
                ),
            ]),
        };

        let tuning = tuning();
        let rewriter = QueryRewriter::new(&queue, &probe, &tuning);
        let rewrites = rewriter
            .expand(&Query::new("rare topic", None))
            .await
            .expect("expand");
        assert_eq!(rewrites.len(), 2, "sparse case keeps the facet");

        // Five base docs, two novel: yield 1.4 fails the 1.5 floor once the
        // base is no longer sparse.
        let rewriter = QueryRewriter::new(&queue, &probe_between, &tuning);
        let rewrites = rewriter
            .expand(&Query::new("rare topic", None))
            .await
            .expect("expand");
        assert_eq!(rewrites.len(), 1, "non-sparse case enforces 1.5");
    }

    #[tokio::test]
    async fn malformed_model_output_is_a_parsing_error() {
        let queue = fast_queue("not json at all");
        let probe = MapIndex {
            hits: HashMap::from([("q".to_string(), vec!["d1", "d2"])]),
        };
        let tuning = tuning();
        let rewriter = QueryRewriter::new(&queue, &probe, &tuning);

        let err = rewriter
            .expand(&Query::new("q", None))
            .await
            .expect_err("garbage output must fail");
        assert!(matches!(err, AppError::LLMParsing(_)));
    }
}
