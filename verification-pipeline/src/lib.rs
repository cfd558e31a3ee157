pub mod binder;
pub mod claims;
pub mod pipeline;
pub mod redundancy;
pub mod selector;
pub mod signals;

pub use pipeline::{verify_draft, ClaimEmbedder, VerificationContext, VerifyStage};

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        config::PipelineTuning,
        types::{Candidate, FusedCandidate, FusedList, Scores},
    };

    fn fused_with(texts: &[(&str, &str, bool)]) -> FusedList {
        FusedList {
            candidates: texts
                .iter()
                .enumerate()
                .map(|(i, (doc, text, anchor))| FusedCandidate {
                    candidate: Candidate {
                        doc_id: (*doc).to_string(),
                        chunk_id: format!("c{i}"),
                        line_start: 0,
                        line_end: 1,
                        is_anchor: *anchor,
                        facet: "base".to_string(),
                        text: (*text).to_string(),
                        embedding: None,
                    },
                    scores: Scores::default(),
                    fused: 1.0 - i as f32 * 0.1,
                })
                .collect(),
        }
    }

    #[test]
    fn repeated_runs_produce_identical_answers() {
        let fused = fused_with(&[
            (
                "doc-a",
                "the scheduler was rewritten to use cooperative multitasking",
                true,
            ),
            (
                "doc-b",
                "worker threads now steal tasks from a shared injector queue",
                false,
            ),
        ]);
        let draft = "the scheduler was rewritten to use cooperative multitasking. \
                     worker threads now steal tasks from a shared queue.";
        let tuning = PipelineTuning::default();

        let first = verify_draft("q1", draft, &fused, &tuning, None).expect("first run");
        let second = verify_draft("q1", draft, &fused, &tuning, None).expect("second run");

        let first_json = serde_json::json!({
            "claims": first.claims.iter().map(|c| (&c.claim.text, c.decision)).collect::<Vec<_>>(),
            "dropped": first.dropped.len(),
        });
        let second_json = serde_json::json!({
            "claims": second.claims.iter().map(|c| (&c.claim.text, c.decision)).collect::<Vec<_>>(),
            "dropped": second.dropped.len(),
        });
        assert_eq!(first_json, second_json);
    }

    #[test]
    fn empty_evidence_still_composes_an_answer() {
        let fused = FusedList::default();
        let draft = "Nothing in the corpus backs this up.";
        let tuning = PipelineTuning::default();

        let answer = verify_draft("q2", draft, &fused, &tuning, None).expect("run");
        assert_eq!(answer.total_claims, 1);
        // Unsupported, but retained as a flagged claim under the default
        // soft-drop policy.
        assert_eq!(answer.claims.len(), 1);
        assert_eq!(answer.soft_flagged, 1);
    }
}
