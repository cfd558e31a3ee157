//! Draft answer generation over the fused evidence pool. The draft is a
//! plain completion routed through the invocation queue; its sentences
//! become the claims the verification side binds to evidence.

use common::{
    error::AppError,
    types::{FusedList, Query},
};
use serde_json::Value;

use crate::invocation::InvocationQueue;

fn round_score(value: f32) -> f64 {
    (f64::from(value) * 1000.0).round() / 1000.0
}

/// Fused candidates as JSON context for the draft prompt.
pub fn evidence_to_context(fused: &FusedList) -> Value {
    serde_json::json!(fused
        .iter()
        .map(|entry| {
            serde_json::json!({
                "doc": entry.candidate.doc_id,
                "chunk": entry.candidate.chunk_id,
                "lines": [entry.candidate.line_start, entry.candidate.line_end],
                "score": round_score(entry.fused),
                "content": entry.candidate.text,
            })
        })
        .collect::<Vec<_>>())
}

pub fn create_draft_prompt(query: &Query, fused: &FusedList) -> String {
    format!(
        r"
        Context Information:
        ==================
        {}

        User Question:
        ==================
        {}

        Answer the question using only the context above. Write complete,
        self-contained sentences; each sentence should state exactly one
        fact.
        ",
        evidence_to_context(fused),
        query.text
    )
}

pub async fn generate_draft(
    queue: &InvocationQueue,
    query: &Query,
    fused: &FusedList,
) -> Result<String, AppError> {
    queue.invoke(&create_draft_prompt(query, fused)).await
}
