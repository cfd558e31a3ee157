use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label given to the implicit facet carrying the unmodified query.
pub const BASE_FACET: &str = "base";

/// An issued retrieval query. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub text: String,
    pub role_tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>, role_tag: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            role_tag,
            created_at: Utc::now(),
        }
    }
}

/// One facet variant of a query, with the yield score that justified
/// keeping it. The base query travels as a rewrite with yield 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rewrite {
    pub facet: String,
    pub text: String,
    pub yield_score: f32,
    pub is_base: bool,
}

impl Rewrite {
    pub fn base(text: impl Into<String>) -> Self {
        Self {
            facet: BASE_FACET.to_string(),
            text: text.into(),
            yield_score: 1.0,
            is_base: true,
        }
    }

    pub fn facet(facet: impl Into<String>, text: impl Into<String>, yield_score: f32) -> Self {
        Self {
            facet: facet.into(),
            text: text.into(),
            yield_score,
            is_base: false,
        }
    }
}
