pub mod answer;
pub mod candidate;
pub mod claim;
pub mod query;

pub use answer::{BoundClaim, ComposedAnswer};
pub use candidate::{Candidate, FusedCandidate, FusedList, Scores};
pub use claim::{Claim, EvidenceLink, RiskClass, SignalScores, SupportDecision};
pub use query::{Query, Rewrite};
