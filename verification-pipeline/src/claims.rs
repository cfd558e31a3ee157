//! Splits a draft answer into verifiable claims.

use common::{text::split_sentences, types::Claim};

/// One claim per sentence, in draft order. Risk classification happens in
/// the claim constructor from the sentence's numbers and entities.
pub fn extract(draft: &str) -> Vec<Claim> {
    split_sentences(draft)
        .into_iter()
        .enumerate()
        .map(|(position, sentence)| Claim::new(sentence, position))
        .collect()
}
