//! Pure text-signal primitives shared by fusion, evidence scoring and
//! redundancy control. Everything here is deterministic over its inputs.

use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

pub const fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Lowercased NFKC tokens, split on anything non-alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text.nfkc().collect();
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

/// Fraction of claim tokens found in the candidate.
pub fn coverage(claim: &HashSet<String>, candidate: &HashSet<String>) -> f32 {
    if claim.is_empty() {
        return 0.0;
    }
    let hit = claim.intersection(candidate).count();
    hit as f32 / claim.len() as f32
}

fn ngram_set(tokens: &[String], n: usize) -> HashSet<String> {
    if n == 0 || tokens.len() < n {
        return HashSet::new();
    }
    tokens.windows(n).map(|window| window.join("\u{1f}")).collect()
}

/// Recall-oriented n-gram overlap: how much of the reference's n-grams the
/// candidate reproduces. Used as the ROUGE-style signal with n = 2.
pub fn ngram_recall(reference: &str, candidate: &str, n: usize) -> f32 {
    let reference_grams = ngram_set(&tokenize(reference), n);
    if reference_grams.is_empty() {
        return 0.0;
    }
    let candidate_grams = ngram_set(&tokenize(candidate), n);
    let hit = reference_grams.intersection(&candidate_grams).count();
    hit as f32 / reference_grams.len() as f32
}

/// Symmetric trigram similarity used for near-duplicate claim detection,
/// normalized by the smaller side so short paraphrases still collide.
pub fn trigram_similarity(a: &str, b: &str) -> f32 {
    let a_grams = ngram_set(&tokenize(a), 3);
    let b_grams = ngram_set(&tokenize(b), 3);
    let smaller = a_grams.len().min(b_grams.len());
    if smaller == 0 {
        return 0.0;
    }
    let hit = a_grams.intersection(&b_grams).count();
    hit as f32 / smaller as f32
}

/// Cosine similarity clamped to [0, 1]; zero for mismatched or degenerate
/// vectors rather than an error, since embeddings are optional input.
pub fn cosine_unit(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    clamp_unit(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Normalized numeric tokens: separators stripped, units and punctuation
/// trimmed, so "1,200" and "1200" and "1200." agree.
pub fn extract_numbers(text: &str) -> Vec<String> {
    let mut numbers = Vec::new();
    for raw in text.split_whitespace() {
        if !raw.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let trimmed = cleaned.trim_matches('.');
        if !trimmed.is_empty() && !numbers.iter().any(|n| n == trimmed) {
            numbers.push(trimmed.to_string());
        }
    }
    numbers
}

/// Named-entity heuristic: maximal runs of capitalized words, ignoring a
/// capitalized word that merely opens a sentence.
pub fn extract_entities(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut entities = Vec::new();
    let mut run: Vec<String> = Vec::new();
    let mut sentence_start = true;

    for word in &words {
        if sentence_start {
            flush_entity_run(&mut run, &mut entities);
        }
        let stripped: String = word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-')
            .collect();
        let capitalized = stripped.chars().next().is_some_and(char::is_uppercase);

        if capitalized && !sentence_start {
            run.push(stripped);
        } else {
            flush_entity_run(&mut run, &mut entities);
        }

        sentence_start = word.ends_with(['.', '!', '?']);
    }
    flush_entity_run(&mut run, &mut entities);
    entities
}

fn flush_entity_run(run: &mut Vec<String>, entities: &mut Vec<String>) {
    if run.is_empty() {
        return;
    }
    let entity = run.join(" ");
    if !entities.iter().any(|e| e == &entity) {
        entities.push(entity);
    }
    run.clear();
}

/// Naive sentence splitter: terminator followed by whitespace ends a
/// sentence. Good enough for model-generated drafts, which are well formed.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|next| next.is_whitespace()) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_normalizes_case_and_punctuation() {
        assert_eq!(
            tokenize("Tokio's scheduler, explained!"),
            vec!["tokio", "s", "scheduler", "explained"]
        );
    }

    #[test]
    fn jaccard_and_coverage_basics() {
        let claim = token_set("revenue grew twelve percent");
        let candidate = token_set("annual revenue grew strongly");
        let j = jaccard(&claim, &candidate);
        assert!(j > 0.0 && j < 1.0);
        assert!((coverage(&claim, &candidate) - 0.5).abs() < f32::EPSILON);
        assert_eq!(coverage(&HashSet::new(), &candidate), 0.0);
    }

    #[test]
    fn ngram_recall_rewards_shared_phrases() {
        let full = ngram_recall("the cache hit rate improved", "the cache hit rate improved", 2);
        assert!((full - 1.0).abs() < f32::EPSILON);
        let none = ngram_recall("completely different words here", "no overlap at all", 2);
        assert_eq!(none, 0.0);
    }

    #[test]
    fn trigram_similarity_detects_near_duplicates() {
        let a = "the scheduler uses cooperative multitasking for fairness";
        let b = "the scheduler uses cooperative multitasking for throughput";
        assert!(trigram_similarity(a, b) > 0.5);
        assert_eq!(trigram_similarity("too short", "also short"), 0.0);
    }

    #[test]
    fn cosine_unit_handles_degenerate_input() {
        assert_eq!(cosine_unit(&[], &[]), 0.0);
        assert_eq!(cosine_unit(&[1.0, 0.0], &[0.0]), 0.0);
        assert_eq!(cosine_unit(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        let same = cosine_unit(&[0.6, 0.8], &[0.6, 0.8]);
        assert!((same - 1.0).abs() < 1e-5);
    }

    #[test]
    fn number_extraction_normalizes_formatting() {
        let numbers = extract_numbers("Revenue grew 12% to $1,200.50 in 2024.");
        assert_eq!(numbers, vec!["12", "1200.50", "2024"]);
    }

    #[test]
    fn entity_extraction_skips_sentence_leads() {
        let entities = extract_entities("The runtime ships in Tokio Core. Alice reviewed it.");
        assert!(entities.contains(&"Tokio Core".to_string()));
        assert!(!entities.iter().any(|e| e == "The"));
    }

    #[test]
    fn sentence_splitting_keeps_terminators() {
        let sentences = split_sentences("First claim. Second one! Third?");
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], "First claim.");
    }
}
