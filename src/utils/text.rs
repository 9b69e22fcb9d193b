//! Text helpers shared by query analysis, ranking, quality assessment and
//! summarization.
//!
//! Everything here is deterministic: tokens are lowercase and the same input
//! always yields the same output.

use std::collections::HashSet;

pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did",
    "will", "would", "could", "should", "may", "might", "must", "can", "this", "that", "these",
    "those", "it", "its", "as", "from", "into", "about", "than", "then", "there", "their", "they",
    "what", "which", "who", "whom", "when", "where", "why", "how", "i", "you", "we", "he", "she",
    "not", "no", "so", "if", "also", "such", "our", "your", "my", "me", "us",
];

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Lowercase word tokens. Apostrophes and hyphens inside a word are kept.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if (c == '\'' || c == '-')
            && !current.is_empty()
            && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric())
        {
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Tokens without stop-words, deduplicated in first-occurrence order
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stop_word(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Whether `phrase` occurs as a contiguous token run in `tokens`
pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || needle.len() > tokens.len() {
        return false;
    }
    tokens
        .windows(needle.len())
        .any(|w| w.iter().zip(&needle).all(|(a, b)| a == b))
}

/// Fraction of `terms` present in `tokens`, `None` when there are no terms
pub fn coverage(terms: &[String], tokens: &HashSet<&str>) -> Option<f64> {
    if terms.is_empty() {
        return None;
    }
    let found = terms.iter().filter(|t| tokens.contains(t.as_str())).count();
    Some(found as f64 / terms.len() as f64)
}

/// Split text into sentences on `.`, `!`, `?` and line breaks
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(|c: char| matches!(c, '.' | '!' | '?' | '\n'))
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Set of word shingles of width `k` over the normalized token stream.
/// Texts shorter than `k` tokens yield a single shingle of the whole text.
pub fn shingles(text: &str, k: usize) -> HashSet<String> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return HashSet::new();
    }
    if tokens.len() <= k {
        return std::iter::once(tokens.join(" ")).collect();
    }
    tokens.windows(k).map(|w| w.join(" ")).collect()
}

/// Jaccard overlap of two sets, 0.0 when both are empty
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}
