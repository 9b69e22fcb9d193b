// Extractive summarizer used when synthesis is unavailable

use std::collections::HashSet;

use crate::utils::text::{keywords, split_sentences, tokenize};

const MIN_SENTENCE_CHARS: usize = 10;
const MIN_SENTENCE_WORDS: usize = 4;
/// Below this many words the summary is introduced with a lead-in
const SHORT_SUMMARY_WORDS: usize = 50;

struct Candidate {
    position: usize,
    text: String,
    words: usize,
    score: f64,
}

/// Pick the sentences of `texts` that best overlap the query, stopping once
/// about `target_length` words are collected. Selected sentences keep their
/// original order. `None` when no usable sentence exists.
pub fn extractive_summary<'a>(
    query: &str,
    texts: impl IntoIterator<Item = &'a str>,
    target_length: usize,
) -> Option<String> {
    let terms = keywords(query);
    let mut seen = HashSet::new();

    let mut candidates: Vec<Candidate> = texts
        .into_iter()
        .flat_map(split_sentences)
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .filter(|s| s.split_whitespace().count() >= MIN_SENTENCE_WORDS)
        .filter(|s| seen.insert(s.to_lowercase()))
        .enumerate()
        .map(|(position, text)| {
            let tokens: HashSet<String> = tokenize(&text).into_iter().collect();
            let score = if terms.is_empty() {
                0.0
            } else {
                terms.iter().filter(|t| tokens.contains(*t)).count() as f64 / terms.len() as f64
            };
            Candidate {
                position,
                words: text.split_whitespace().count(),
                text,
                score,
            }
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    // stable: equal scores keep source order
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let target = target_length.max(1) as f64;
    let (enough, ceiling) = (target * 0.8, target * 1.2);
    let mut selected: Vec<&Candidate> = Vec::new();
    let mut total_words = 0usize;

    for candidate in &candidates {
        if total_words as f64 >= enough {
            break;
        }
        if !selected.is_empty() && (total_words + candidate.words) as f64 > ceiling {
            continue;
        }
        total_words += candidate.words;
        selected.push(candidate);
    }

    selected.sort_by_key(|c| c.position);
    let body = selected
        .iter()
        .map(|c| format!("{}.", c.text.trim_end_matches(['.', '!', '?'])))
        .collect::<Vec<_>>()
        .join(" ");

    if total_words < SHORT_SUMMARY_WORDS {
        Some(format!("Based on available sources regarding '{}': {}", query.trim(), body))
    } else {
        Some(body)
    }
}
