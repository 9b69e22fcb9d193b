//! Content Quality Assessment
//!
//! Scores fetched page content against the query:
//!
//! - **Relevance**: query keyword coverage of body and title
//! - **Information density**: informative tokens over all tokens, after
//!   subtracting boilerplate segments (cookie banners, navigation, footers)
//! - **Duplicates**: word-shingle Jaccard overlap with already accepted text
//!
//! Assessment is pure and never fails: malformed or empty content just scores
//! low. The early-termination rule lives in [`stopping`].

pub mod stopping;

pub use stopping::StoppingPolicy;

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::config::QualityConfig;
use crate::models::{ContentQuality, PageContent, QueryAnalysis};
use crate::utils::text::{self, coverage, is_stop_word};

const SHINGLE_WIDTH: usize = 3;
const NEUTRAL_RELEVANCE: f64 = 0.5;

/// A segment containing one of these is treated as page chrome
const BOILERPLATE_MARKERS: &[&str] = &[
    "cookie", "cookies", "accept all", "privacy policy", "terms of use", "terms of service",
    "all rights reserved", "skip to content", "skip to main content", "sign in", "log in",
    "subscribe", "newsletter", "advertisement", "share this", "follow us", "back to top",
    "main menu", "toggle navigation",
];

const OPTIMAL_SENTENCE_WORDS: f64 = 17.5;
const OPTIMAL_WORD_CHARS: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct ContentQualityAssessor {
    config: QualityConfig,
}

impl ContentQualityAssessor {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, content: &PageContent, analysis: &QueryAnalysis) -> ContentQuality {
        self.assess_at(content, analysis, Utc::now())
    }

    pub fn assess_at(&self, content: &PageContent, analysis: &QueryAnalysis, now: DateTime<Utc>) -> ContentQuality {
        let body_tokens = text::tokenize(&content.main_content);
        if body_tokens.is_empty() {
            return ContentQuality {
                relevance_score: 0.0,
                content_length: 0,
                information_density: 0.0,
                duplicate_content: false,
                quality_indicators: BTreeMap::new(),
            };
        }

        let title_tokens = text::tokenize(&content.title);
        let body_set = body_tokens.iter().map(String::as_str).collect::<HashSet<_>>();
        let title_set = title_tokens.iter().map(String::as_str).collect::<HashSet<_>>();

        let relevance_score = match (
            coverage(&analysis.keywords, &body_set),
            coverage(&analysis.keywords, &title_set),
        ) {
            (Some(body), Some(title)) => 0.75 * body + 0.25 * title,
            _ => NEUTRAL_RELEVANCE,
        };

        let mut quality_indicators = BTreeMap::new();
        quality_indicators.insert("structure_score".to_string(), structure_score(&content.main_content));
        quality_indicators.insert("readability_score".to_string(), readability_score(&content.main_content));
        quality_indicators.insert(
            "title_relevance".to_string(),
            coverage(&analysis.keywords, &title_set).unwrap_or(NEUTRAL_RELEVANCE),
        );
        quality_indicators.insert("completeness_score".to_string(), completeness_score(content));
        quality_indicators.insert("freshness_score".to_string(), freshness_score(content.last_updated, now));

        ContentQuality {
            relevance_score,
            content_length: content.main_content.split_whitespace().count(),
            information_density: information_density(&content.main_content),
            duplicate_content: false,
            quality_indicators,
        }
    }

    /// Shingle overlap of two texts in [0, 1]
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        text::jaccard(&text::shingles(a, SHINGLE_WIDTH), &text::shingles(b, SHINGLE_WIDTH))
    }

    /// Whether `candidate` is a near-duplicate of any accepted text
    pub fn is_duplicate<'a>(&self, candidate: &str, accepted: impl IntoIterator<Item = &'a str>) -> bool {
        let candidate_shingles = text::shingles(candidate, SHINGLE_WIDTH);
        if candidate_shingles.is_empty() {
            return false;
        }
        accepted.into_iter().any(|existing| {
            text::jaccard(&candidate_shingles, &text::shingles(existing, SHINGLE_WIDTH))
                >= self.config.duplicate_threshold
        })
    }
}

impl Default for ContentQualityAssessor {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

fn is_boilerplate(segment_tokens: &[String]) -> bool {
    BOILERPLATE_MARKERS
        .iter()
        .any(|marker| text::contains_phrase(segment_tokens, marker))
}

/// Informative tokens over all tokens. Boilerplate segments and stop-words
/// are not informative.
pub fn information_density(content: &str) -> f64 {
    let mut total = 0usize;
    let mut informative = 0usize;

    for segment in text::split_sentences(content) {
        let tokens = text::tokenize(&segment);
        total += tokens.len();
        if is_boilerplate(&tokens) {
            continue;
        }
        informative += tokens.iter().filter(|t| !is_stop_word(t)).count();
    }

    if total == 0 {
        0.0
    } else {
        informative as f64 / total as f64
    }
}

fn structure_score(content: &str) -> f64 {
    let paragraphs = content.split("\n\n").filter(|p| !p.trim().is_empty()).count();
    let sentences = text::split_sentences(content).len();

    let paragraph_part = (paragraphs as f64 / 5.0).min(1.0);
    let sentence_part = (sentences as f64 / 10.0).min(1.0);
    0.5 * paragraph_part + 0.5 * sentence_part
}

/// Closeness to typical prose: about 17.5 words per sentence, 5 chars per word
fn readability_score(content: &str) -> f64 {
    let sentences = text::split_sentences(content);
    let words: Vec<&str> = content.split_whitespace().collect();
    if sentences.is_empty() || words.is_empty() {
        return 0.0;
    }

    let words_per_sentence = words.len() as f64 / sentences.len() as f64;
    let chars_per_word = words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64;

    let sentence_part = 1.0 - ((words_per_sentence - OPTIMAL_SENTENCE_WORDS).abs() / OPTIMAL_SENTENCE_WORDS).min(1.0);
    let word_part = 1.0 - ((chars_per_word - OPTIMAL_WORD_CHARS).abs() / OPTIMAL_WORD_CHARS).min(1.0);
    0.5 * sentence_part + 0.5 * word_part
}

fn completeness_score(content: &PageContent) -> f64 {
    let mut score = 0.0;
    if !content.title.trim().is_empty() {
        score += 0.3;
    }
    if !content.main_content.trim().is_empty() {
        score += 0.4;
    }
    if !content.images.is_empty() {
        score += 0.1;
    }
    if !content.categories.is_empty() {
        score += 0.1;
    }
    if content.last_updated.is_some() {
        score += 0.1;
    }
    score
}

fn freshness_score(last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last_updated {
        None => 0.5,
        Some(updated) => {
            let age_days = (now - updated).num_days().max(0);
            match age_days {
                0..=30 => 1.0,
                31..=180 => 0.8,
                181..=365 => 0.6,
                366..=1095 => 0.4,
                _ => 0.2,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::QueryAnalyzer;

    fn page(title: &str, body: &str) -> PageContent {
        PageContent {
            title: title.to_string(),
            main_content: body.to_string(),
            ..Default::default()
        }
    }

    const ARTICLE: &str = "Photosynthesis converts light energy into chemical energy. \
        Chlorophyll pigments absorb mostly blue and red wavelengths. \
        Oxygen is released when water molecules are split during the light reactions.";

    #[test]
    fn test_relevant_article_scores_high() {
        let analysis = QueryAnalyzer::new().analyze("What is photosynthesis?");
        let quality = ContentQualityAssessor::default().assess(&page("Photosynthesis", ARTICLE), &analysis);

        assert_eq!(quality.relevance_score, 1.0);
        assert!(quality.information_density > 0.5);
        assert_eq!(quality.content_length, ARTICLE.split_whitespace().count());
        assert!(!quality.duplicate_content);
        assert_eq!(quality.quality_indicators.len(), 5);
    }

    #[test]
    fn test_irrelevant_content_scores_zero_relevance() {
        let analysis = QueryAnalyzer::new().analyze("What is photosynthesis?");
        let quality = ContentQualityAssessor::default()
            .assess(&page("Garden tools", "Buy shovels and rakes at discount prices."), &analysis);
        assert_eq!(quality.relevance_score, 0.0);
    }

    #[test]
    fn test_boilerplate_lowers_density() {
        let clean = information_density(ARTICLE);
        let noisy = information_density(&format!(
            "{}\nWe use cookies to improve your experience. Accept all cookies.\n\
             Subscribe to our newsletter for weekly updates.\nAll rights reserved by the publisher.",
            ARTICLE
        ));
        assert!(noisy < clean);
        assert_eq!(information_density("Accept all cookies. Sign in to continue."), 0.0);
    }

    #[test]
    fn test_empty_content_degrades_gracefully() {
        let analysis = QueryAnalyzer::new().analyze("anything");
        let quality = ContentQualityAssessor::default().assess(&page("", "   \n "), &analysis);
        assert_eq!(quality.relevance_score, 0.0);
        assert_eq!(quality.information_density, 0.0);
        assert_eq!(quality.content_length, 0);
    }

    #[test]
    fn test_near_duplicate_detection() {
        let assessor = ContentQualityAssessor::default();
        let mirrored = format!("{} ", ARTICLE.replace("Photosynthesis", "photosynthesis"));
        let distinct = "Rust uses ownership and borrowing to guarantee memory safety without a garbage collector.";

        assert!(assessor.similarity(ARTICLE, &mirrored) > 0.99);
        assert!(assessor.is_duplicate(&mirrored, [ARTICLE]));
        assert!(!assessor.is_duplicate(distinct, [ARTICLE]));
        assert!(!assessor.is_duplicate("", [ARTICLE]));
    }

    #[test]
    fn test_freshness_indicator() {
        let now = Utc::now();
        assert_eq!(freshness_score(None, now), 0.5);
        assert_eq!(freshness_score(Some(now), now), 1.0);
        assert_eq!(freshness_score(Some(now - chrono::Duration::days(2000)), now), 0.2);
    }
}
