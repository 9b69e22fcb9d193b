//! Source Ranking
//!
//! Scores raw search results before anything is fetched. Each result gets a
//! relevance, authority and freshness score in [0, 1]; the final score is
//! their weighted sum. Freshness gains weight for time-sensitive queries, and
//! the weights always sum to 1.
//!
//! Results on blocklisted domains (video platforms, social feeds, marketplaces)
//! are dropped before scoring. The output is sorted by final score, highest
//! first, with ties kept in search order.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use url::Url;

use crate::config::RankingConfig;
use crate::models::{QueryAnalysis, SearchResult, SourceScore};
use crate::utils::text::{self, coverage};

/// Domains whose pages rarely yield extractable article text
pub const DOMAIN_BLOCKLIST: &[&str] = &[
    "instagram.com", "tiktok.com", "youtube.com", "vimeo.com", "dailymotion.com",
    "facebook.com", "pinterest.com", "ebay.com", "aliexpress.com", "fandom.com",
];

/// Known high-authority domains and their scores
const AUTHORITY_TABLE: &[(&str, f64)] = &[
    // reference and standards
    ("wikipedia.org", 0.9),
    ("britannica.com", 0.9),
    ("merriam-webster.com", 0.85),
    ("w3.org", 0.95),
    ("ietf.org", 0.95),
    // science and health
    ("nih.gov", 1.0),
    ("ncbi.nlm.nih.gov", 1.0),
    ("cdc.gov", 1.0),
    ("who.int", 1.0),
    ("nature.com", 0.95),
    ("science.org", 0.95),
    ("arxiv.org", 0.9),
    ("ieee.org", 0.9),
    ("acm.org", 0.9),
    ("mayoclinic.org", 0.9),
    ("clevelandclinic.org", 0.85),
    ("medlineplus.gov", 0.95),
    // news
    ("reuters.com", 0.9),
    ("apnews.com", 0.9),
    ("bbc.com", 0.85),
    ("bbc.co.uk", 0.85),
    ("npr.org", 0.85),
    ("nytimes.com", 0.85),
    ("theguardian.com", 0.8),
    ("wsj.com", 0.85),
    // technology
    ("developer.mozilla.org", 0.95),
    ("docs.python.org", 0.95),
    ("doc.rust-lang.org", 0.95),
    ("kubernetes.io", 0.9),
    ("stackoverflow.com", 0.8),
    ("github.com", 0.75),
    ("docs.aws.amazon.com", 0.9),
    ("learn.microsoft.com", 0.9),
    ("cloud.google.com", 0.9),
    // business and education
    ("investopedia.com", 0.8),
    ("khanacademy.org", 0.85),
];

const SUBDOMAIN_FACTOR: f64 = 0.8;
const INSTITUTIONAL_AUTHORITY: f64 = 0.85;
const ORG_AUTHORITY: f64 = 0.55;
const UNKNOWN_AUTHORITY: f64 = 0.3;
const NEUTRAL_FRESHNESS: f64 = 0.5;
const NEUTRAL_RELEVANCE: f64 = 0.5;

const BASE_RELEVANCE_WEIGHT: f64 = 0.5;
const BASE_AUTHORITY_WEIGHT: f64 = 0.3;
const BASE_FRESHNESS_WEIGHT: f64 = 0.2;

/// Weights of the three component scores, always summing to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub relevance: f64,
    pub authority: f64,
    pub freshness: f64,
}

#[derive(Debug, Clone)]
pub struct SourceRanker {
    config: RankingConfig,
}

impl SourceRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn rank(&self, results: &[SearchResult], analysis: &QueryAnalysis) -> Vec<SourceScore> {
        self.rank_at(results, analysis, Utc::now())
    }

    /// Rank against a fixed "now"
    pub fn rank_at(
        &self,
        results: &[SearchResult],
        analysis: &QueryAnalysis,
        now: DateTime<Utc>,
    ) -> Vec<SourceScore> {
        let weights = self.weights_for(analysis.recency_importance);
        let mut seen = HashSet::new();
        let mut dropped = 0usize;

        let mut scored: Vec<SourceScore> = results
            .iter()
            .filter_map(|result| {
                let Some(domain) = extract_domain(&result.url) else {
                    debug!(url = %result.url, "Dropping result with unparsable URL");
                    dropped += 1;
                    return None;
                };
                if is_blocklisted(&domain) {
                    debug!(url = %result.url, domain = %domain, "Dropping blocklisted result");
                    dropped += 1;
                    return None;
                }
                if !seen.insert(result.url.clone()) {
                    dropped += 1;
                    return None;
                }

                let relevance_score = relevance(result, analysis);
                let authority_score = authority(&domain);
                let freshness_score = freshness(result.published_date, analysis.recency_importance, now);
                let final_score = weights.relevance * relevance_score
                    + weights.authority * authority_score
                    + weights.freshness * freshness_score;

                Some(SourceScore {
                    url: result.url.clone(),
                    title: result.title.clone(),
                    snippet: result.snippet.clone(),
                    relevance_score,
                    authority_score,
                    freshness_score,
                    final_score: final_score.clamp(0.0, 1.0),
                })
            })
            .collect();

        // stable: equal scores keep search order
        scored.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        scored.truncate(self.config.max_ranked_sources);

        info!(
            input = results.len(),
            dropped,
            ranked = scored.len(),
            freshness_weight = weights.freshness,
            "Sources ranked"
        );
        scored
    }

    pub fn weights_for(&self, recency_importance: f64) -> ScoreWeights {
        let recency = recency_importance.clamp(0.0, 1.0);
        if recency < self.config.recency_reweight_threshold {
            return ScoreWeights {
                relevance: BASE_RELEVANCE_WEIGHT,
                authority: BASE_AUTHORITY_WEIGHT,
                freshness: BASE_FRESHNESS_WEIGHT,
            };
        }

        let freshness = BASE_FRESHNESS_WEIGHT + 0.3 * recency;
        let remainder = 1.0 - freshness;
        let relevance_share = BASE_RELEVANCE_WEIGHT / (BASE_RELEVANCE_WEIGHT + BASE_AUTHORITY_WEIGHT);
        ScoreWeights {
            relevance: remainder * relevance_share,
            authority: remainder * (1.0 - relevance_share),
            freshness,
        }
    }
}

impl Default for SourceRanker {
    fn default() -> Self {
        Self::new(RankingConfig::default())
    }
}

/// Lowercased host without a leading `www.`
pub fn extract_domain(raw_url: &str) -> Option<String> {
    let parsed = Url::parse(raw_url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

fn matches_domain(domain: &str, entry: &str) -> bool {
    domain == entry || domain.ends_with(&format!(".{}", entry))
}

pub fn is_blocklisted(domain: &str) -> bool {
    DOMAIN_BLOCKLIST.iter().any(|blocked| matches_domain(domain, blocked))
}

pub fn authority(domain: &str) -> f64 {
    if is_blocklisted(domain) {
        return 0.0;
    }
    if let Some((_, score)) = AUTHORITY_TABLE.iter().find(|(entry, _)| domain == *entry) {
        return *score;
    }
    if let Some((_, score)) = AUTHORITY_TABLE
        .iter()
        .find(|(entry, _)| matches_domain(domain, entry))
    {
        return score * SUBDOMAIN_FACTOR;
    }
    if domain.ends_with(".gov") || domain.ends_with(".edu") || domain.contains(".gov.") || domain.contains(".edu.") {
        INSTITUTIONAL_AUTHORITY
    } else if domain.ends_with(".org") {
        ORG_AUTHORITY
    } else {
        UNKNOWN_AUTHORITY
    }
}

fn relevance(result: &SearchResult, analysis: &QueryAnalysis) -> f64 {
    let title_tokens = text::tokenize(&result.title);
    let snippet_tokens = text::tokenize(&result.snippet);

    let title_set = title_tokens.iter().map(String::as_str).collect::<HashSet<_>>();
    let all_set = title_tokens
        .iter()
        .chain(snippet_tokens.iter())
        .map(String::as_str)
        .collect::<HashSet<_>>();

    match (coverage(&analysis.keywords, &all_set), coverage(&analysis.keywords, &title_set)) {
        (Some(any), Some(title)) => 0.7 * any + 0.3 * title,
        _ => NEUTRAL_RELEVANCE,
    }
}

/// Exponential decay by age. Time-sensitive queries use a shorter half-life.
fn freshness(published: Option<DateTime<Utc>>, recency_importance: f64, now: DateTime<Utc>) -> f64 {
    let Some(published) = published else {
        return NEUTRAL_FRESHNESS;
    };
    let age_days = (now - published).num_seconds().max(0) as f64 / 86_400.0;
    let half_life = (365.0 * (1.0 - 0.9 * recency_importance.clamp(0.0, 1.0))).max(7.0);
    0.5f64.powf(age_days / half_life)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::QueryAnalyzer;
    use chrono::Duration;

    fn result(url: &str, title: &str, snippet: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: title.to_string(),
            snippet: snippet.to_string(),
            published_date: None,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z")
            .map(|d| d.with_timezone(&Utc))
            .unwrap()
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.Example.com/a?b=1").as_deref(), Some("example.com"));
        assert_eq!(extract_domain("not a url"), None);
        assert_eq!(extract_domain("ftp://files.example.com/x"), None);
    }

    #[test]
    fn test_authority_tiers() {
        assert_eq!(authority("nih.gov"), 1.0);
        assert!((authority("en.wikipedia.org") - 0.9 * SUBDOMAIN_FACTOR).abs() < 1e-9);
        assert_eq!(authority("cs.stanford.edu"), INSTITUTIONAL_AUTHORITY);
        assert_eq!(authority("gov.uk"), UNKNOWN_AUTHORITY);
        assert_eq!(authority("service.gov.uk"), INSTITUTIONAL_AUTHORITY);
        assert_eq!(authority("someproject.org"), ORG_AUTHORITY);
        assert_eq!(authority("randomblog.net"), UNKNOWN_AUTHORITY);
        assert_eq!(authority("m.youtube.com"), 0.0);
    }

    #[test]
    fn test_blocklisted_results_are_dropped() {
        let analysis = QueryAnalyzer::new().analyze("rust ownership");
        let ranked = SourceRanker::default().rank_at(
            &[
                result("https://www.youtube.com/watch?v=1", "Rust ownership video", "rust ownership"),
                result("https://doc.rust-lang.org/book/ch04.html", "Ownership", "rust ownership rules"),
            ],
            &analysis,
            now(),
        );
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].url.contains("rust-lang"));
    }

    #[test]
    fn test_scores_are_bounded_and_sorted() {
        let analysis = QueryAnalyzer::new().analyze("photosynthesis light reactions");
        let results = vec![
            result("https://blog.example.net/post", "My garden", "plants are nice"),
            result("https://en.wikipedia.org/wiki/Photosynthesis", "Photosynthesis", "light reactions in photosynthesis"),
            result("https://biology.stanford.edu/photosynthesis", "Photosynthesis light", "reactions"),
        ];
        let ranked = SourceRanker::default().rank_at(&results, &analysis, now());

        assert_eq!(ranked.len(), 3);
        for pair in ranked.windows(2) {
            assert!(pair[0].final_score >= pair[1].final_score);
        }
        for score in &ranked {
            for value in [score.relevance_score, score.authority_score, score.freshness_score, score.final_score] {
                assert!((0.0..=1.0).contains(&value));
            }
        }
        assert!(ranked[2].url.contains("blog.example.net"));
    }

    #[test]
    fn test_ties_keep_search_order_and_duplicates_drop() {
        let analysis = QueryAnalyzer::new().analyze("widgets");
        let results = vec![
            result("https://a.example.com/", "widgets", "widgets"),
            result("https://b.example.com/", "widgets", "widgets"),
            result("https://a.example.com/", "widgets", "widgets"),
        ];
        let ranked = SourceRanker::default().rank_at(&results, &analysis, now());
        let urls: Vec<_> = ranked.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example.com/", "https://b.example.com/"]);
    }

    #[test]
    fn test_missing_date_gets_neutral_freshness() {
        assert_eq!(freshness(None, 0.9, now()), NEUTRAL_FRESHNESS);
        assert_eq!(freshness(Some(now()), 0.9, now()), 1.0);
        assert_eq!(freshness(Some(now() + Duration::days(3)), 0.1, now()), 1.0);

        let year_old = Some(now() - Duration::days(365));
        assert!(freshness(year_old, 0.9, now()) < freshness(year_old, 0.1, now()));
    }

    #[test]
    fn test_weights_sum_to_one() {
        let ranker = SourceRanker::default();
        for recency in [0.0, 0.1, 0.49, 0.5, 0.8, 1.0] {
            let w = ranker.weights_for(recency);
            assert!((w.relevance + w.authority + w.freshness - 1.0).abs() < 1e-9);
        }
        assert!(ranker.weights_for(1.0).freshness > ranker.weights_for(0.0).freshness);
    }

    #[test]
    fn test_recency_promotes_fresh_sources() {
        let analysis = QueryAnalyzer::new().analyze("latest election news today");
        let mut old = result("https://old.example.com/", "election news", "election news");
        old.published_date = Some(now() - Duration::days(400));
        let mut fresh = result("https://fresh.example.com/", "election news", "election news");
        fresh.published_date = Some(now() - Duration::days(1));

        let ranked = SourceRanker::default().rank_at(&[old, fresh], &analysis, now());
        assert_eq!(ranked[0].url, "https://fresh.example.com/");
    }

    #[test]
    fn test_output_is_capped() {
        let analysis = QueryAnalyzer::new().analyze("widgets");
        let results: Vec<_> = (0..30)
            .map(|i| result(&format!("https://site{}.example.com/", i), "widgets", ""))
            .collect();
        let ranked = SourceRanker::new(RankingConfig { max_ranked_sources: 12, ..Default::default() })
            .rank_at(&results, &analysis, now());
        assert_eq!(ranked.len(), 12);
    }
}
