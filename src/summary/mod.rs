//! Adaptive Summary Generation
//!
//! Sizes the answer from the query analysis and the evidence actually
//! gathered, then produces the text through the synthesis service. The
//! service call is retried for transient errors and the whole retrying call
//! is guarded by a circuit breaker:
//!
//! ```text
//! accepted sources ──▶ build_config ──▶ breaker.call(with_retry(synthesize))
//!                                              │ open / exhausted / permanent
//!                                              ▼
//!                                      extractive fallback
//! ```
//!
//! With no accepted sources at all the answer is built from search snippets
//! and the service is never called.

pub mod extractive;
pub mod synthesis;

pub use extractive::extractive_summary;
pub use synthesis::{LlmSynthesisService, SynthesisService};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::models::{
    DetailLevel, EnhancedSource, QueryAnalysis, QueryComplexity, QueryIntent, SummaryConfig, SummaryLength,
    SynthesisMode,
};
use crate::types::{AppResult, ResearchError};
use crate::utils::text::{is_stop_word, tokenize};
use crate::utils::{with_retry, BreakerError, CircuitBreaker, RetryPolicy};

const COMPARISON_LONG_BASE: usize = 700;
const RICH_EVIDENCE_SOURCES: usize = 6;
const RICH_EVIDENCE_FACTOR: f64 = 1.2;
const MAX_FOCUS_AREAS: usize = 5;
const MIN_FOCUS_TERM_CHARS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub answer: String,
    pub mode: SynthesisMode,
    pub config: SummaryConfig,
}

pub struct AdaptiveSummaryGenerator {
    service: Option<Arc<dyn SynthesisService>>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl AdaptiveSummaryGenerator {
    pub fn new(
        service: Option<Arc<dyn SynthesisService>>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
    ) -> Self {
        Self { service, breaker, retry }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Derive the summary shape from the analysis and the accepted evidence
    pub fn build_config(analysis: &QueryAnalysis, sources: &[EnhancedSource]) -> SummaryConfig {
        SummaryConfig {
            target_length: target_length(analysis, sources),
            detail_level: detail_level(analysis.complexity, analysis.intent),
            focus_areas: focus_areas(sources),
            include_examples: analysis.complexity == QueryComplexity::Complex,
        }
    }

    pub async fn summarize(
        &self,
        query: &str,
        analysis: &QueryAnalysis,
        sources: &[EnhancedSource],
        fallback_snippets: &[String],
    ) -> AppResult<SummaryOutcome> {
        let config = Self::build_config(analysis, sources);
        info!(
            target_length = config.target_length,
            detail = ?config.detail_level,
            sources = sources.len(),
            "Summary config built"
        );

        if sources.is_empty() {
            warn!("No accepted sources, building degraded answer from search snippets");
            let answer = extractive_summary(query, fallback_snippets.iter().map(String::as_str), config.target_length)
                .unwrap_or_else(|| format!("No readable content could be retrieved for '{}'.", query.trim()));
            return Ok(SummaryOutcome {
                answer,
                mode: SynthesisMode::Degraded,
                config,
            });
        }

        let Some(service) = &self.service else {
            warn!("No synthesis service configured, using extractive summary");
            return self.fallback(query, sources, config, "no synthesis service configured");
        };

        let result = self
            .breaker
            .call(|| with_retry(&self.retry, || service.synthesize(query, sources, &config)))
            .await;

        match result {
            Ok(answer) if !answer.trim().is_empty() => Ok(SummaryOutcome {
                answer,
                mode: SynthesisMode::Synthesized,
                config,
            }),
            Ok(_) => {
                warn!("Synthesis returned an empty answer, using extractive summary");
                self.fallback(query, sources, config, "empty synthesis result")
            }
            Err(BreakerError::Open) => {
                warn!("Circuit breaker open, skipping synthesis");
                self.fallback(query, sources, config, "circuit breaker open")
            }
            Err(BreakerError::Inner(e)) => {
                warn!(error = %e, "Synthesis failed, using extractive summary");
                let reason = e.to_string();
                self.fallback(query, sources, config, &reason)
            }
        }
    }

    fn fallback(
        &self,
        query: &str,
        sources: &[EnhancedSource],
        config: SummaryConfig,
        reason: &str,
    ) -> AppResult<SummaryOutcome> {
        let answer = extractive_summary(
            query,
            sources.iter().map(|s| s.main_content.as_str()),
            config.target_length,
        )
        .ok_or_else(|| ResearchError::SynthesisUnavailable {
            reason: reason.to_string(),
        })?;

        Ok(SummaryOutcome {
            answer,
            mode: SynthesisMode::ExtractiveFallback,
            config,
        })
    }
}

fn target_length(analysis: &QueryAnalysis, sources: &[EnhancedSource]) -> usize {
    let (min, max) = analysis.expected_length.word_range();
    let base = if analysis.intent == QueryIntent::Comparison && analysis.expected_length == SummaryLength::Long {
        COMPARISON_LONG_BASE as f64
    } else {
        ((min + max) / 2) as f64
    };

    let n = sources.len() as f64;
    let words = sources.iter().map(|s| s.word_count).sum::<usize>() as f64;
    let strength = (n / 3.0).min(words / (2.0 * base)).min(1.0);

    let scaled = if sources.len() >= RICH_EVIDENCE_SOURCES && words >= 4.0 * base {
        base * RICH_EVIDENCE_FACTOR
    } else {
        base * (0.5 + 0.5 * strength)
    };

    (scaled.round() as usize).clamp(min, max)
}

fn detail_level(complexity: QueryComplexity, intent: QueryIntent) -> DetailLevel {
    match (intent, complexity) {
        (QueryIntent::Comparison, _) => DetailLevel::Comprehensive,
        (QueryIntent::Research, QueryComplexity::Complex) => DetailLevel::Comprehensive,
        (QueryIntent::Research, _) => DetailLevel::Balanced,
        (QueryIntent::Factual, _) => DetailLevel::Concise,
        (QueryIntent::Other, QueryComplexity::Simple) => DetailLevel::Concise,
        (QueryIntent::Other, QueryComplexity::Moderate) => DetailLevel::Balanced,
        (QueryIntent::Other, QueryComplexity::Complex) => DetailLevel::Comprehensive,
    }
}

/// Terms shared across sources, by document frequency then term frequency
fn focus_areas(sources: &[EnhancedSource]) -> Vec<String> {
    // term -> (document frequency, term frequency)
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();

    for source in sources {
        let mut in_doc = HashSet::new();
        for token in tokenize(&source.main_content) {
            if token.chars().count() < MIN_FOCUS_TERM_CHARS
                || !token.chars().all(char::is_alphabetic)
                || is_stop_word(&token)
            {
                continue;
            }
            let entry = counts.entry(token.clone()).or_default();
            entry.1 += 1;
            if in_doc.insert(token) {
                entry.0 += 1;
            }
        }
    }

    let min_docs = if sources.len() >= 2 { 2 } else { 1 };
    let mut terms: Vec<(String, (usize, usize))> =
        counts.into_iter().filter(|(_, (df, _))| *df >= min_docs).collect();
    // BTreeMap order makes the alphabetical tiebreak implicit in a stable sort
    terms.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(b.1 .1.cmp(&a.1 .1)));

    terms.into_iter().take(MAX_FOCUS_AREAS).map(|(term, _)| term).collect()
}
