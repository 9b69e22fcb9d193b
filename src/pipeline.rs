//! Research Pipeline
//!
//! Runs one query end to end:
//!
//! ```text
//! Query
//!   │
//!   ▼
//! ┌──────────────┐
//! │   Search     │  → raw results (bounded by search_timeout)
//! └──────────────┘
//!   │
//!   ▼
//! ┌──────────────┐
//! │  Analyzer    │  → complexity, intent, domain, recency
//! └──────────────┘
//!   │
//!   ▼
//! ┌──────────────┐
//! │   Ranker     │  → scored, blocklist-filtered sources
//! └──────────────┘
//!   │
//!   ▼
//! ┌──────────────┐
//! │   Scraper    │  → accepted sources (concurrent, early stop, cached)
//! └──────────────┘
//!   │
//!   ▼
//! ┌──────────────┐
//! │  Summarizer  │  → answer (breaker + retry, extractive fallback)
//! └──────────────┘
//!   │
//!   ▼
//! ResearchResponse
//! ```
//!
//! Failures below this level are absorbed. Only an empty query, a search
//! that yields no usable source, and a synthesis failure with no usable
//! fallback reach the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::analysis::QueryAnalyzer;
use crate::cache::CacheManager;
use crate::config::Config;
use crate::models::{ResearchMetrics, ResearchResponse, SearchResult};
use crate::quality::{ContentQualityAssessor, StoppingPolicy};
use crate::ranking::SourceRanker;
use crate::scraping::{ConcurrentScraperManager, PageFetcher};
use crate::search::{SearchClient, SearchError};
use crate::summary::{AdaptiveSummaryGenerator, SynthesisService};
use crate::types::{duration_ms, AppResult, ResearchError};
use crate::utils::{CircuitBreaker, RetryPolicy};

pub struct ResearchPipeline {
    search: Arc<dyn SearchClient>,
    analyzer: QueryAnalyzer,
    ranker: SourceRanker,
    scraper: ConcurrentScraperManager,
    summarizer: AdaptiveSummaryGenerator,
    search_timeout: Duration,
}

impl ResearchPipeline {
    pub fn new(
        search: Arc<dyn SearchClient>,
        ranker: SourceRanker,
        scraper: ConcurrentScraperManager,
        summarizer: AdaptiveSummaryGenerator,
        search_timeout: Duration,
    ) -> Self {
        Self {
            search,
            analyzer: QueryAnalyzer::new(),
            ranker,
            scraper,
            summarizer,
            search_timeout,
        }
    }

    /// Wire every stage from configuration. `synthesis` is `None` when no
    /// synthesis backend is configured.
    pub fn from_config(
        config: &Config,
        search: Arc<dyn SearchClient>,
        fetcher: Arc<dyn PageFetcher>,
        synthesis: Option<Arc<dyn SynthesisService>>,
    ) -> Self {
        let mut scraper = ConcurrentScraperManager::new(
            fetcher,
            ContentQualityAssessor::new(config.quality.clone()),
            StoppingPolicy::new(config.stopping.clone()),
            config.scraper.clone(),
        );
        if config.cache.enabled {
            scraper = scraper.with_cache(Arc::new(CacheManager::new(config.cache.clone())));
        }

        let summarizer = AdaptiveSummaryGenerator::new(
            synthesis,
            Arc::new(CircuitBreaker::new("synthesis", config.breaker.clone())),
            RetryPolicy::new(config.retry.clone()),
        );

        Self::new(
            search,
            SourceRanker::new(config.ranking.clone()),
            scraper,
            summarizer,
            config.search.timeout,
        )
    }

    pub async fn research(&self, query: &str) -> AppResult<ResearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::InvalidQuery);
        }

        let query_id = Uuid::new_v4();
        let span = tracing::info_span!("research", query_id = %query_id);
        self.run(query_id, query).instrument(span).await
    }

    async fn run(&self, query_id: Uuid, query: &str) -> AppResult<ResearchResponse> {
        let started = Instant::now();
        info!(query = %query, "Starting research");

        let mut metrics = ResearchMetrics::default();

        let search_started = Instant::now();
        let results = self.search_with_timeout(query).await;
        metrics.search_ms = duration_ms(search_started.elapsed());
        metrics.sources_found = results.len();

        if results.is_empty() {
            return Err(ResearchError::NoSourcesFound {
                query: query.to_string(),
            });
        }

        let analysis = self.analyzer.analyze(query);
        let ranked = self.ranker.rank(&results, &analysis);
        metrics.sources_ranked = ranked.len();

        if ranked.is_empty() {
            warn!(found = results.len(), "Every search result was filtered out");
            return Err(ResearchError::NoSourcesFound {
                query: query.to_string(),
            });
        }

        let scrape_started = Instant::now();
        let outcome = self.scraper.scrape_sources(query, &analysis, &ranked).await;
        metrics.scrape_ms = duration_ms(scrape_started.elapsed());

        let stats = outcome.stats();
        metrics.sources_attempted = stats.total;
        metrics.sources_succeeded = stats.successful;
        metrics.sources_failed = stats.failed;
        metrics.sources_accepted = outcome.accepted.len();
        metrics.cache_hits = outcome.cache_hits;
        metrics.cache_misses = outcome.cache_misses;
        metrics.stopped_early = outcome.stopped_early;

        let snippets: Vec<String> = ranked
            .iter()
            .map(|s| s.snippet.clone())
            .filter(|s| !s.trim().is_empty())
            .collect();

        let synthesis_started = Instant::now();
        let summary = self
            .summarizer
            .summarize(query, &analysis, &outcome.accepted, &snippets)
            .await?;
        metrics.synthesis_ms = duration_ms(synthesis_started.elapsed());
        metrics.total_ms = duration_ms(started.elapsed());

        info!(
            mode = ?summary.mode,
            accepted = metrics.sources_accepted,
            attempted = metrics.sources_attempted,
            total_ms = metrics.total_ms,
            "Research complete"
        );

        Ok(ResearchResponse {
            query_id,
            query: query.to_string(),
            answer: summary.answer,
            sources_used: outcome.accepted.iter().map(|s| s.url.clone()).collect(),
            synthesis_mode: summary.mode,
            analysis,
            summary_config: summary.config,
            metrics,
        })
    }

    /// Search failures and timeouts count as an empty result
    async fn search_with_timeout(&self, query: &str) -> Vec<SearchResult> {
        match self.bounded_search(query).await {
            Ok(results) => {
                info!(count = results.len(), "Search returned results");
                results
            }
            Err(e) => {
                warn!(error = %e, timeout_secs = self.search_timeout.as_secs(), "Search failed");
                Vec::new()
            }
        }
    }

    async fn bounded_search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        tokio::time::timeout(self.search_timeout, self.search.search(query))
            .await
            .map_err(|_| SearchError::Timeout)?
    }
}
