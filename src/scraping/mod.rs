//! Concurrent Scraping
//!
//! Fetches ranked sources with bounded concurrency and stops as soon as the
//! accepted set is good enough.
//!
//! ```text
//! ranked sources (rank order)
//!      │
//!      ├── cache hit ──────────────┐
//!      │                           ▼
//!      └── fetch (≤ max_concurrent, timeout each) ──▶ assess ──▶ accept? ──▶ stopping rule
//!                                                                            │
//!                                              no new dispatches once it fires
//! ```
//!
//! A single task drives every fetch future through a `FuturesUnordered`, so
//! completions are processed one at a time in completion order and only that
//! task touches the accepted set. Fetches already in flight when the stopping
//! rule fires still complete and are still considered. Failed fetches are
//! recorded and never retried.

pub mod http;

pub use http::HttpPageFetcher;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::CacheManager;
use crate::config::ScraperConfig;
use crate::models::{ContentQuality, EnhancedSource, PageContent, QueryAnalysis, ScrapingResult, SourceScore};
use crate::quality::{ContentQualityAssessor, StoppingPolicy};
use crate::types::FetchError;

/// Retrieves the main content of one page. Dropping the returned future
/// cancels the fetch.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageContent, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct ScrapeOutcome {
    /// Every attempt, in completion order
    pub results: Vec<ScrapingResult>,
    /// Accepted sources, in completion order
    pub accepted: Vec<EnhancedSource>,
    pub stopped_early: bool,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl ScrapeOutcome {
    pub fn stats(&self) -> ScrapingStats {
        ScrapingStats::from_results(&self.results)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScrapingStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub avg_duration: Duration,
    pub max_duration: Duration,
    pub min_duration: Duration,
}

impl ScrapingStats {
    pub fn from_results(results: &[ScrapingResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }
        let successful = results.iter().filter(|r| r.success).count();
        let total_duration: Duration = results.iter().map(|r| r.duration).sum();
        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            success_rate: successful as f64 / results.len() as f64,
            avg_duration: total_duration / results.len() as u32,
            max_duration: results.iter().map(|r| r.duration).max().unwrap_or_default(),
            min_duration: results.iter().map(|r| r.duration).min().unwrap_or_default(),
        }
    }
}

pub struct ConcurrentScraperManager {
    fetcher: Arc<dyn PageFetcher>,
    assessor: ContentQualityAssessor,
    policy: StoppingPolicy,
    cache: Option<Arc<CacheManager>>,
    config: ScraperConfig,
}

/// Mutable state of one scrape run, owned by the driving task
struct RunState<'a> {
    query: &'a str,
    analysis: &'a QueryAnalysis,
    outcome: ScrapeOutcome,
    history: Vec<ContentQuality>,
    stop: bool,
}

impl ConcurrentScraperManager {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        assessor: ContentQualityAssessor,
        policy: StoppingPolicy,
        config: ScraperConfig,
    ) -> Self {
        Self {
            fetcher,
            assessor,
            policy,
            cache: None,
            config,
        }
    }

    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Scrape with the configured concurrency and timeout
    pub async fn scrape_sources(
        &self,
        query: &str,
        analysis: &QueryAnalysis,
        ranked: &[SourceScore],
    ) -> ScrapeOutcome {
        self.scrape(
            query,
            analysis,
            ranked,
            self.config.max_concurrent,
            self.config.timeout_per_source,
        )
        .await
    }

    pub async fn scrape(
        &self,
        query: &str,
        analysis: &QueryAnalysis,
        ranked: &[SourceScore],
        max_concurrent: usize,
        timeout_per_source: Duration,
    ) -> ScrapeOutcome {
        let max_concurrent = max_concurrent.max(1);
        info!(
            sources = ranked.len(),
            max_concurrent,
            timeout_ms = timeout_per_source.as_millis() as u64,
            max_sources = self.policy.config().max_sources,
            "Starting concurrent scrape"
        );

        let mut run = RunState {
            query,
            analysis,
            outcome: ScrapeOutcome::default(),
            history: Vec::new(),
            stop: false,
        };
        let mut pending = ranked.iter();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while !run.stop && in_flight.len() < max_concurrent {
                let Some(source) = pending.next() else { break };

                if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&source.url, query)) {
                    run.outcome.cache_hits += 1;
                    debug!(url = %source.url, "Serving source from cache");
                    let result = ScrapingResult::cached(&source.url, cached.to_page());
                    self.handle_completion(&mut run, result);
                    continue;
                }
                if self.cache.is_some() {
                    run.outcome.cache_misses += 1;
                }

                in_flight.push(fetch_one(
                    Arc::clone(&self.fetcher),
                    source.url.clone(),
                    timeout_per_source,
                ));
            }

            match in_flight.next().await {
                Some(result) => self.handle_completion(&mut run, result),
                None => break,
            }
        }

        let outcome = run.outcome;
        let stats = outcome.stats();
        info!(
            attempted = stats.total,
            succeeded = stats.successful,
            failed = stats.failed,
            accepted = outcome.accepted.len(),
            cache_hits = outcome.cache_hits,
            stopped_early = outcome.stopped_early,
            "Scrape complete"
        );
        outcome
    }

    fn handle_completion(&self, run: &mut RunState<'_>, result: ScrapingResult) {
        if let Some(page) = result.content.as_ref().filter(|_| result.success) {
            let mut quality = self.assessor.assess(page, run.analysis);
            let duplicate = self.assessor.is_duplicate(
                &page.main_content,
                run.outcome.accepted.iter().map(|s| s.main_content.as_str()),
            );
            quality.duplicate_content = duplicate;

            let source = EnhancedSource::from_page(&result.url, page.clone(), quality.clone(), result.duration);
            if !result.from_cache {
                if let Some(cache) = &self.cache {
                    cache.put(source.clone(), run.query, None);
                }
            }

            if duplicate {
                debug!(url = %result.url, "Rejected near-duplicate content");
            } else if quality.relevance_score < self.config.min_relevance {
                debug!(
                    url = %result.url,
                    relevance = quality.relevance_score,
                    "Rejected low-relevance content"
                );
            } else {
                debug!(
                    url = %result.url,
                    relevance = quality.relevance_score,
                    density = quality.information_density,
                    words = quality.content_length,
                    "Accepted source"
                );
                run.outcome.accepted.push(source);
                run.history.push(quality);

                if !run.stop {
                    if let Some(reason) = self.policy.stop_reason(&run.history) {
                        info!(accepted = run.history.len(), reason = ?reason, "Stopping rule fired");
                        run.stop = true;
                        run.outcome.stopped_early = true;
                    }
                }
            }
        } else {
            warn!(
                url = %result.url,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Source fetch failed"
            );
        }

        run.outcome.results.push(result);
    }
}

async fn fetch_one(fetcher: Arc<dyn PageFetcher>, url: String, timeout: Duration) -> ScrapingResult {
    let started = Instant::now();
    match tokio::time::timeout(timeout, fetcher.fetch(&url)).await {
        Ok(Ok(page)) => ScrapingResult::succeeded(url, page, started.elapsed()),
        Ok(Err(err)) => ScrapingResult::failed(url, err.to_string(), started.elapsed()),
        Err(_) => ScrapingResult::failed(url, "timeout", started.elapsed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::QueryAnalyzer;
    use crate::config::{CacheConfig, StoppingConfig};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted fetcher that tracks how many fetches run at once
    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, (Duration, Result<PageContent, FetchError>)>,
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with(mut self, url: &str, latency_ms: u64, page: Result<PageContent, FetchError>) -> Self {
            self.pages.insert(url.to_string(), (Duration::from_millis(latency_ms), page));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<PageContent, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            struct Release<'a>(&'a AtomicUsize);
            impl Drop for Release<'_> {
                fn drop(&mut self) {
                    self.0.fetch_sub(1, Ordering::SeqCst);
                }
            }
            let _release = Release(&self.current);

            let (latency, page) = self
                .pages
                .get(url)
                .cloned()
                .unwrap_or((Duration::from_millis(10), Err(FetchError::Status(404))));
            tokio::time::sleep(latency).await;
            page
        }
    }

    fn article(topic: usize) -> PageContent {
        let body = (0..6)
            .map(|s| {
                format!(
                    "Photosynthesis note{t}x{s} describes chloroplast{t} pigment{s} behaviour under light{t}y{s} conditions.",
                    t = topic,
                    s = s
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        PageContent {
            title: format!("Photosynthesis guide {}", topic),
            main_content: body,
            ..Default::default()
        }
    }

    fn junk(topic: usize) -> PageContent {
        PageContent {
            title: "Garden shop".into(),
            main_content: format!("Buy shovels{} and rakes today at discount prices.", topic),
            ..Default::default()
        }
    }

    fn ranked(urls: &[String]) -> Vec<SourceScore> {
        urls.iter()
            .map(|url| SourceScore {
                url: url.clone(),
                title: String::new(),
                snippet: String::new(),
                relevance_score: 0.5,
                authority_score: 0.5,
                freshness_score: 0.5,
                final_score: 0.5,
            })
            .collect()
    }

    fn manager(fetcher: Arc<FakeFetcher>, stopping: StoppingConfig) -> ConcurrentScraperManager {
        ConcurrentScraperManager::new(
            fetcher,
            ContentQualityAssessor::default(),
            StoppingPolicy::new(stopping),
            ScraperConfig::default(),
        )
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://site{}.example.com/", i)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_limit() {
        let urls = urls(12);
        let mut fetcher = FakeFetcher::default();
        for (i, url) in urls.iter().enumerate() {
            fetcher = fetcher.with(url, 50 + (i as u64 * 37) % 200, Ok(junk(i)));
        }
        let fetcher = Arc::new(fetcher);
        let analysis = QueryAnalyzer::new().analyze("What is photosynthesis?");

        let outcome = manager(fetcher.clone(), StoppingConfig::default())
            .scrape("What is photosynthesis?", &analysis, &ranked(&urls), 3, Duration::from_secs(10))
            .await;

        assert_eq!(outcome.results.len(), 12);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 3);
        assert!(outcome.accepted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_recorded_and_does_not_block() {
        let urls = urls(2);
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with(&urls[0], 60_000, Ok(article(0)))
                .with(&urls[1], 100, Ok(article(1))),
        );
        let analysis = QueryAnalyzer::new().analyze("What is photosynthesis?");

        let started = Instant::now();
        let outcome = manager(fetcher, StoppingConfig::default())
            .scrape("What is photosynthesis?", &analysis, &ranked(&urls), 5, Duration::from_secs(2))
            .await;

        assert!(started.elapsed() <= Duration::from_millis(2_050));
        let slow = outcome.results.iter().find(|r| r.url == urls[0]).unwrap();
        assert!(!slow.success);
        assert_eq!(slow.error.as_deref(), Some("timeout"));
        assert_eq!(outcome.accepted.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopping_rule_prevents_new_dispatches() {
        let urls = urls(12);
        let mut fetcher = FakeFetcher::default();
        for (i, url) in urls.iter().enumerate() {
            fetcher = fetcher.with(url, 100 * (i as u64 + 1), Ok(article(i)));
        }
        let fetcher = Arc::new(fetcher);
        let analysis = QueryAnalyzer::new().analyze("What is photosynthesis?");

        let outcome = manager(fetcher.clone(), StoppingConfig::default())
            .scrape("What is photosynthesis?", &analysis, &ranked(&urls), 2, Duration::from_secs(10))
            .await;

        // the third acceptance fires the rule; the one fetch still in flight completes
        assert!(outcome.stopped_early);
        assert_eq!(outcome.accepted.len(), 4);
        assert_eq!(fetcher.calls().len(), 4);
        assert_eq!(outcome.results.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_near_duplicates_are_not_accepted() {
        let urls = urls(3);
        let mirrored = PageContent {
            title: "Mirror".into(),
            ..article(0)
        };
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with(&urls[0], 10, Ok(article(0)))
                .with(&urls[1], 20, Ok(mirrored))
                .with(&urls[2], 30, Ok(article(2))),
        );
        let analysis = QueryAnalyzer::new().analyze("What is photosynthesis?");

        let outcome = manager(fetcher, StoppingConfig::default())
            .scrape_sources("What is photosynthesis?", &analysis, &ranked(&urls))
            .await;

        let accepted: Vec<_> = outcome.accepted.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(accepted, vec![urls[0].as_str(), urls[2].as_str()]);
        assert_eq!(outcome.results.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failures_yield_empty_accepted_set() {
        let urls = urls(4);
        let mut fetcher = FakeFetcher::default();
        for url in &urls {
            fetcher = fetcher.with(url, 10, Err(FetchError::Status(503)));
        }
        let analysis = QueryAnalyzer::new().analyze("What is photosynthesis?");

        let outcome = manager(Arc::new(fetcher), StoppingConfig::default())
            .scrape_sources("What is photosynthesis?", &analysis, &ranked(&urls))
            .await;

        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.results.len(), 4);
        assert!(outcome.results.iter().all(|r| !r.success && r.error.is_some()));
        let stats = outcome.stats();
        assert_eq!((stats.total, stats.failed, stats.success_rate), (4, 4, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hits_skip_fetching() {
        let urls = urls(2);
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with(&urls[0], 10, Ok(article(0)))
                .with(&urls[1], 10, Ok(article(1))),
        );
        let cache = Arc::new(CacheManager::new(CacheConfig::default()));
        let analysis = QueryAnalyzer::new().analyze("What is photosynthesis?");
        let scraper = manager(fetcher.clone(), StoppingConfig::default()).with_cache(cache.clone());

        let first = scraper.scrape_sources("What is photosynthesis?", &analysis, &ranked(&urls)).await;
        assert_eq!((first.cache_hits, first.cache_misses), (0, 2));
        assert_eq!(cache.len(), 2);

        let second = scraper.scrape_sources("what is  photosynthesis?", &analysis, &ranked(&urls)).await;
        assert_eq!((second.cache_hits, second.cache_misses), (2, 0));
        assert_eq!(fetcher.calls().len(), 2);
        assert_eq!(second.accepted.len(), 2);
        assert!(second.results.iter().all(|r| r.from_cache));
    }

    #[test]
    fn test_scraping_stats() {
        let results = vec![
            ScrapingResult::succeeded("a", PageContent::default(), Duration::from_millis(100)),
            ScrapingResult::failed("b", "timeout", Duration::from_millis(300)),
        ];
        let stats = ScrapingStats::from_results(&results);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.success_rate, 0.5);
        assert_eq!(stats.avg_duration, Duration::from_millis(200));
        assert_eq!(stats.max_duration, Duration::from_millis(300));
        assert_eq!(stats.min_duration, Duration::from_millis(100));
        assert_eq!(ScrapingStats::from_results(&[]), ScrapingStats::default());
    }
}
