use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::types::LLMProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    pub llm: LLMConfig,
    pub ranking: RankingConfig,
    pub scraper: ScraperConfig,
    pub quality: QualityConfig,
    pub stopping: StoppingConfig,
    pub cache: CacheConfig,
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub serpapi_key: String,
    pub max_results: usize,
    pub timeout: Duration,
    /// SerpAPI `hl` parameter
    pub language: String,
    /// SerpAPI `gl` parameter
    pub country: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            serpapi_key: String::new(),
            max_results: 20,
            timeout: Duration::from_secs(15),
            language: "en".to_string(),
            country: "us".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LLMConfig {
    /// API key if one is configured
    pub fn active_api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            base_url: None,
            max_tokens: 1500,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    /// Upper bound on ranked sources handed to the scraper
    pub max_ranked_sources: usize,
    /// Recency importance at which freshness gets extra weight
    pub recency_reweight_threshold: f64,
}

const MIN_RANKED_SOURCES: usize = 10;
const MAX_RANKED_SOURCES: usize = 15;

impl RankingConfig {
    /// Keep the ranked-source cap within 10..=15
    pub fn bounded_cap(requested: usize) -> usize {
        requested.clamp(MIN_RANKED_SOURCES, MAX_RANKED_SOURCES)
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            max_ranked_sources: 15,
            recency_reweight_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    pub max_concurrent: usize,
    pub timeout_per_source: Duration,
    /// Successful fetches below this relevance are not accepted
    pub min_relevance: f64,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            timeout_per_source: Duration::from_secs(10),
            min_relevance: 0.2,
            user_agent: format!("websift/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualityConfig {
    pub duplicate_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { duplicate_threshold: 0.8 }
    }
}

/// Thresholds of the early-termination rule
#[derive(Debug, Clone, Deserialize)]
pub struct StoppingConfig {
    /// Hard cap on accepted sources
    pub max_sources: usize,
    /// Accepted sources needed before coverage can end the run
    pub min_sources: usize,
    /// Mean relevance must be strictly above this for coverage
    pub coverage_relevance: f64,
    /// Mean density must be strictly above this for coverage
    pub coverage_density: f64,
    /// Acceptances below this relevance count towards diminishing returns
    pub low_quality_relevance: f64,
    pub diminishing_returns_streak: usize,
}

impl Default for StoppingConfig {
    fn default() -> Self {
        Self {
            max_sources: 10,
            min_sources: 3,
            coverage_relevance: 0.6,
            coverage_density: 0.35,
            low_quality_relevance: 0.35,
            diminishing_returns_streak: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl: Duration,
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(3600),
            max_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes kept in the failure window
    pub window_size: usize,
    /// Outcomes required in the window before the breaker may trip
    pub min_calls: usize,
    pub failure_rate_threshold: f64,
    pub cooldown: Duration,
    pub max_cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            min_calls: 5,
            failure_rate_threshold: 0.5,
            cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file, stdout only when unset
    pub log_dir: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let search = SearchConfig::default();
        let llm = LLMConfig::default();
        let ranking = RankingConfig::default();
        let scraper = ScraperConfig::default();
        let quality = QualityConfig::default();
        let stopping = StoppingConfig::default();
        let cache = CacheConfig::default();
        let breaker = CircuitBreakerConfig::default();
        let retry = RetryConfig::default();

        Ok(Self {
            search: SearchConfig {
                serpapi_key: env::var("SERPAPI_KEY").unwrap_or_default(),
                max_results: var_or("SEARCH_MAX_RESULTS", search.max_results)?,
                timeout: secs_or("SEARCH_TIMEOUT_SECS", search.timeout)?,
                language: env::var("SEARCH_LANGUAGE").unwrap_or(search.language),
                country: env::var("SEARCH_COUNTRY").unwrap_or(search.country),
            },
            llm: LLMConfig {
                provider: var_or("SYNTHESIS_PROVIDER", llm.provider)?,
                model: env::var("SYNTHESIS_MODEL").unwrap_or(llm.model),
                api_key: env::var("SYNTHESIS_API_KEY").unwrap_or_default(),
                base_url: env::var("SYNTHESIS_BASE_URL").ok().filter(|s| !s.trim().is_empty()),
                max_tokens: var_or("SYNTHESIS_MAX_TOKENS", llm.max_tokens)?,
                temperature: var_or("SYNTHESIS_TEMPERATURE", llm.temperature)?,
            },
            ranking: RankingConfig {
                max_ranked_sources: RankingConfig::bounded_cap(var_or(
                    "MAX_RANKED_SOURCES",
                    ranking.max_ranked_sources,
                )?),
                recency_reweight_threshold: var_or(
                    "RECENCY_REWEIGHT_THRESHOLD",
                    ranking.recency_reweight_threshold,
                )?,
            },
            scraper: ScraperConfig {
                max_concurrent: var_or("MAX_CONCURRENT_SCRAPERS", scraper.max_concurrent)?,
                timeout_per_source: secs_or("SCRAPER_TIMEOUT_SECS", scraper.timeout_per_source)?,
                min_relevance: var_or("MIN_RELEVANCE_SCORE", scraper.min_relevance)?,
                user_agent: env::var("SCRAPER_USER_AGENT").unwrap_or(scraper.user_agent),
            },
            quality: QualityConfig {
                duplicate_threshold: var_or("DUPLICATE_THRESHOLD", quality.duplicate_threshold)?,
            },
            stopping: StoppingConfig {
                max_sources: var_or("MAX_SOURCES_TO_USE", stopping.max_sources)?,
                min_sources: var_or("MIN_SOURCES_FOR_COVERAGE", stopping.min_sources)?,
                coverage_relevance: var_or("COVERAGE_RELEVANCE", stopping.coverage_relevance)?,
                coverage_density: var_or("COVERAGE_DENSITY", stopping.coverage_density)?,
                low_quality_relevance: var_or("LOW_QUALITY_RELEVANCE", stopping.low_quality_relevance)?,
                diminishing_returns_streak: var_or(
                    "DIMINISHING_RETURNS_STREAK",
                    stopping.diminishing_returns_streak,
                )?,
            },
            cache: CacheConfig {
                enabled: var_or("ENABLE_CACHING", cache.enabled)?,
                default_ttl: secs_or("CACHE_TTL_SECONDS", cache.default_ttl)?,
                max_size: var_or("CACHE_MAX_SIZE", cache.max_size)?,
            },
            breaker: CircuitBreakerConfig {
                window_size: var_or("BREAKER_WINDOW_SIZE", breaker.window_size)?,
                min_calls: var_or("BREAKER_MIN_CALLS", breaker.min_calls)?,
                failure_rate_threshold: var_or("BREAKER_FAILURE_RATE", breaker.failure_rate_threshold)?,
                cooldown: secs_or("BREAKER_COOLDOWN_SECS", breaker.cooldown)?,
                max_cooldown: secs_or("BREAKER_MAX_COOLDOWN_SECS", breaker.max_cooldown)?,
            },
            retry: RetryConfig {
                max_retries: var_or("SYNTHESIS_MAX_RETRIES", retry.max_retries)?,
                base_delay: millis_or("RETRY_BASE_DELAY_MS", retry.base_delay)?,
                max_delay: millis_or("RETRY_MAX_DELAY_MS", retry.max_delay)?,
                multiplier: retry.multiplier,
                jitter: retry.jitter,
            },
            logging: LoggingConfig {
                log_dir: env::var("LOG_DIR").ok().filter(|s| !s.trim().is_empty()),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            llm: LLMConfig::default(),
            ranking: RankingConfig::default(),
            scraper: ScraperConfig::default(),
            quality: QualityConfig::default(),
            stopping: StoppingConfig::default(),
            cache: CacheConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset
fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

fn secs_or(key: &str, default: Duration) -> Result<Duration> {
    Ok(Duration::from_secs(var_or(key, default.as_secs())?))
}

fn millis_or(key: &str, default: Duration) -> Result<Duration> {
    let fallback = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Ok(Duration::from_millis(var_or(key, fallback)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = Config::default();
        assert_eq!(config.scraper.max_concurrent, 5);
        assert_eq!(config.scraper.timeout_per_source, Duration::from_secs(10));
        assert_eq!(config.cache.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.ranking.max_ranked_sources, 15);
        assert_eq!(config.stopping.max_sources, 10);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_var_or_parses_and_rejects() {
        env::set_var("WEBSIFT_TEST_VAR_OK", " 7 ");
        assert_eq!(var_or::<usize>("WEBSIFT_TEST_VAR_OK", 1).ok(), Some(7));

        env::set_var("WEBSIFT_TEST_VAR_BAD", "seven");
        assert!(var_or::<usize>("WEBSIFT_TEST_VAR_BAD", 1).is_err());

        assert_eq!(var_or::<usize>("WEBSIFT_TEST_VAR_UNSET", 3).ok(), Some(3));
    }

    #[test]
    fn test_ranked_source_cap_is_bounded() {
        assert_eq!(RankingConfig::bounded_cap(3), 10);
        assert_eq!(RankingConfig::bounded_cap(12), 12);
        assert_eq!(RankingConfig::bounded_cap(100), 15);
    }

    #[test]
    fn test_active_api_key() {
        let mut llm = LLMConfig::default();
        assert!(llm.active_api_key().is_none());
        llm.api_key = "  sk-test ".into();
        assert_eq!(llm.active_api_key(), Some("sk-test"));
    }
}
