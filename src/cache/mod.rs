//! Content Cache
//!
//! In-memory cache of assessed page content, keyed by the normalized
//! (URL, query) pair. The same URL fetched for a different query is a
//! different entry, since its relevance and quality depend on the query.
//!
//! Entries expire lazily: `get` checks the expiry and removes stale entries,
//! and [`CacheManager::cleanup_expired`] can be run as an optional sweep. When
//! the cache is full the least recently accessed entry is evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::models::{CachedContent, EnhancedSource};

/// Source of "now" for expiry decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_requests: u64,
}

impl CacheStatistics {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_requests as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.misses as f64 / self.total_requests as f64
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedContent>,
    stats: CacheStatistics,
}

pub struct CacheManager {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, url: &str, query: &str) -> Option<EnhancedSource> {
        let key = cache_key(url, query);
        let now = self.clock.now();
        let mut guard = self.lock();
        let state = &mut *guard;
        state.stats.total_requests += 1;

        let expired = match state.entries.get_mut(&key) {
            Some(entry) if now <= entry.expiry_time => {
                entry.access_count += 1;
                entry.last_accessed = now;
                let content = entry.content.clone();
                state.stats.hits += 1;
                debug!(url = %url, "Cache hit");
                return Some(content);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.entries.remove(&key);
            state.stats.expirations += 1;
            debug!(url = %url, "Cache entry expired");
        }
        state.stats.misses += 1;
        None
    }

    /// Store `content` for `query`. Writing an existing key replaces the entry
    /// and restarts its TTL.
    pub fn put(&self, content: EnhancedSource, query: &str, ttl: Option<Duration>) {
        let key = cache_key(&content.url, query);
        let now = self.clock.now();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let expiry_time = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        if self.config.max_size == 0 {
            return;
        }
        let mut state = self.lock();
        if !state.entries.contains_key(&key) && state.entries.len() >= self.config.max_size {
            Self::make_room(&mut state, now, self.config.max_size);
        }

        state.entries.insert(
            key,
            CachedContent {
                url: content.url.clone(),
                content,
                cached_at: now,
                query_hash: query_hash(query),
                expiry_time,
                access_count: 0,
                last_accessed: now,
            },
        );
    }

    /// Expired entries go first; the least recently used live entry only
    /// when that frees nothing
    fn make_room(state: &mut CacheState, now: DateTime<Utc>, max_size: usize) {
        let before = state.entries.len();
        state.entries.retain(|_, entry| now <= entry.expiry_time);
        state.stats.expirations += (before - state.entries.len()) as u64;

        if state.entries.len() >= max_size {
            Self::evict_lru(state);
        }
    }

    fn evict_lru(state: &mut CacheState) {
        let oldest = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            state.entries.remove(&key);
            state.stats.evictions += 1;
        }
    }

    /// Seed the cache with sources already assessed for `query`
    pub fn warm(&self, query: &str, sources: impl IntoIterator<Item = EnhancedSource>, ttl: Option<Duration>) -> usize {
        let mut count = 0;
        for source in sources {
            self.put(source, query, ttl);
            count += 1;
        }
        info!(query = %query, count, "Cache warmed");
        count
    }

    /// Drop every entry for `url`, whatever the query
    pub fn invalidate_url(&self, url: &str) -> usize {
        let normalized = normalize_url(url);
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| normalize_url(&entry.url) != normalized);
        before - state.entries.len()
    }

    /// Drop every entry cached for `query`
    pub fn invalidate_query(&self, query: &str) -> usize {
        let hash = query_hash(query);
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.query_hash != hash);
        before - state.entries.len()
    }

    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| now <= entry.expiry_time);
        let removed = before - state.entries.len();
        state.stats.expirations += removed as u64;
        if removed > 0 {
            debug!(removed, "Expired cache entries removed");
        }
        removed
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.stats = CacheStatistics::default();
        info!("Cache cleared");
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.lock().stats.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lowercased, trimmed, without fragment or trailing slash
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
    without_fragment.trim_end_matches('/').to_lowercase()
}

pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub fn query_hash(query: &str) -> String {
    hex::encode(Sha256::digest(normalize_query(query).as_bytes()))
}

pub fn cache_key(url: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(url).as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize_query(query).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Utc::now())))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now = *now + chrono::Duration::from_std(by).unwrap();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn source(url: &str) -> EnhancedSource {
        EnhancedSource {
            url: url.to_string(),
            title: "Title".to_string(),
            main_content: "some body text".to_string(),
            images: vec![],
            categories: vec![],
            content_quality: None,
            scraping_duration: None,
            relevance_score: Some(0.8),
            word_count: 3,
            last_updated: None,
        }
    }

    fn cache(clock: Arc<ManualClock>, max_size: usize) -> CacheManager {
        CacheManager::with_clock(
            CacheConfig {
                enabled: true,
                default_ttl: Duration::from_secs(3600),
                max_size,
            },
            clock,
        )
    }

    #[test]
    fn test_round_trip_and_normalization() {
        let cache = cache(ManualClock::new(), 10);
        cache.put(source("https://Example.com/page/"), "What is  Rust", None);

        let hit = cache.get("https://example.com/page#intro", "what is rust");
        assert_eq!(hit.map(|s| s.title), Some("Title".to_string()));
        assert!(cache.get("https://example.com/page", "something else").is_none());

        let stats = cache.statistics();
        assert_eq!((stats.hits, stats.misses, stats.total_requests), (1, 1, 2));
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let clock = ManualClock::new();
        let cache = cache(clock.clone(), 10);
        cache.put(source("https://a.com"), "q", Some(Duration::from_secs(60)));

        clock.advance(Duration::from_secs(60));
        assert!(cache.get("https://a.com", "q").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("https://a.com", "q").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.statistics().expirations, 1);
    }

    #[test]
    fn test_put_resets_ttl() {
        let clock = ManualClock::new();
        let cache = cache(clock.clone(), 10);
        cache.put(source("https://a.com"), "q", Some(Duration::from_secs(60)));
        clock.advance(Duration::from_secs(50));
        cache.put(source("https://a.com"), "q", Some(Duration::from_secs(60)));
        clock.advance(Duration::from_secs(50));

        assert!(cache.get("https://a.com", "q").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction() {
        let clock = ManualClock::new();
        let cache = cache(clock.clone(), 2);
        cache.put(source("https://a.com"), "q", None);
        clock.advance(Duration::from_secs(1));
        cache.put(source("https://b.com"), "q", None);
        clock.advance(Duration::from_secs(1));
        assert!(cache.get("https://a.com", "q").is_some());
        clock.advance(Duration::from_secs(1));
        cache.put(source("https://c.com"), "q", None);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("https://b.com", "q").is_none());
        assert!(cache.get("https://a.com", "q").is_some());
        assert_eq!(cache.statistics().evictions, 1);
    }

    #[test]
    fn test_full_cache_drops_expired_before_lru() {
        let clock = ManualClock::new();
        let cache = cache(clock.clone(), 2);
        cache.put(source("https://a.com"), "q", None);
        clock.advance(Duration::from_secs(1));
        cache.put(source("https://b.com"), "q", Some(Duration::from_secs(5)));
        clock.advance(Duration::from_secs(10));
        cache.put(source("https://c.com"), "q", None);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("https://a.com", "q").is_some());
        assert!(cache.get("https://c.com", "q").is_some());
        let stats = cache.statistics();
        assert_eq!((stats.evictions, stats.expirations), (0, 1));
    }

    #[test]
    fn test_invalidation_and_cleanup() {
        let clock = ManualClock::new();
        let cache = cache(clock.clone(), 10);
        cache.put(source("https://a.com"), "q1", None);
        cache.put(source("https://a.com/"), "q2", None);
        cache.put(source("https://b.com"), "q1", Some(Duration::from_secs(5)));

        assert_eq!(cache.invalidate_url("https://A.com"), 2);
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.cleanup_expired(), 1);
        assert!(cache.is_empty());

        let warmed = cache.warm("q3", vec![source("https://c.com"), source("https://d.com")], None);
        assert_eq!(warmed, 2);
        assert_eq!(cache.invalidate_query("Q3"), 2);

        cache.put(source("https://e.com"), "q", None);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.statistics(), CacheStatistics::default());
    }

    #[test]
    fn test_cache_key_is_stable() {
        assert_eq!(cache_key("https://a.com/", "Q  x"), cache_key("https://A.com", "q x"));
        assert_ne!(cache_key("https://a.com", "q"), cache_key("https://a.com", "r"));
        assert_eq!(cache_key("https://a.com", "q").len(), 64);
    }
}
