// Core data model shared by every pipeline stage

use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryComplexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryIntent {
    Factual,
    Research,
    Comparison,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Technology,
    Health,
    Science,
    Business,
    Education,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Technology => "technology",
            Domain::Health => "health",
            Domain::Science => "science",
            Domain::Business => "business",
            Domain::Education => "education",
        }
    }
}

/// Target summary size bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryLength {
    Short,
    Medium,
    Long,
}

impl SummaryLength {
    /// Inclusive word range of the bucket
    pub fn word_range(&self) -> (usize, usize) {
        match self {
            SummaryLength::Short => (100, 200),
            SummaryLength::Medium => (300, 600),
            SummaryLength::Long => (400, 800),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetailLevel {
    Concise,
    Balanced,
    Comprehensive,
}

/// Classification of a query. Produced once and never mutated.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueryAnalysis {
    pub complexity: QueryComplexity,
    pub domain: Option<Domain>,
    pub intent: QueryIntent,
    pub expected_length: SummaryLength,
    /// 0.0 means timeless, 1.0 means only fresh material is useful
    pub recency_importance: f64,
    /// Normalized query terms without stop-words, in first-occurrence order
    pub keywords: Vec<String>,
}

/// A raw result returned by the search client
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub published_date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SourceScore {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub relevance_score: f64,
    pub authority_score: f64,
    pub freshness_score: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PageImage {
    pub src: String,
    pub alt: String,
}

/// Content extracted from one fetched page
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PageContent {
    pub title: String,
    pub main_content: String,
    pub images: Vec<PageImage>,
    pub categories: Vec<String>,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

/// Outcome of one fetch attempt.
///
/// `success` is true exactly when `content` is present, and false exactly when
/// `error` is present. Build values through [`ScrapingResult::succeeded`] and
/// [`ScrapingResult::failed`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScrapingResult {
    pub url: String,
    pub success: bool,
    pub content: Option<PageContent>,
    pub error: Option<String>,
    pub duration: Duration,
    pub from_cache: bool,
}

impl ScrapingResult {
    pub fn succeeded(url: impl Into<String>, content: PageContent, duration: Duration) -> Self {
        Self {
            url: url.into(),
            success: true,
            content: Some(content),
            error: None,
            duration,
            from_cache: false,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            url: url.into(),
            success: false,
            content: None,
            error: Some(error.into()),
            duration,
            from_cache: false,
        }
    }

    pub fn cached(url: impl Into<String>, content: PageContent) -> Self {
        Self {
            from_cache: true,
            ..Self::succeeded(url, content, Duration::ZERO)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ContentQuality {
    pub relevance_score: f64,
    /// Word count of the main content
    pub content_length: usize,
    pub information_density: f64,
    pub duplicate_content: bool,
    pub quality_indicators: BTreeMap<String, f64>,
}

/// An accepted, quality-scored source
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnhancedSource {
    pub url: String,
    pub title: String,
    pub main_content: String,
    pub images: Vec<PageImage>,
    pub categories: Vec<String>,
    pub content_quality: Option<ContentQuality>,
    pub scraping_duration: Option<Duration>,
    pub relevance_score: Option<f64>,
    pub word_count: usize,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl EnhancedSource {
    pub fn from_page(
        url: impl Into<String>,
        page: PageContent,
        quality: ContentQuality,
        duration: Duration,
    ) -> Self {
        let word_count = page.main_content.split_whitespace().count();
        let relevance = quality.relevance_score;
        Self {
            url: url.into(),
            title: page.title,
            main_content: page.main_content,
            images: page.images,
            categories: page.categories,
            content_quality: Some(quality),
            scraping_duration: Some(duration),
            relevance_score: Some(relevance),
            word_count,
            last_updated: page.last_updated,
        }
    }

    /// Rebuild the fetcher-level view, used when a cached entry is reassessed
    pub fn to_page(&self) -> PageContent {
        PageContent {
            title: self.title.clone(),
            main_content: self.main_content.clone(),
            images: self.images.clone(),
            categories: self.categories.clone(),
            last_updated: self.last_updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CachedContent {
    pub url: String,
    pub content: EnhancedSource,
    pub cached_at: chrono::DateTime<chrono::Utc>,
    pub query_hash: String,
    pub expiry_time: chrono::DateTime<chrono::Utc>,
    pub access_count: u64,
    pub last_accessed: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SummaryConfig {
    pub target_length: usize,
    pub detail_level: DetailLevel,
    pub focus_areas: Vec<String>,
    pub include_examples: bool,
}

/// How the final answer text was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
    Synthesized,
    ExtractiveFallback,
    /// No page could be fetched; built from search snippets only
    Degraded,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResearchMetrics {
    pub search_ms: u64,
    pub scrape_ms: u64,
    pub synthesis_ms: u64,
    pub total_ms: u64,
    pub sources_found: usize,
    pub sources_ranked: usize,
    pub sources_attempted: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub sources_accepted: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub stopped_early: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResearchResponse {
    pub query_id: uuid::Uuid,
    pub query: String,
    pub answer: String,
    pub sources_used: Vec<String>,
    pub synthesis_mode: SynthesisMode,
    pub analysis: QueryAnalysis,
    pub summary_config: SummaryConfig,
    pub metrics: ResearchMetrics,
}
