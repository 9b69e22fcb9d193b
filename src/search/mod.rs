//! Search Module
//!
//! The pipeline only needs raw web results for a query. [`SearchClient`] is
//! the seam; SerpAPI (Google web search) is the shipped backend.

pub mod serpapi;

pub use serpapi::SerpApiClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::SearchResult;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("SerpAPI key not configured")]
    NoApiKey,

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse search results: {0}")]
    ParseError(String),

    #[error("Search timed out")]
    Timeout,
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}
