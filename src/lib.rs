// websift - query-driven web research: search, rank, scrape, summarize

pub mod config;
pub mod models;
pub mod types;
pub mod analysis;
pub mod ranking;
pub mod scraping;   // Concurrent page fetching with early termination
pub mod quality;
pub mod cache;
pub mod search;     // Search APIs (SerpAPI for Google web search)
pub mod llm;
pub mod summary;
pub mod pipeline;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use pipeline::ResearchPipeline;
pub use models::{ResearchResponse, SynthesisMode};
// Note: import error types from the types module directly
// e.g., use websift::types::{ResearchError, AppResult};
