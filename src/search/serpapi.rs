//! SerpAPI Client
//!
//! Google web search via SerpAPI. Organic results are mapped to
//! [`SearchResult`]s. SerpAPI reports dates either as an absolute date
//! ("Mar 3, 2024") or relative to now ("3 days ago"); both are converted to
//! UTC timestamps, and anything else is left undated.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serpapi_search_rust::serp_api_search::SerpApiSearch;
use std::collections::HashMap;
use tracing::{debug, info};

use super::{SearchClient, SearchError};
use crate::models::SearchResult;

/// SerpAPI client for general web search
pub struct SerpApiClient {
    api_key: String,
    max_results: usize,
    language: String,
    country: String,
}

impl SerpApiClient {
    /// Create a new SerpAPI client
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            max_results: 20,
            language: "en".to_string(),
            country: "us".to_string(),
        }
    }

    /// Configure client from config
    pub fn from_config(config: &crate::config::SearchConfig) -> Result<Self, SearchError> {
        if config.serpapi_key.trim().is_empty() {
            return Err(SearchError::NoApiKey);
        }
        Ok(Self::new(config.serpapi_key.clone())
            .with_max_results(config.max_results)
            .with_locale(&config.language, &config.country))
    }

    /// Set maximum results per search
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Set the interface language and country of results
    pub fn with_locale(mut self, language: &str, country: &str) -> Self {
        self.language = language.to_string();
        self.country = country.to_string();
        self
    }
}

#[async_trait]
impl SearchClient for SerpApiClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        info!(query = %query, "Searching Google via SerpAPI");

        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("hl".to_string(), self.language.clone());
        params.insert("gl".to_string(), self.country.clone());
        params.insert("num".to_string(), self.max_results.to_string());

        let search = SerpApiSearch::google(params, self.api_key.clone());
        let response = search
            .json()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        debug!("Raw search response received");

        let results = parse_organic_results(&response, self.max_results, Utc::now())?;
        info!(count = results.len(), "Web search completed");
        Ok(results)
    }
}

/// Map the `organic_results` array of a SerpAPI response
pub fn parse_organic_results(
    response: &serde_json::Value,
    max_results: usize,
    now: DateTime<Utc>,
) -> Result<Vec<SearchResult>, SearchError> {
    if let Some(error) = response.get("error").and_then(|v| v.as_str()) {
        return Err(SearchError::RequestFailed(error.to_string()));
    }

    let Some(organic) = response.get("organic_results") else {
        return Ok(Vec::new());
    };
    let results_array = organic
        .as_array()
        .ok_or_else(|| SearchError::ParseError("Expected array of results".to_string()))?;

    let results = results_array
        .iter()
        .filter_map(|result| {
            let url = result.get("link").and_then(|v| v.as_str())?.to_string();
            let title = result
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Untitled")
                .to_string();
            let snippet = result
                .get("snippet")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let published_date = result
                .get("date")
                .and_then(|v| v.as_str())
                .and_then(|raw| parse_serp_date(raw, now));

            Some(SearchResult {
                url,
                title,
                snippet,
                published_date,
            })
        })
        .take(max_results)
        .collect();

    Ok(results)
}

/// Parse "Mar 3, 2024", "2024-03-03" or "3 days ago"
pub fn parse_serp_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    for format in ["%b %d, %Y", "%B %d, %Y", "%Y-%m-%d", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    let mut parts = raw.split_whitespace();
    let amount: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?.trim_end_matches('s');
    if parts.next() != Some("ago") {
        return None;
    }
    let delta = match unit {
        "minute" | "min" => Duration::minutes(amount),
        "hour" => Duration::hours(amount),
        "day" => Duration::days(amount),
        "week" => Duration::weeks(amount),
        "month" => Duration::days(30 * amount),
        "year" => Duration::days(365 * amount),
        _ => return None,
    };
    now.checked_sub_signed(delta)
}
