// HTTP page fetcher: reqwest for transport, scraper for main-content extraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::PageFetcher;
use crate::models::{PageContent, PageImage};
use crate::types::FetchError;

/// Containers tried in order for the main article body
const CONTENT_SELECTORS: &[&str] = &[
    "article", "main", "[role=main]", ".post-content", ".entry-content", ".article-content",
    "#content", ".content",
];

const BLOCK_SELECTOR: &str = "h1, h2, h3, h4, p, li, blockquote, pre";
const MIN_BLOCK_CHARS: usize = 20;
const MAX_IMAGES: usize = 10;

const DATE_META: &[&str] = &[
    "meta[property='article:modified_time']",
    "meta[property='og:updated_time']",
    "meta[property='article:published_time']",
    "meta[name='date']",
];

pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Fetch through a preconfigured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<PageContent, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            let lower = content_type.to_lowercase();
            if !lower.contains("html") && !lower.starts_with("text/") {
                return Err(FetchError::UnsupportedContent(content_type.to_string()));
            }
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let page = extract_page(&html, &final_url);
        if page.main_content.trim().is_empty() {
            return Err(FetchError::Empty);
        }
        debug!(url = %url, words = page.main_content.split_whitespace().count(), "Page extracted");
        Ok(page)
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .find_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extract title, main text, images, categories and update time from HTML
pub fn extract_page(html: &str, base: &Url) -> PageContent {
    let document = Html::parse_document(html);

    let title = meta_content(&document, "meta[property='og:title']")
        .or_else(|| {
            let sel = selector("title")?;
            document.select(&sel).next().map(element_text).filter(|t| !t.is_empty())
        })
        .or_else(|| {
            let sel = selector("h1")?;
            document.select(&sel).next().map(element_text)
        })
        .unwrap_or_default();

    let container = CONTENT_SELECTORS
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| document.select(&sel).max_by_key(|el| element_text(*el).len()))
        .or_else(|| selector("body").and_then(|sel| document.select(&sel).next()));

    let mut main_content = String::new();
    let mut images = Vec::new();

    if let Some(root) = container {
        if let Some(blocks) = selector(BLOCK_SELECTOR) {
            let paragraphs: Vec<String> = root
                .select(&blocks)
                // nested blocks (li > p) would repeat text
                .filter(|el| {
                    !el.ancestors()
                        .filter_map(ElementRef::wrap)
                        .take_while(|a| a.id() != root.id())
                        .any(|a| matches!(a.value().name(), "p" | "li" | "blockquote"))
                })
                .map(element_text)
                .filter(|t| t.chars().count() >= MIN_BLOCK_CHARS)
                .collect();
            main_content = paragraphs.join("\n\n");
        }
        if main_content.is_empty() {
            main_content = element_text(root);
        }

        if let Some(img) = selector("img[src]") {
            images = root
                .select(&img)
                .filter_map(|el| {
                    let src = el.value().attr("src")?;
                    if src.starts_with("data:") {
                        return None;
                    }
                    let resolved = base.join(src).ok()?;
                    Some(PageImage {
                        src: resolved.to_string(),
                        alt: el.value().attr("alt").unwrap_or_default().trim().to_string(),
                    })
                })
                .take(MAX_IMAGES)
                .collect();
        }
    }

    PageContent {
        title,
        main_content,
        images,
        categories: extract_categories(&document),
        last_updated: extract_date(&document),
    }
}

fn extract_categories(document: &Html) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    let mut push = |value: &str| {
        let value = value.trim();
        if !value.is_empty() && !categories.iter().any(|c| c.eq_ignore_ascii_case(value)) {
            categories.push(value.to_string());
        }
    };

    if let Some(keywords) = meta_content(document, "meta[name='keywords']") {
        keywords.split(',').for_each(&mut push);
    }
    for css in ["meta[property='article:tag']", "meta[property='article:section']"] {
        if let Some(sel) = selector(css) {
            document
                .select(&sel)
                .filter_map(|el| el.value().attr("content"))
                .for_each(&mut push);
        }
    }
    if let Some(sel) = selector("a[rel~='tag']") {
        for el in document.select(&sel) {
            push(&element_text(el));
        }
    }
    categories
}

fn extract_date(document: &Html) -> Option<DateTime<Utc>> {
    DATE_META
        .iter()
        .filter_map(|css| meta_content(document, css))
        .chain(
            selector("time[datetime]")
                .into_iter()
                .flat_map(|sel| {
                    document
                        .select(&sel)
                        .filter_map(|el| el.value().attr("datetime").map(str::to_string))
                        .collect::<Vec<_>>()
                }),
        )
        .find_map(|raw| parse_date(&raw))
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(raw.trim().get(..10)?, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
