use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use websift::{
    config::Config,
    models::ResearchResponse,
    scraping::HttpPageFetcher,
    search::SerpApiClient,
    summary::{LlmSynthesisService, SynthesisService},
    utils::init_tracing,
    ResearchPipeline,
};

#[derive(Parser, Debug)]
#[command(
    name = "websift",
    version,
    about = "Answer a question from the live web: search, rank, scrape and summarize"
)]
struct Cli {
    /// The question to research
    #[arg(required = true)]
    query: Vec<String>,

    /// Print the full response as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Maximum pages fetched at once
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Per-page fetch timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Disable the in-memory content cache
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Stop after accepting this many sources
    #[arg(long)]
    max_sources: Option<usize>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(n) = self.max_concurrent {
            config.scraper.max_concurrent = n.max(1);
        }
        if let Some(secs) = self.timeout_secs {
            config.scraper.timeout_per_source = Duration::from_secs(secs.max(1));
        }
        if let Some(n) = self.max_sources {
            config.stopping.max_sources = n.max(1);
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    cli.apply(&mut config);

    // Initialize tracing
    let _log_guard = init_tracing(&config.logging);
    info!(
        max_concurrent = config.scraper.max_concurrent,
        cache = config.cache.enabled,
        provider = %config.llm.provider,
        "Configuration loaded"
    );

    // Build collaborators
    let search = SerpApiClient::from_config(&config.search).context("SerpAPI is required (set SERPAPI_KEY)")?;
    let fetcher = HttpPageFetcher::new(&config.scraper.user_agent).context("Failed to build HTTP client")?;
    let synthesis = LlmSynthesisService::from_config(&config.llm).map(|s| Arc::new(s) as Arc<dyn SynthesisService>);
    if synthesis.is_none() {
        warn!("No synthesis API key configured, answers will be extractive");
    }

    let pipeline = ResearchPipeline::from_config(&config, Arc::new(search), Arc::new(fetcher), synthesis);

    let query = cli.query.join(" ");
    let response = match pipeline.research(&query).await {
        Ok(response) => response,
        Err(e) => {
            error!(code = e.code(), error = %e, "Research failed");
            return Err(anyhow::anyhow!("{} ({})", e, e.code()));
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_text(&response);
    }

    Ok(())
}

fn print_text(response: &ResearchResponse) {
    println!("{}\n", response.answer);

    if !response.sources_used.is_empty() {
        println!("Sources:");
        for (i, url) in response.sources_used.iter().enumerate() {
            println!("  [{}] {}", i + 1, url);
        }
        println!();
    }

    let m = &response.metrics;
    println!(
        "mode: {:?} | sources: {} accepted / {} attempted / {} found | cache hits: {} | {} ms",
        response.synthesis_mode, m.sources_accepted, m.sources_attempted, m.sources_found, m.cache_hits, m.total_ms
    );
}
