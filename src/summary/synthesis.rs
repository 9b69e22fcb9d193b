//! Synthesis Service
//!
//! Turns accepted sources plus a [`SummaryConfig`] into a prose answer. The
//! shipped implementation prompts an OpenAI-compatible chat model.

use async_trait::async_trait;
use tracing::info;

use crate::config::LLMConfig;
use crate::llm::provider::{LLMProviderConfig, LLM};
use crate::models::{DetailLevel, EnhancedSource, SummaryConfig};
use crate::types::{LLMMessage, LLMRequest, SynthesisError};

/// Sources beyond this are left out of the prompt
const MAX_PROMPT_SOURCES: usize = 10;
/// Characters of each source shown to the model
const PREVIEW_CHARS: usize = 300;

const SYSTEM_PROMPT: &str = "You are a careful research assistant. Answer only from the sources \
provided, cite them by number like [1], and say so when the sources do not cover part of the question.";

#[async_trait]
pub trait SynthesisService: Send + Sync {
    async fn synthesize(
        &self,
        query: &str,
        sources: &[EnhancedSource],
        config: &SummaryConfig,
    ) -> Result<String, SynthesisError>;
}

pub struct LlmSynthesisService {
    llm: LLM,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmSynthesisService {
    pub fn new(llm: LLM, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tokens: 1500,
            temperature: 0.3,
        }
    }

    /// `None` when no API key is configured
    pub fn from_config(config: &LLMConfig) -> Option<Self> {
        let api_key = config.active_api_key()?;
        let llm = LLM::new(LLMProviderConfig {
            provider: config.provider,
            api_key: api_key.to_string(),
            base_url: config.base_url.clone(),
        });

        Some(Self {
            llm,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl SynthesisService for LlmSynthesisService {
    async fn synthesize(
        &self,
        query: &str,
        sources: &[EnhancedSource],
        config: &SummaryConfig,
    ) -> Result<String, SynthesisError> {
        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![
                LLMMessage::system(SYSTEM_PROMPT),
                LLMMessage::user(build_prompt(query, sources, config)),
            ],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        let response = self.llm.create_chat_completion(&request).await?;
        info!(
            provider = %self.llm.provider(),
            tokens = response.usage.total_tokens,
            "Synthesis completed"
        );
        Ok(response.content.trim().to_string())
    }
}

/// Character-safe prefix of `text`
fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}

pub fn build_prompt(query: &str, sources: &[EnhancedSource], config: &SummaryConfig) -> String {
    let detail = match config.detail_level {
        DetailLevel::Concise => "Be concise and direct. Lead with the answer.",
        DetailLevel::Balanced => "Give a balanced explanation with the key supporting points.",
        DetailLevel::Comprehensive => {
            "Be comprehensive. Cover every major aspect and contrast the sources where they differ."
        }
    };

    let mut prompt = format!(
        "QUESTION: {query}\n\nWrite an answer of roughly {} words. {detail}\n",
        config.target_length
    );

    if !config.focus_areas.is_empty() {
        prompt.push_str(&format!("Focus on: {}.\n", config.focus_areas.join(", ")));
    }
    if config.include_examples {
        prompt.push_str("Include concrete examples from the sources.\n");
    }

    prompt.push_str("\nSOURCES:\n");
    for (i, source) in sources.iter().take(MAX_PROMPT_SOURCES).enumerate() {
        prompt.push_str(&format!(
            "[{}] {} ({})\n{}\n\n",
            i + 1,
            source.title,
            source.url,
            preview(&source.main_content, PREVIEW_CHARS)
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::LLMAdapter;
    use crate::models::PageContent;
    use crate::types::{LLMError, LLMProvider, LLMResponse};
    use std::sync::{Arc, Mutex};

    struct RecordingAdapter {
        prompts: Arc<Mutex<Vec<String>>>,
        result: fn() -> Result<LLMResponse, LLMError>,
    }

    #[async_trait]
    impl LLMAdapter for RecordingAdapter {
        async fn create_chat_completion(&self, request: &LLMRequest) -> Result<LLMResponse, LLMError> {
            let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);
            (self.result)()
        }
    }

    fn source(n: usize, content: &str) -> EnhancedSource {
        EnhancedSource::from_page(
            format!("https://example.com/{n}"),
            PageContent {
                title: format!("Source {n}"),
                main_content: content.to_string(),
                ..Default::default()
            },
            Default::default(),
            std::time::Duration::from_millis(10),
        )
    }

    fn config() -> SummaryConfig {
        SummaryConfig {
            target_length: 450,
            detail_level: DetailLevel::Comprehensive,
            focus_areas: vec!["pricing".to_string(), "storage".to_string()],
            include_examples: true,
        }
    }

    #[test]
    fn test_build_prompt_limits_sources_and_previews() {
        let long = "word ".repeat(200);
        let sources: Vec<_> = (0..12).map(|n| source(n, &long)).collect();
        let prompt = build_prompt("compare cloud pricing", &sources, &config());

        assert!(prompt.contains("roughly 450 words"));
        assert!(prompt.contains("Focus on: pricing, storage."));
        assert!(prompt.contains("Include concrete examples"));
        assert!(prompt.contains("[10] Source 9"));
        assert!(!prompt.contains("[11]"));
        assert!(prompt.contains("..."));
    }

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(preview("héllo wörld", 4), "héll...");
        assert_eq!(preview("short", 10), "short");
    }

    #[tokio::test]
    async fn test_synthesize_maps_llm_errors() {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let ok = LlmSynthesisService::new(
            LLM::with_adapter(
                LLMProvider::OpenAI,
                Box::new(RecordingAdapter {
                    prompts: Arc::clone(&prompts),
                    result: || {
                        Ok(LLMResponse {
                            content: "  An answer [1].  ".to_string(),
                            finish_reason: "stop".to_string(),
                            usage: Default::default(),
                        })
                    },
                }),
            ),
            "test-model",
        );
        let answer = ok.synthesize("q", &[source(1, "content")], &config()).await.unwrap();
        assert_eq!(answer, "An answer [1].");
        assert_eq!(prompts.lock().unwrap().len(), 1);

        let throttled = LlmSynthesisService::new(
            LLM::with_adapter(
                LLMProvider::Groq,
                Box::new(RecordingAdapter {
                    prompts: Arc::clone(&prompts),
                    result: || {
                        Err(LLMError::Status {
                            status: 429,
                            message: "slow down".to_string(),
                        })
                    },
                }),
            ),
            "test-model",
        );
        let err = throttled.synthesize("q", &[], &config()).await.unwrap_err();
        assert!(matches!(err, SynthesisError::Transient(_)));
    }

    #[test]
    fn test_from_config_requires_key() {
        assert!(LlmSynthesisService::from_config(&LLMConfig::default()).is_none());

        let config = LLMConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        };
        assert!(LlmSynthesisService::from_config(&config).is_some());
    }
}
