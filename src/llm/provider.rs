use async_trait::async_trait;
use crate::types::{LLMError, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> Result<LLMResponse, LLMError>;
}

/// Provider selection for [`LLM`]
pub struct LLMProviderConfig {
    pub provider: LLMProvider,
    pub api_key: String,
    /// Overrides the provider's default endpoint
    pub base_url: Option<String>,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider: LLMProvider,
}

impl LLM {
    pub fn new(config: LLMProviderConfig) -> Self {
        let base_url = config
            .base_url
            .unwrap_or_else(|| config.provider.base_url().to_string());
        let adapter: Box<dyn LLMAdapter> = Box::new(crate::llm::openai::OpenAICompatibleAdapter::new(
            &config.api_key,
            &base_url,
        ));

        Self {
            adapter,
            provider: config.provider,
        }
    }

    pub fn with_adapter(provider: LLMProvider, adapter: Box<dyn LLMAdapter>) -> Self {
        Self { adapter, provider }
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> Result<LLMResponse, LLMError> {
        self.adapter.create_chat_completion(request).await
    }
}
