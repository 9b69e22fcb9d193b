// Type definitions and error enums

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LLMProvider {
    OpenAI,
    OpenRouter,
    Groq,
    GLM,
}

impl LLMProvider {
    /// Base URL of the provider's OpenAI-compatible chat completions API
    pub fn base_url(&self) -> &'static str {
        match self {
            LLMProvider::OpenAI => "https://api.openai.com/v1",
            LLMProvider::OpenRouter => "https://openrouter.ai/api/v1",
            LLMProvider::Groq => "https://api.groq.com/openai/v1",
            LLMProvider::GLM => "https://api.z.ai/api/paas/v4",
        }
    }
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Groq => write!(f, "groq"),
            LLMProvider::GLM => write!(f, "glm"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "groq" => Ok(LLMProvider::Groq),
            "glm" | "glm-general" => Ok(LLMProvider::GLM),
            other => Err(LLMError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Errors returned by an LLM adapter
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("LLM request failed: {0}")]
    Network(String),

    #[error("LLM API error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

impl LLMError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LLMError::Network(_) | LLMError::InvalidResponse(_) => true,
            LLMError::Status { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            LLMError::UnsupportedProvider(_) => false,
        }
    }
}

/// Failure of a single synthesis attempt, classified for the retry layer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthesisError {
    #[error("transient synthesis failure: {0}")]
    Transient(String),

    #[error("permanent synthesis failure: {0}")]
    Permanent(String),
}

impl From<LLMError> for SynthesisError {
    fn from(err: LLMError) -> Self {
        if err.is_transient() {
            SynthesisError::Transient(err.to_string())
        } else {
            SynthesisError::Permanent(err.to_string())
        }
    }
}

/// Failure of a single page fetch. Never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("unsupported content type: {0}")]
    UnsupportedContent(String),

    #[error("no extractable content")]
    Empty,
}

/// Top-level failure of a research run. Everything else is absorbed into a
/// degraded response.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("query must not be empty")]
    InvalidQuery,

    #[error("could not find any relevant web pages for '{query}'")]
    NoSourcesFound { query: String },

    #[error("answer synthesis unavailable: {reason}")]
    SynthesisUnavailable { reason: String },
}

impl ResearchError {
    /// Stable classification code for callers
    pub fn code(&self) -> &'static str {
        match self {
            ResearchError::InvalidQuery => "invalid_query",
            ResearchError::NoSourcesFound { .. } => "no_sources_found",
            ResearchError::SynthesisUnavailable { .. } => "synthesis_unavailable",
        }
    }
}

pub type AppResult<T> = std::result::Result<T, ResearchError>;

/// Wall-clock milliseconds of a duration, saturating
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_classification() {
        assert!(LLMError::Network("reset".into()).is_transient());
        assert!(LLMError::Status { status: 502, message: "bad gateway".into() }.is_transient());
        assert!(LLMError::Status { status: 429, message: "slow down".into() }.is_transient());
        assert!(!LLMError::Status { status: 400, message: "bad request".into() }.is_transient());
        assert!(!LLMError::Status { status: 401, message: "unauthorized".into() }.is_transient());
        assert!(!LLMError::UnsupportedProvider("x".into()).is_transient());
    }

    #[test]
    fn test_synthesis_error_from_llm_error() {
        let err: SynthesisError = LLMError::Status { status: 503, message: "down".into() }.into();
        assert!(matches!(err, SynthesisError::Transient(_)));

        let err: SynthesisError = LLMError::Status { status: 404, message: "no model".into() }.into();
        assert!(matches!(err, SynthesisError::Permanent(_)));
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("OpenAI".parse::<LLMProvider>().ok(), Some(LLMProvider::OpenAI));
        assert_eq!("glm-general".parse::<LLMProvider>().ok(), Some(LLMProvider::GLM));
        assert!("anthropic".parse::<LLMProvider>().is_err());
        assert_eq!(LLMProvider::Groq.to_string(), "groq");
    }

    #[test]
    fn test_research_error_codes() {
        assert_eq!(ResearchError::InvalidQuery.code(), "invalid_query");
        assert_eq!(
            ResearchError::NoSourcesFound { query: "q".into() }.code(),
            "no_sources_found"
        );
        assert_eq!(
            ResearchError::SynthesisUnavailable { reason: "r".into() }.code(),
            "synthesis_unavailable"
        );
    }
}
