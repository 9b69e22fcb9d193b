// LLM abstraction layer

pub mod provider;
pub mod openai;

pub use provider::*;
pub use crate::types::{LLMError, LLMMessage, LLMProvider, LLMRequest, LLMResponse, TokenUsage};
