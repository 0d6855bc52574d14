//! LLM provider abstractions.
//!
//! The [`LlmProvider`] trait is the only place a network call is made.
//! [`GeminiProvider`] speaks the Google Generative Language API; tests
//! substitute their own implementations.
//!
//! ## Security
//!
//! Providers hold keys in [`ApiCredential`]; see the [`secrets`] module.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

mod gemini;
pub mod secrets;

pub use gemini::{GeminiProvider, DEFAULT_GEMINI_BASE_URL, GEMINI_API_KEY_ENV};
pub use secrets::{ApiCredential, CredentialSource};

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("Authentication failed (HTTP {status})")]
    Auth { status: u16 },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Model identifier, e.g. "gemini-2.5-flash"
    pub model: String,

    /// Complete prompt text
    pub prompt: String,

    /// Ground the generation in web search results
    pub web_search: bool,

    /// Sampling temperature; provider default when unset
    pub temperature: Option<f32>,

    /// Output cap; provider default when unset
    pub max_output_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            web_search: true,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Raw text returned by a generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    /// Generated text, untrimmed
    pub text: String,

    pub usage: TokenUsage,

    /// Model that served the call
    pub model: String,
}

/// Provider abstraction allows swapping LLM backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run a single generation.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError>;

    /// Get provider name for logs.
    fn name(&self) -> &str;
}
