//! Model invocation.
//!
//! Appends the response-schema instruction to a composed prompt, sends it
//! to the provider with web search enabled and hands back the trimmed raw
//! reply. The reply is not inspected here.

use serde_json::Value as JsonValue;
use std::sync::Arc;

use factcheck_core::templates::RequestSchema;

use crate::config::RuntimeConfig;
use crate::providers::{GenerationRequest, LlmProvider, ProviderError};

/// Lead-in for the pretty-printed response schema.
pub const SCHEMA_INSTRUCTION: &str = "You MUST reply with valid JSON in exactly this format:\n";

/// Append the schema instruction to a prompt.
pub fn append_schema_instruction(prompt: &str, response_schema: &JsonValue) -> String {
    format!("{}\n\n{}{:#}", prompt, SCHEMA_INSTRUCTION, response_schema)
}

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOptions {
    pub web_search: bool,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            web_search: true,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

impl From<&RuntimeConfig> for InvokeOptions {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            web_search: config.web_search,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Sends prompts to the model named by the request schema.
#[derive(Clone)]
pub struct ModelInvoker {
    provider: Arc<dyn LlmProvider>,
    options: InvokeOptions,
}

impl ModelInvoker {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            options: InvokeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: InvokeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Build the exact text sent to the model.
    pub fn model_prompt(&self, prompt: &str, schema: &RequestSchema) -> String {
        append_schema_instruction(prompt, schema.response_schema())
    }

    /// Invoke the model and return its reply trimmed of whitespace.
    ///
    /// An empty reply is returned as-is.
    pub async fn invoke(&self, prompt: &str, schema: &RequestSchema) -> Result<String, ProviderError> {
        let request = GenerationRequest {
            model: schema.model.clone(),
            prompt: self.model_prompt(prompt, schema),
            web_search: self.options.web_search,
            temperature: self.options.temperature,
            max_output_tokens: self.options.max_output_tokens,
        };

        tracing::debug!(
            provider = self.provider.name(),
            model = %request.model,
            prompt_length = request.prompt.len(),
            web_search = request.web_search,
            "Invoking model"
        );

        let response = self.provider.generate(request).await?;
        let reply = response.text.trim().to_string();

        tracing::debug!(
            reply_length = reply.len(),
            total_tokens = response.usage.total(),
            "Model replied"
        );

        Ok(reply)
    }
}

impl std::fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("provider", &self.provider.name())
            .field("options", &self.options)
            .finish()
    }
}
