//! End-to-end fact checking.
//!
//! A check is one stateless call chain: compose, invoke, normalize,
//! validate. The first failing stage ends the call; nothing is retried.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use factcheck_core::{
    analyze_reply, compose, AnalysisRequest, AnalysisResult, ConfigLoadError, NormalizeError,
    PromptBuildError, ReplyError, RequestError, TemplateConfig, ValidationError,
};

use crate::config::RuntimeConfig;
use crate::invoker::{InvokeOptions, ModelInvoker};
use crate::providers::{GeminiProvider, LlmProvider, ProviderError};

/// Any failure of a fact check.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Failed to load templates: {0}")]
    Config(#[from] ConfigLoadError),

    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),

    #[error(transparent)]
    PromptBuild(#[from] PromptBuildError),

    #[error("Model provider is not usable: {0}")]
    Provider(#[source] ProviderError),

    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[from] ProviderError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("Model response failed validation: {0}")]
    Validation(#[from] ValidationError),
}

impl From<ReplyError> for CheckError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::Normalize(e) => CheckError::Normalize(e),
            ReplyError::Validation(e) => CheckError::Validation(e),
        }
    }
}

impl CheckError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            CheckError::Config(_) | CheckError::Provider(_) => "config",
            CheckError::Request(_) => "request",
            CheckError::PromptBuild(_) => "prompt",
            CheckError::ModelInvocation(_) => "model",
            CheckError::Normalize(_) => "normalize",
            CheckError::Validation(_) => "validate",
        }
    }
}

/// Runs fact checks against one template set and one provider.
///
/// Read-only after construction; share it behind an `Arc` for concurrent
/// checks.
#[derive(Debug, Clone)]
pub struct FactChecker {
    templates: Arc<TemplateConfig>,
    invoker: ModelInvoker,
}

impl FactChecker {
    pub fn new(templates: Arc<TemplateConfig>, provider: Arc<dyn LlmProvider>) -> Self {
        let invoker = ModelInvoker::new(provider);

        tracing::info!(
            model = templates.model(),
            provider = invoker.provider_name(),
            "Fact checker initialized"
        );

        Self { templates, invoker }
    }

    pub fn with_options(mut self, options: InvokeOptions) -> Self {
        self.invoker = self.invoker.with_options(options);
        self
    }

    /// Build a Gemini-backed checker, reading the key from `GEMINI_API_KEY`.
    pub fn from_env(config: &RuntimeConfig) -> Result<Self, CheckError> {
        Self::from_config(config, None)
    }

    /// Build a Gemini-backed checker.
    ///
    /// `api_key` takes precedence over `GEMINI_API_KEY`; with neither set
    /// construction fails.
    pub fn from_config(config: &RuntimeConfig, api_key: Option<String>) -> Result<Self, CheckError> {
        let templates = config.load_templates()?;
        let provider = GeminiProvider::from_key_or_env(api_key)
            .map_err(CheckError::Provider)?
            .with_base_url(&config.base_url);

        Ok(Self::new(Arc::new(templates), Arc::new(provider))
            .with_options(InvokeOptions::from(config)))
    }

    pub fn templates(&self) -> &TemplateConfig {
        &self.templates
    }

    /// The exact text the model would receive for `post_content`.
    pub fn model_prompt(&self, post_content: &str) -> Result<String, CheckError> {
        let prompt = compose(&self.templates, post_content)?;
        Ok(self
            .invoker
            .model_prompt(&prompt, &self.templates.request_schema))
    }

    /// Check a validated request.
    pub async fn check_request(&self, request: &AnalysisRequest) -> Result<AnalysisResult, CheckError> {
        request.validate()?;
        self.check(&request.post_content).await
    }

    /// Check a post.
    ///
    /// Content is not validated here; empty text is composed and sent as-is.
    pub async fn check(&self, post_content: &str) -> Result<AnalysisResult, CheckError> {
        let start = Instant::now();

        let prompt = compose(&self.templates, post_content)?;

        let reply = match self.invoker.invoke(&prompt, &self.templates.request_schema).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Model invocation failed"
                );
                return Err(e.into());
            }
        };

        let result = analyze_reply(&reply).map_err(|e| {
            let err = CheckError::from(e);
            tracing::warn!(
                stage = err.stage(),
                error = %err,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Model reply rejected"
            );
            err
        })?;

        tracing::info!(
            probability = result.misinformation_probability,
            red_flags = result.red_flags.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fact check complete"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{GenerationRequest, GenerationResponse, TokenUsage};
    use async_trait::async_trait;
    use factcheck_core::Severity;
    use serde_json::json;

    const HOLLOW_MOON_REPLY: &str = r#"```json
{
  "misinformation_probability": 85,
  "red_flags": [
    {"category": "Content", "indicator": "Extraordinary claim", "severity": "high", "details": "No credible source"}
  ],
  "analysis": "The post asserts a claim that contradicts decades of lunar research.",
  "evidence_sources": [{"source": "NASA", "finding": "Seismic data shows a dense lunar core"}]
}
```"#;

    enum Behavior {
        Reply(&'static str),
        Fail,
    }

    struct MockProvider {
        behavior: Behavior,
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
            match self.behavior {
                Behavior::Reply(text) => Ok(GenerationResponse {
                    text: text.to_string(),
                    usage: TokenUsage::default(),
                    model: request.model,
                }),
                Behavior::Fail => Err(ProviderError::Api {
                    status: 503,
                    message: "model overloaded".to_string(),
                }),
            }
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn checker(behavior: Behavior) -> FactChecker {
        FactChecker::new(
            Arc::new(TemplateConfig::builtin().unwrap()),
            Arc::new(MockProvider { behavior }),
        )
    }

    #[tokio::test]
    async fn test_hollow_moon_end_to_end() {
        let checker = checker(Behavior::Reply(HOLLOW_MOON_REPLY));
        let result = checker
            .check("Breaking: scientists confirm the moon is hollow")
            .await
            .unwrap();

        assert_eq!(result.misinformation_probability, 85);
        assert_eq!(result.red_flags.len(), 1);
        assert_eq!(result.red_flags[0].severity, Severity::High);
        assert_eq!(
            result.evidence_sources,
            vec!["[NASA] - Seismic data shows a dense lunar core".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_content_reaches_model() {
        let checker = checker(Behavior::Fail);
        let err = checker.check("").await.unwrap_err();

        assert!(matches!(err, CheckError::ModelInvocation(ProviderError::Api { status: 503, .. })));
        assert_eq!(err.stage(), "model");
    }

    #[tokio::test]
    async fn test_check_request_rejects_empty_content() {
        let checker = checker(Behavior::Reply(HOLLOW_MOON_REPLY));
        let request = AnalysisRequest::from_json(r#"{"post_content": ""}"#).unwrap();

        let err = checker.check_request(&request).await.unwrap_err();
        assert!(matches!(err, CheckError::Request(RequestError::EmptyContent)));
    }

    #[tokio::test]
    async fn test_reply_failures_map_to_stages() {
        let err = checker(Behavior::Reply("")).check("post").await.unwrap_err();
        assert!(matches!(err, CheckError::Normalize(NormalizeError::Empty)));
        assert_eq!(err.stage(), "normalize");

        let err = checker(Behavior::Reply("No JSON here.")).check("post").await.unwrap_err();
        assert!(matches!(err, CheckError::Normalize(NormalizeError::Malformed { .. })));

        let err = checker(Behavior::Reply(
            r#"{"misinformation_probability": 101, "red_flags": [], "analysis": "", "evidence_sources": []}"#,
        ))
        .check("post")
        .await
        .unwrap_err();
        assert_eq!(err.stage(), "validate");
    }

    #[tokio::test]
    async fn test_prompt_errors_stop_before_model() {
        let templates = TemplateConfig::from_values(
            json!({}),
            json!({ "user_prompt_template": "no placeholder" }),
            json!({ "model": "m", "config": { "response_schema": {} } }),
        )
        .unwrap();
        let checker = FactChecker::new(Arc::new(templates), Arc::new(MockProvider { behavior: Behavior::Fail }));

        let err = checker.check("post").await.unwrap_err();
        assert!(matches!(err, CheckError::PromptBuild(PromptBuildError::PlaceholderCount { found: 0 })));
        assert_eq!(err.stage(), "prompt");
    }

    #[tokio::test]
    async fn test_concurrent_checks_are_independent() {
        let checker = Arc::new(checker(Behavior::Reply(HOLLOW_MOON_REPLY)));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let checker = Arc::clone(&checker);
                tokio::spawn(async move { checker.check(&format!("post {}", i)).await })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.misinformation_probability, 85);
        }
    }

    #[test]
    fn test_model_prompt_includes_schema_instruction() {
        let checker = checker(Behavior::Fail);
        let prompt = checker.model_prompt("The earth is flat").unwrap();
        assert!(prompt.contains("The earth is flat"));
        assert!(prompt.contains(crate::invoker::SCHEMA_INSTRUCTION));
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        std::env::remove_var(crate::providers::GEMINI_API_KEY_ENV);
        let err = FactChecker::from_env(&RuntimeConfig::default()).unwrap_err();
        assert!(matches!(err, CheckError::Provider(ProviderError::NotConfigured(_))));
        assert_eq!(err.stage(), "config");

        let checker = FactChecker::from_config(&RuntimeConfig::default(), Some("explicit".to_string()));
        assert!(checker.is_ok());
    }

    #[test]
    fn test_error_messages() {
        let err = CheckError::from(PromptBuildError::PlaceholderCount { found: 2 });
        assert!(err.to_string().starts_with("Failed to build prompt: "));

        let err = CheckError::from(ProviderError::Auth { status: 401 });
        assert_eq!(err.to_string(), "Model invocation failed: Authentication failed (HTTP 401)");
    }
}
