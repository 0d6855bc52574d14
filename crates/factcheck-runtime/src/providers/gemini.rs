//! Google Gemini provider.
//!
//! Calls `models/{model}:generateContent` with the Google Search tool
//! enabled so the model can ground its findings. The key travels in the
//! `x-goog-api-key` header, never in the URL, so transport errors that echo
//! the URL cannot leak it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use factcheck_core::normalize::truncate_preview;

use super::{
    secrets::{ApiCredential, CredentialSource},
    GenerationRequest, GenerationResponse, LlmProvider, ProviderError, TokenUsage,
};

/// Environment variable name for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Generative Language API root.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const CREDENTIAL_NAME: &str = "Gemini API key";
const ERROR_PREVIEW_CHARS: usize = 300;

/// Gemini provider.
///
/// The API key is held in an [`ApiCredential`] and only exposed when the
/// request header is set.
pub struct GeminiProvider {
    credential: ApiCredential,
    base_url: String,
    #[cfg(feature = "gemini")]
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    /// Create a provider from a raw key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            CREDENTIAL_NAME,
        ))
    }

    /// Use `api_key` when given, otherwise `GEMINI_API_KEY`.
    pub fn from_key_or_env(api_key: Option<String>) -> Result<Self, ProviderError> {
        ApiCredential::explicit_or_env(api_key, GEMINI_API_KEY_ENV, CREDENTIAL_NAME)
            .map(Self::with_credential)
    }

    pub fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            #[cfg(feature = "gemini")]
            client: reqwest::Client::new(),
        }
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[cfg_attr(not(feature = "gemini"), allow(dead_code))]
    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

/// `generateContent` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeminiTool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// `generateContent` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
fn build_request(request: &GenerationRequest) -> GeminiRequest {
    let generation_config = if request.temperature.is_some() || request.max_output_tokens.is_some() {
        Some(GeminiGenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        })
    } else {
        None
    };

    let tools = if request.web_search {
        vec![GeminiTool {
            google_search: GoogleSearch {},
        }]
    } else {
        Vec::new()
    };

    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart {
                text: Some(request.prompt.clone()),
            }],
        }],
        tools,
        generation_config,
    }
}

/// Join the text parts of the first candidate.
///
/// A reply without candidates yields empty text; rejecting it is left to
/// the normalizer.
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
fn into_generation_response(body: GeminiResponse, requested_model: &str) -> GenerationResponse {
    let text = body
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let usage = body.usage_metadata.unwrap_or_default();

    GenerationResponse {
        text,
        usage: TokenUsage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
        },
        model: body
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
    }
}

/// Map a non-success status and its body to a provider error.
#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
fn status_error(status: u16, retry_after: Option<Duration>, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth { status },
        429 => ProviderError::RateLimited { retry_after },
        _ => {
            let message = match serde_json::from_str::<GeminiError>(body) {
                Ok(error) => error.error.message,
                Err(_) => truncate_preview(body, ERROR_PREVIEW_CHARS),
            };
            ProviderError::Api { status, message }
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    #[cfg(feature = "gemini")]
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let body = build_request(&request);

        // Only expose the credential here, at the point of use
        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", self.credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), retry_after, &text));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let generated = into_generation_response(body, &request.model);
        tracing::debug!(
            model = %generated.model,
            prompt_tokens = generated.usage.prompt_tokens,
            completion_tokens = generated.usage.completion_tokens,
            reply_length = generated.text.len(),
            "Gemini generation finished"
        );

        Ok(generated)
    }

    #[cfg(not(feature = "gemini"))]
    async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Gemini provider requires 'gemini' feature".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
