//! Runtime configuration.
//!
//! Read from a JSON or YAML file (or defaulted), then overridden from the
//! environment. The API key is not part of this structure; it is only read
//! into an [`ApiCredential`](crate::providers::ApiCredential).

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use factcheck_core::{ConfigLoadError, TemplateConfig};

use crate::providers::DEFAULT_GEMINI_BASE_URL;

/// Overrides `templates_dir`.
pub const TEMPLATES_DIR_ENV: &str = "FACTCHECK_TEMPLATES_DIR";

/// Overrides `base_url`.
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";

/// Errors from runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Runtime settings for the checker and its provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory holding the template documents; built-ins when unset
    pub templates_dir: Option<PathBuf>,

    /// Generative Language API root
    pub base_url: String,

    pub temperature: Option<f32>,

    pub max_output_tokens: Option<u32>,

    /// Ground generations in web search
    pub web_search: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            templates_dir: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: None,
            max_output_tokens: None,
            web_search: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `.yaml`/`.yml` are parsed as YAML, anything else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Apply `FACTCHECK_TEMPLATES_DIR` and `GEMINI_BASE_URL`.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = lookup(TEMPLATES_DIR_ENV).filter(|v| !v.is_empty()) {
            self.templates_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "base_url must start with http:// or https://".to_string(),
            ));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::Invalid(format!(
                    "temperature must be within [0.0, 2.0], got {}",
                    t
                )));
            }
        }
        if self.max_output_tokens == Some(0) {
            return Err(ConfigError::Invalid(
                "max_output_tokens must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load the template documents this configuration points at.
    pub fn load_templates(&self) -> Result<TemplateConfig, ConfigLoadError> {
        match &self.templates_dir {
            Some(dir) => TemplateConfig::load(dir),
            None => TemplateConfig::builtin(),
        }
    }
}
