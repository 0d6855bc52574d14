//! # factcheck-runtime
//!
//! Model invocation and the end-to-end fact-check call chain.
//!
//! `factcheck-core` composes prompts and validates replies without touching
//! the network. This crate adds the part that does: an [`LlmProvider`]
//! abstraction, the Gemini provider (behind the `gemini` feature) and the
//! [`FactChecker`] that ties every stage together.
//!
//! ## Example
//!
//! ```rust,ignore
//! use factcheck_runtime::{FactChecker, RuntimeConfig};
//!
//! let config = RuntimeConfig::default().with_env_overrides()?;
//! let checker = FactChecker::from_env(&config)?;
//!
//! let result = checker.check("Breaking: the moon is hollow").await?;
//! println!("{}% likely misinformation", result.misinformation_probability);
//! ```

pub mod checker;
pub mod config;
pub mod invoker;
pub mod providers;

pub use checker::{CheckError, FactChecker};
pub use config::{ConfigError, RuntimeConfig};
pub use invoker::{append_schema_instruction, InvokeOptions, ModelInvoker};
pub use providers::{
    ApiCredential, GeminiProvider, GenerationRequest, GenerationResponse, LlmProvider,
    ProviderError, TokenUsage,
};
