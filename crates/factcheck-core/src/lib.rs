//! # factcheck-core
//!
//! Deterministic half of the misinformation fact-check pipeline.
//!
//! This crate turns a post into a prompt and turns a model reply back into
//! a validated result:
//! - Template documents are loaded and schema-checked ([`templates`])
//! - The prompt is composed from them ([`prompt`])
//! - The raw reply is unwrapped and reconciled ([`normalize`])
//! - The candidate is strictly validated ([`validate`])
//!
//! ## Key Guarantees
//!
//! 1. **No network**: model invocation lives in `factcheck-runtime`
//! 2. **Opaque content**: post text is inserted once and never interpreted
//! 3. **Total validation**: a result is returned whole or not at all
//!
//! ## Example
//!
//! ```rust,ignore
//! use factcheck_core::{analyze_reply, compose, TemplateConfig};
//!
//! let config = TemplateConfig::builtin()?;
//! let prompt = compose(&config, "Breaking: the moon is hollow")?;
//! // ... send `prompt` to a model ...
//! let result = analyze_reply(&reply)?;
//! println!("{}%", result.misinformation_probability);
//! ```

pub mod normalize;
pub mod prompt;
pub mod templates;
pub mod types;
pub mod validate;

// Re-export main types at crate root
pub use normalize::{normalize, Candidate, EvidenceEntry, NormalizeError};
pub use prompt::{compose, PromptBuildError, CONTENT_PLACEHOLDER};
pub use templates::{ConfigLoadError, DocumentKind, TemplateConfig, TemplatePaths};
pub use types::{AnalysisRequest, AnalysisResult, RedFlag, RequestError, Severity};
pub use validate::{validate, ValidationError};

use thiserror::Error;

/// Errors from turning a raw reply into a result.
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Normalize and validate a raw model reply.
pub fn analyze_reply(raw_reply: &str) -> Result<AnalysisResult, ReplyError> {
    let candidate = normalize(raw_reply)?;
    let result = validate(candidate)?;

    tracing::debug!(
        probability = result.misinformation_probability,
        red_flags = result.red_flags.len(),
        evidence = result.evidence_sources.len(),
        "Validated model reply"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hollow_moon_reply() {
        let reply = r#"```json
{"misinformation_probability": 85, "red_flags": [{"category":"Content","indicator":"Extraordinary claim","severity":"high","details":"No credible source"}], "analysis":"The claim contradicts decades of lunar seismology.", "evidence_sources":[{"source":"NASA","finding":"The moon has a dense core"}, "Apollo seismic experiments"]}
```"#;

        let result = analyze_reply(reply).unwrap();
        assert_eq!(result.misinformation_probability, 85);
        assert_eq!(result.red_flags.len(), 1);
        assert_eq!(result.red_flags[0].severity, Severity::High);
        assert_eq!(result.max_severity(), Some(Severity::High));
        assert_eq!(
            result.evidence_sources,
            vec![
                "[NASA] - The moon has a dense core".to_string(),
                "Apollo seismic experiments".to_string()
            ]
        );
    }

    #[test]
    fn test_normalize_failure_surfaces() {
        let err = analyze_reply("Sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, ReplyError::Normalize(NormalizeError::Malformed { .. })));
    }

    #[test]
    fn test_validation_failure_surfaces() {
        let reply = r#"{"misinformation_probability": 85, "red_flags": [{"category":"c","indicator":"i","severity":"critical","details":"d"}], "analysis":"a", "evidence_sources":[]}"#;
        match analyze_reply(reply) {
            Err(ReplyError::Validation(err)) => assert_eq!(err.path, "red_flags[0].severity"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_object_red_flags_dropped_before_validation() {
        let reply = r#"{"misinformation_probability": 10, "red_flags": ["noise", {"category":"c","indicator":"i","severity":"low","details":"d"}], "analysis":"a", "evidence_sources":[]}"#;
        let result = analyze_reply(reply).unwrap();
        assert_eq!(result.red_flags.len(), 1);
        assert_eq!(result.red_flags[0].severity, Severity::Low);
    }

    #[test]
    fn test_compose_then_analyze_with_builtin_templates() {
        let config = TemplateConfig::builtin().unwrap();
        let prompt = compose(&config, "Vaccines contain microchips").unwrap();
        assert!(prompt.contains("Vaccines contain microchips"));
        assert_eq!(config.model(), "gemini-2.5-flash");
    }
}
