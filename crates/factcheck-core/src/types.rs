//! Core types for fact-check requests and results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when building an [`AnalysisRequest`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("post_content must not be empty")]
    EmptyContent,
}

/// A single fact-check request.
///
/// The content is opaque: it is never parsed, trimmed or sanitized.
/// The model decides whether it is relevant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Full text of the post to analyze
    pub post_content: String,
}

impl AnalysisRequest {
    /// Create a request, rejecting empty content.
    pub fn new(post_content: impl Into<String>) -> Result<Self, RequestError> {
        let request = Self {
            post_content: post_content.into(),
        };
        request.validate()?;
        Ok(request)
    }

    /// Parse a request body of the form `{"post_content": "..."}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check the non-empty invariant.
    ///
    /// Deserialized requests bypass [`AnalysisRequest::new`], so callers
    /// accepting request bodies should run this before checking.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.post_content.is_empty() {
            return Err(RequestError::EmptyContent);
        }
        Ok(())
    }
}

/// Severity of a red flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// All accepted severity literals, in ascending order.
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Exact, case-sensitive match on the three literals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// A warning sign identified in a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedFlag {
    /// Category (e.g., "Content", "Language quality")
    pub category: String,

    /// The concrete indicator identified
    pub indicator: String,

    /// How much weight the flag carries
    pub severity: Severity,

    /// Why this is a red flag
    pub details: String,
}

/// Validated misinformation-risk assessment of a post.
///
/// Only produced by [`crate::validate`]; every field is well-formed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Probability (0-100) that the post contains misinformation
    pub misinformation_probability: u8,

    /// Red flags in the order the model reported them
    pub red_flags: Vec<RedFlag>,

    /// Narrative summary; by convention it carries no final verdict
    pub analysis: String,

    /// Sources consulted, each "[source] - finding" or a raw string
    pub evidence_sources: Vec<String>,
}

impl AnalysisResult {
    /// Highest severity among the red flags, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.red_flags.iter().map(|f| f.severity).max()
    }
}
