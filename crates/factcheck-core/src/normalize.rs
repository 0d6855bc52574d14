//! Recovery of a JSON candidate from a free-form model reply.
//!
//! Models wrap their JSON in markdown fences, prepend prose, and cite
//! evidence either as plain strings or as `{source, finding}` objects.
//! Normalization strips the wrapping, slices out the outermost object and
//! reconciles both evidence shapes into strings. Range and enum checks are
//! left to [`crate::validate`].

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;

/// Rendered in place of a missing evidence source.
pub const UNKNOWN_SOURCE: &str = "unknown source";

/// Rendered in place of a missing evidence finding.
pub const NO_DETAILS: &str = "no details";

/// Preview bound for replies without a JSON object.
pub const MALFORMED_PREVIEW_CHARS: usize = 300;

/// Preview bound for replies whose JSON does not parse.
pub const PARSE_PREVIEW_CHARS: usize = 500;

const FENCE: &str = "```";

lazy_static! {
    /// Language tag left at the start of a fenced block's content.
    static ref LANGUAGE_TAG: Regex =
        Regex::new(r"^(?i:json5|jsonc|json|javascript|js)\b").unwrap();
}

/// Errors from reply normalization.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Empty response from model")]
    Empty,

    #[error("No JSON object found in model response: {preview}")]
    Malformed { preview: String },

    #[error("Failed to parse model response as JSON: {source}. Response: {preview}")]
    JsonParse {
        #[source]
        source: serde_json::Error,
        preview: String,
    },
}

/// Reconciled, not yet validated result mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Candidate {
    fields: Map<String, Value>,
}

impl Candidate {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for Candidate {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// One `evidence_sources` element as the model emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceEntry {
    /// Plain citation string, passed through unchanged
    Text(String),

    /// Structured citation object
    Cited {
        source: Option<String>,
        finding: Option<String>,
    },

    /// Any other JSON value, kept as its JSON text
    Scalar(String),
}

impl EvidenceEntry {
    /// Classify a raw element.
    ///
    /// For objects the finding falls back from `finding` to `content`.
    /// `null` fields count as missing.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => EvidenceEntry::Text(s),
            Value::Object(map) => EvidenceEntry::Cited {
                source: text_field(&map, "source"),
                finding: text_field(&map, "finding").or_else(|| text_field(&map, "content")),
            },
            other => EvidenceEntry::Scalar(other.to_string()),
        }
    }

    /// Render as the citation string stored in the result.
    pub fn render(self) -> String {
        match self {
            EvidenceEntry::Text(s) | EvidenceEntry::Scalar(s) => s,
            EvidenceEntry::Cited { source, finding } => format!(
                "[{}] - {}",
                source.as_deref().unwrap_or(UNKNOWN_SOURCE),
                finding.as_deref().unwrap_or(NO_DETAILS)
            ),
        }
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Truncate to at most `max_chars` characters for diagnostics.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Normalize a raw model reply into a candidate.
pub fn normalize(raw_reply: &str) -> Result<Candidate, NormalizeError> {
    let text = raw_reply.trim();
    if text.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let unfenced = strip_fence(text);
    let payload = locate_object(&unfenced)?;

    let value: Value = serde_json::from_str(payload).map_err(|source| NormalizeError::JsonParse {
        source,
        preview: truncate_preview(payload, PARSE_PREVIEW_CHARS),
    })?;

    let mut fields = match value {
        Value::Object(map) => map,
        other => {
            return Err(NormalizeError::Malformed {
                preview: truncate_preview(&other.to_string(), MALFORMED_PREVIEW_CHARS),
            })
        }
    };

    reconcile_evidence(&mut fields);
    reconcile_red_flags(&mut fields);

    Ok(Candidate { fields })
}

/// Strip a markdown fence wrapping the whole reply.
///
/// Removes the first and last line of the block, then a leading language
/// tag. Blocks with nothing between their fences are left as-is.
fn strip_fence(text: &str) -> Cow<'_, str> {
    if !text.starts_with(FENCE) {
        return Cow::Borrowed(text);
    }

    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < 3 {
        return Cow::Borrowed(text);
    }

    let inner = lines[1..lines.len() - 1].join("\n");
    tracing::debug!(lines = lines.len(), "Stripped code fence from model reply");

    match LANGUAGE_TAG.find(&inner) {
        Some(tag) => Cow::Owned(inner[tag.end()..].trim().to_string()),
        None => Cow::Owned(inner),
    }
}

/// Slice from the first `{` to the last `}`.
fn locate_object(text: &str) -> Result<&str, NormalizeError> {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(NormalizeError::Malformed {
            preview: truncate_preview(text, MALFORMED_PREVIEW_CHARS),
        }),
    }
}

fn reconcile_evidence(fields: &mut Map<String, Value>) {
    if let Some(Value::Array(items)) = fields.get_mut("evidence_sources") {
        let rendered: Vec<Value> = items
            .drain(..)
            .map(|item| Value::String(EvidenceEntry::from_value(item).render()))
            .collect();
        *items = rendered;
    }
}

fn reconcile_red_flags(fields: &mut Map<String, Value>) {
    if let Some(Value::Array(items)) = fields.get_mut("red_flags") {
        let before = items.len();
        items.retain(Value::is_object);
        let dropped = before - items.len();
        if dropped > 0 {
            tracing::warn!(dropped, "Dropped non-object red_flags entries from model reply");
        }
    }
}
