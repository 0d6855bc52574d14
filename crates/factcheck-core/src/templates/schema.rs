//! JSON Schema validation for template documents.
//!
//! Each of the three documents is checked against an embedded schema from
//! `schemas/` before it is deserialized. The schemas only pin down shape:
//! the system and prompt template documents have no required keys, so a
//! sparse document still loads and renders with empty fields.

use std::sync::OnceLock;

use super::parser::{ConfigLoadError, DocumentKind};

/// Embedded document schemas (loaded at compile time).
const SYSTEM_CONFIG_SCHEMA_JSON: &str =
    include_str!("../../../../schemas/system_config.schema.json");
const PROMPT_TEMPLATE_SCHEMA_JSON: &str =
    include_str!("../../../../schemas/prompt_template.schema.json");
const REQUEST_SCHEMA_SCHEMA_JSON: &str =
    include_str!("../../../../schemas/request_schema.schema.json");

type CompiledSchema = OnceLock<Result<jsonschema::Validator, String>>;

/// Compiled validators (initialized once, reused).
static SYSTEM_CONFIG_SCHEMA: CompiledSchema = OnceLock::new();
static PROMPT_TEMPLATE_SCHEMA: CompiledSchema = OnceLock::new();
static REQUEST_SCHEMA_SCHEMA: CompiledSchema = OnceLock::new();

/// Get or initialize the compiled validator for a document kind.
fn get_validator(kind: DocumentKind) -> Result<&'static jsonschema::Validator, ConfigLoadError> {
    let (cell, source) = match kind {
        DocumentKind::System => (&SYSTEM_CONFIG_SCHEMA, SYSTEM_CONFIG_SCHEMA_JSON),
        DocumentKind::PromptTemplate => (&PROMPT_TEMPLATE_SCHEMA, PROMPT_TEMPLATE_SCHEMA_JSON),
        DocumentKind::RequestSchema => (&REQUEST_SCHEMA_SCHEMA, REQUEST_SCHEMA_SCHEMA_JSON),
    };

    let result = cell.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(source) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(ConfigLoadError::SchemaCompile {
            document: kind,
            message: e.clone(),
        }),
    }
}

/// Validate a parsed document against the schema for its kind.
///
/// All violations are collected, each formatted as `"<message> at <path>"`.
pub fn validate_document(
    kind: DocumentKind,
    document: &serde_json::Value,
) -> Result<(), ConfigLoadError> {
    let validator = get_validator(kind)?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigLoadError::Schema {
            document: kind,
            errors,
        })
    }
}
