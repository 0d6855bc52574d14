//! Template document parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::schema::validate_document;
use crate::prompt::count_placeholders;

/// Built-in documents (loaded at compile time).
const BUILTIN_SYSTEM_JSON: &str = include_str!("../../../../templates/fact_check_system.json");
const BUILTIN_TEMPLATE_JSON: &str = include_str!("../../../../templates/fact_check_template.json");
const BUILTIN_REQUEST_JSON: &str = include_str!("../../../../templates/gemini_request.json");

/// Extensions tried, in order, when looking a document up in a directory.
const DOCUMENT_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// The three template documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    System,
    PromptTemplate,
    RequestSchema,
}

impl DocumentKind {
    /// File name (without extension) the document is stored under.
    pub fn file_stem(&self) -> &'static str {
        match self {
            DocumentKind::System => "fact_check_system",
            DocumentKind::PromptTemplate => "fact_check_template",
            DocumentKind::RequestSchema => "gemini_request",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::System => write!(f, "system instruction"),
            DocumentKind::PromptTemplate => write!(f, "prompt template"),
            DocumentKind::RequestSchema => write!(f, "request schema"),
        }
    }
}

/// Errors that can occur when loading template documents.
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Missing {document} document: {}", path.display())]
    Missing { document: DocumentKind, path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {document} document as JSON: {source}")]
    Json {
        document: DocumentKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse {document} document as YAML: {source}")]
    Yaml {
        document: DocumentKind,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{document} document does not match its schema: {}", errors.join("; "))]
    Schema {
        document: DocumentKind,
        errors: Vec<String>,
    },

    #[error("Failed to load schema for {document} document: {message}")]
    SchemaCompile {
        document: DocumentKind,
        message: String,
    },
}

/// Header of the system document.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SystemInstruction {
    /// One-line task statement
    pub task: String,

    /// Longer description of the analyst role
    pub description: String,

    /// Note rendered verbatim under its own header
    pub critical_note: String,
}

/// Declared index of an analysis step.
///
/// Documents use plain numbers (`1`), decimals (`2.5`) or free labels
/// (`"2a"`). Whole-valued decimals keep their fraction (`1.0`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StepLabel {
    Index(i64),
    Number(f64),
    Text(String),
}

impl fmt::Display for StepLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepLabel::Index(i) => write!(f, "{}", i),
            StepLabel::Number(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{:.1}", n),
            StepLabel::Number(n) => write!(f, "{}", n),
            StepLabel::Text(s) => f.write_str(s),
        }
    }
}

/// One analysis step. Steps are trusted to be pre-ordered and complete.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AnalysisStep {
    /// Declared index; rendered as an empty label when absent
    pub step: Option<StepLabel>,

    pub name: String,

    pub description: String,

    /// Criteria bullets; `None` omits the criteria block entirely
    pub criteria: Option<Vec<String>>,
}

/// Description and format hints for one result field.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FieldRequirement {
    pub description: String,
    pub format: String,
    pub calculation: String,
    pub tone: String,
}

/// Output hints for the four result fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct OutputRequirements {
    pub red_flags: FieldRequirement,
    pub misinformation_probability: FieldRequirement,
    pub analysis: FieldRequirement,
    pub evidence_sources: FieldRequirement,
}

/// System instruction document: task, steps, output hints, notes.
///
/// Every key is optional. Missing keys render as empty text.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SystemConfig {
    pub system_instruction: SystemInstruction,
    pub analysis_steps: Vec<AnalysisStep>,
    pub output_requirements: OutputRequirements,
    pub important_notes: Vec<String>,
}

/// User prompt template document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptTemplate {
    /// Template text holding the `{post_content}` placeholder; empty when
    /// the key is absent, which `compose` then rejects
    #[serde(default)]
    pub user_prompt_template: String,

    /// Free-form version tag of the document
    #[serde(default)]
    pub version: Option<String>,
}

impl PromptTemplate {
    /// Number of `{post_content}` placeholders in the template.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.user_prompt_template)
    }
}

/// Generation settings inside the request schema document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestConfig {
    /// Response shape mirrored into the prompt for the model
    pub response_schema: JsonValue,
}

/// Request schema document: target model and response shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestSchema {
    /// Model identifier (e.g., "gemini-2.5-flash")
    pub model: String,

    pub config: RequestConfig,
}

impl RequestSchema {
    pub fn response_schema(&self) -> &JsonValue {
        &self.config.response_schema
    }
}

/// Locations of the three template documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePaths {
    pub system: PathBuf,
    pub prompt_template: PathBuf,
    pub request_schema: PathBuf,
}

impl TemplatePaths {
    /// Resolve the documents inside a directory.
    ///
    /// For each document the first existing file among `<stem>.json`,
    /// `<stem>.yaml` and `<stem>.yml` is used.
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let dir = dir.as_ref();
        Ok(Self {
            system: find_document(dir, DocumentKind::System)?,
            prompt_template: find_document(dir, DocumentKind::PromptTemplate)?,
            request_schema: find_document(dir, DocumentKind::RequestSchema)?,
        })
    }
}

fn find_document(dir: &Path, kind: DocumentKind) -> Result<PathBuf, ConfigLoadError> {
    DOCUMENT_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", kind.file_stem(), ext)))
        .find(|path| path.is_file())
        .ok_or_else(|| ConfigLoadError::Missing {
            document: kind,
            path: dir.join(format!("{}.json", kind.file_stem())),
        })
}

/// The loaded template documents.
///
/// Built once and shared read-only; nothing in the pipeline mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateConfig {
    pub system: SystemConfig,
    pub prompt_template: PromptTemplate,
    pub request_schema: RequestSchema,
}

impl TemplateConfig {
    /// Load the documents from a directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let paths = TemplatePaths::in_dir(dir)?;
        Self::load_from(&paths)
    }

    /// Load the documents from explicit paths.
    pub fn load_from(paths: &TemplatePaths) -> Result<Self, ConfigLoadError> {
        let system = read_document(DocumentKind::System, &paths.system)?;
        let template = read_document(DocumentKind::PromptTemplate, &paths.prompt_template)?;
        let request = read_document(DocumentKind::RequestSchema, &paths.request_schema)?;
        Self::from_values(system, template, request)
    }

    /// Parse the documents compiled into the crate.
    pub fn builtin() -> Result<Self, ConfigLoadError> {
        Self::from_values(
            parse_json(DocumentKind::System, BUILTIN_SYSTEM_JSON)?,
            parse_json(DocumentKind::PromptTemplate, BUILTIN_TEMPLATE_JSON)?,
            parse_json(DocumentKind::RequestSchema, BUILTIN_REQUEST_JSON)?,
        )
    }

    /// Build from already-parsed documents.
    ///
    /// Each document is validated against its schema before deserialization.
    pub fn from_values(
        system: JsonValue,
        prompt_template: JsonValue,
        request_schema: JsonValue,
    ) -> Result<Self, ConfigLoadError> {
        Ok(Self {
            system: decode(DocumentKind::System, system)?,
            prompt_template: decode(DocumentKind::PromptTemplate, prompt_template)?,
            request_schema: decode(DocumentKind::RequestSchema, request_schema)?,
        })
    }

    /// Model identifier from the request schema document.
    pub fn model(&self) -> &str {
        &self.request_schema.model
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    kind: DocumentKind,
    value: JsonValue,
) -> Result<T, ConfigLoadError> {
    validate_document(kind, &value)?;
    serde_json::from_value(value).map_err(|source| ConfigLoadError::Json {
        document: kind,
        source,
    })
}

fn read_document(kind: DocumentKind, path: &Path) -> Result<JsonValue, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigLoadError::Missing {
                document: kind,
                path: path.to_path_buf(),
            }
        } else {
            ConfigLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let value = if is_yaml(path) {
        serde_yaml::from_str(&contents).map_err(|source| ConfigLoadError::Yaml {
            document: kind,
            source,
        })?
    } else {
        parse_json(kind, &contents)?
    };

    tracing::debug!(document = %kind, path = %path.display(), "Loaded template document");
    Ok(value)
}

fn parse_json(kind: DocumentKind, contents: &str) -> Result<JsonValue, ConfigLoadError> {
    serde_json::from_str(contents).map_err(|source| ConfigLoadError::Json {
        document: kind,
        source,
    })
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Fresh scratch directory under the system temp dir.
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "factcheck-templates-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn request_doc() -> JsonValue {
        json!({
            "model": "gemini-2.5-flash",
            "config": { "response_schema": { "type": "object" } }
        })
    }

    #[test]
    fn test_builtin_documents_load() {
        let config = TemplateConfig::builtin().unwrap();
        assert_eq!(config.model(), "gemini-2.5-flash");
        assert!(!config.system.analysis_steps.is_empty());
        assert_eq!(config.prompt_template.placeholder_count(), 1);
        assert!(config.request_schema.response_schema()["properties"]
            .get("red_flags")
            .is_some());
    }

    #[test]
    fn test_sparse_system_document_defaults_to_empty() {
        let config = TemplateConfig::from_values(
            json!({ "analysis_steps": [{ "name": "Claims" }] }),
            json!({ "user_prompt_template": "{post_content}" }),
            request_doc(),
        )
        .unwrap();

        assert_eq!(config.system.system_instruction.task, "");
        assert!(config.system.important_notes.is_empty());

        let step = &config.system.analysis_steps[0];
        assert_eq!(step.step, None);
        assert_eq!(step.description, "");
        assert_eq!(step.criteria, None);
    }

    #[test]
    fn test_step_labels() {
        let config = TemplateConfig::from_values(
            json!({ "analysis_steps": [{ "step": 3 }, { "step": "4b" }] }),
            json!({ "user_prompt_template": "{post_content}" }),
            request_doc(),
        )
        .unwrap();

        let labels: Vec<String> = config
            .system
            .analysis_steps
            .iter()
            .map(|s| s.step.as_ref().map(|l| l.to_string()).unwrap_or_default())
            .collect();
        assert_eq!(labels, vec!["3", "4b"]);
    }

    #[test]
    fn test_decimal_step_labels_keep_fraction() {
        let config = TemplateConfig::from_values(
            json!({ "analysis_steps": [{ "step": 1.0 }, { "step": 2.5 }] }),
            json!({ "user_prompt_template": "{post_content}" }),
            request_doc(),
        )
        .unwrap();

        let labels: Vec<String> = config
            .system
            .analysis_steps
            .iter()
            .map(|s| s.step.as_ref().map(|l| l.to_string()).unwrap_or_default())
            .collect();
        assert_eq!(labels, vec!["1.0", "2.5"]);
    }

    #[test]
    fn test_missing_template_key_loads_empty() {
        let config = TemplateConfig::from_values(json!({}), json!({}), request_doc()).unwrap();
        assert_eq!(config.prompt_template.user_prompt_template, "");
        assert_eq!(config.prompt_template.placeholder_count(), 0);
        assert!(matches!(
            crate::prompt::compose(&config, "post"),
            Err(crate::prompt::PromptBuildError::PlaceholderCount { found: 0 })
        ));
    }

    #[test]
    fn test_schema_violation_is_config_error() {
        let result = TemplateConfig::from_values(
            json!({}),
            json!({ "user_prompt_template": 42 }),
            request_doc(),
        );
        assert!(matches!(
            result,
            Err(ConfigLoadError::Schema {
                document: DocumentKind::PromptTemplate,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_directory_reports_document() {
        let result = TemplateConfig::load("/nonexistent/factcheck/templates");
        match result {
            Err(ConfigLoadError::Missing { document, path }) => {
                assert_eq!(document, DocumentKind::System);
                assert!(path.ends_with("fact_check_system.json"));
            }
            other => panic!("Expected Missing error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_mixed_json_and_yaml() {
        let dir = scratch_dir("mixed");
        fs::write(
            dir.join("fact_check_system.yaml"),
            "system_instruction:\n  task: Check the post\nimportant_notes:\n  - Be neutral\n",
        )
        .unwrap();
        fs::write(
            dir.join("fact_check_template.json"),
            r#"{"user_prompt_template": "POST: {post_content}"}"#,
        )
        .unwrap();
        fs::write(
            dir.join("gemini_request.yml"),
            "model: gemini-2.5-pro\nconfig:\n  response_schema:\n    type: object\n",
        )
        .unwrap();

        let config = TemplateConfig::load(&dir).unwrap();
        assert_eq!(config.system.system_instruction.task, "Check the post");
        assert_eq!(config.system.important_notes, vec!["Be neutral"]);
        assert_eq!(config.model(), "gemini-2.5-pro");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unparseable_document_fails() {
        let dir = scratch_dir("broken");
        fs::write(dir.join("fact_check_system.json"), "{ not json").unwrap();
        fs::write(
            dir.join("fact_check_template.json"),
            r#"{"user_prompt_template": "{post_content}"}"#,
        )
        .unwrap();
        fs::write(
            dir.join("gemini_request.json"),
            r#"{"model": "m", "config": {"response_schema": {}}}"#,
        )
        .unwrap();

        let result = TemplateConfig::load(&dir);
        assert!(matches!(
            result,
            Err(ConfigLoadError::Json {
                document: DocumentKind::System,
                ..
            })
        ));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_from_explicit_missing_path() {
        let paths = TemplatePaths {
            system: PathBuf::from("/nonexistent/system.json"),
            prompt_template: PathBuf::from("/nonexistent/template.json"),
            request_schema: PathBuf::from("/nonexistent/request.json"),
        };
        assert!(matches!(
            TemplateConfig::load_from(&paths),
            Err(ConfigLoadError::Missing { .. })
        ));
    }
}
