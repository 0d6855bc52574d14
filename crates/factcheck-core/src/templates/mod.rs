//! Template documents and their loading.
//!
//! The three documents (system instructions, user-prompt template and
//! request schema) are structured data validated against embedded JSON
//! Schemas. They are loaded once and never mutated.

mod parser;
mod schema;

pub use parser::{
    AnalysisStep, ConfigLoadError, DocumentKind, FieldRequirement, OutputRequirements,
    PromptTemplate, RequestConfig, RequestSchema, StepLabel, SystemConfig, SystemInstruction,
    TemplateConfig, TemplatePaths,
};
pub use schema::validate_document;
