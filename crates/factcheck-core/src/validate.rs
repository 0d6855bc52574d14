//! Strict validation of a normalized candidate.
//!
//! Validation is total: every field is well-formed or the whole candidate
//! is rejected. Fields are checked in a fixed order and the first
//! violation is reported with its path.

use serde_json::{Number, Value};
use thiserror::Error;

use crate::normalize::{truncate_preview, Candidate};
use crate::types::{AnalysisResult, RedFlag, Severity};

const FOUND_PREVIEW_CHARS: usize = 60;

/// A candidate field that does not meet its constraint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid field '{path}': expected {expected}, found {found}")]
pub struct ValidationError {
    /// Field path, e.g. `red_flags[2].severity`
    pub path: String,

    /// The constraint that was violated
    pub expected: String,

    /// Short description of the offending value
    pub found: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, expected: impl Into<String>, found: Option<&Value>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            found: describe(found),
        }
    }
}

fn describe(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "nothing (field missing)".to_string();
    };
    let kind = match value {
        Value::Null => return "null".to_string(),
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!(
        "{} {}",
        kind,
        truncate_preview(&value.to_string(), FOUND_PREVIEW_CHARS)
    )
}

/// Validate a candidate into an [`AnalysisResult`].
pub fn validate(candidate: Candidate) -> Result<AnalysisResult, ValidationError> {
    let mut fields = candidate.into_fields();

    let misinformation_probability = probability(fields.remove("misinformation_probability"))?;
    let red_flags = red_flags(fields.remove("red_flags"))?;
    let analysis = string("analysis", fields.remove("analysis"))?;
    let evidence_sources = string_list("evidence_sources", fields.remove("evidence_sources"))?;

    Ok(AnalysisResult {
        misinformation_probability,
        red_flags,
        analysis,
        evidence_sources,
    })
}

fn probability(value: Option<Value>) -> Result<u8, ValidationError> {
    const PATH: &str = "misinformation_probability";
    const RANGE: &str = "integer in [0, 100]";

    let number = match &value {
        Some(Value::Number(n)) => integral(n),
        _ => None,
    }
    .ok_or_else(|| ValidationError::new(PATH, "integer", value.as_ref()))?;

    if !(0..=100).contains(&number) {
        return Err(ValidationError::new(PATH, RANGE, value.as_ref()));
    }

    // in range, so the cast is lossless
    Ok(number as u8)
}

/// Integer value of a JSON number; integral floats such as `85.0` count.
fn integral(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn string(path: &str, value: Option<Value>) -> Result<String, ValidationError> {
    match value {
        Some(Value::String(s)) => Ok(s),
        other => Err(ValidationError::new(path, "string", other.as_ref())),
    }
}

fn string_list(path: &str, value: Option<Value>) -> Result<Vec<String>, ValidationError> {
    let items = match value {
        Some(Value::Array(items)) => items,
        other => return Err(ValidationError::new(path, "array of strings", other.as_ref())),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| string(&format!("{}[{}]", path, i), Some(item)))
        .collect()
}

fn red_flags(value: Option<Value>) -> Result<Vec<RedFlag>, ValidationError> {
    const PATH: &str = "red_flags";

    let items = match value {
        Some(Value::Array(items)) => items,
        other => return Err(ValidationError::new(PATH, "array of red flags", other.as_ref())),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| red_flag(&format!("{}[{}]", PATH, i), item))
        .collect()
}

fn red_flag(path: &str, item: Value) -> Result<RedFlag, ValidationError> {
    let mut flag = match item {
        Value::Object(map) => map,
        other => return Err(ValidationError::new(path, "object", Some(&other))),
    };
    let field = |name: &str| format!("{}.{}", path, name);

    let category = string(&field("category"), flag.remove("category"))?;
    let indicator = string(&field("indicator"), flag.remove("indicator"))?;

    let severity_path = field("severity");
    let severity = match flag.remove("severity") {
        Some(Value::String(s)) => s.parse::<Severity>().map_err(|_| {
            ValidationError::new(
                severity_path.as_str(),
                "one of \"low\", \"medium\", \"high\"",
                Some(&Value::String(s.clone())),
            )
        })?,
        other => {
            return Err(ValidationError::new(
                severity_path,
                "one of \"low\", \"medium\", \"high\"",
                other.as_ref(),
            ))
        }
    };

    let details = string(&field("details"), flag.remove("details"))?;

    Ok(RedFlag {
        category,
        indicator,
        severity,
        details,
    })
}
