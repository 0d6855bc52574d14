//! Prompt composition.
//!
//! The final prompt is five blocks joined with fixed separators: the system
//! header, the analysis steps, the response-format hints, the important
//! notes and the user prompt. Only the user prompt is a template; every
//! brace in it other than `{post_content}` is literal text.

use thiserror::Error;

use crate::templates::{AnalysisStep, OutputRequirements, TemplateConfig};

/// The one placeholder recognized in the user prompt template.
pub const CONTENT_PLACEHOLDER: &str = "{post_content}";

const PLACEHOLDER_NAME: &str = "post_content";

/// Errors from placeholder substitution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptBuildError {
    #[error("Failed to build prompt: template must contain {{post_content}} exactly once, found {found}")]
    PlaceholderCount { found: usize },

    #[error("Failed to build prompt: unknown placeholder '{{{name}}}'")]
    UnknownPlaceholder { name: String },

    #[error("Failed to build prompt: unbalanced brace at byte {offset}")]
    UnbalancedBrace { offset: usize },
}

/// Count occurrences of `{post_content}` in a raw template.
pub fn count_placeholders(template: &str) -> usize {
    template.matches(CONTENT_PLACEHOLDER).count()
}

/// Escape every brace in `template` except the content placeholder.
///
/// `{` becomes `{{` and `}` becomes `}}`, so after [`substitute`] the only
/// substitution target left is `{post_content}`.
pub fn escape_template(template: &str) -> String {
    let mut escaped = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(c) = rest.chars().next() {
        if rest.starts_with(CONTENT_PLACEHOLDER) {
            escaped.push_str(CONTENT_PLACEHOLDER);
            rest = &rest[CONTENT_PLACEHOLDER.len()..];
            continue;
        }
        match c {
            '{' => escaped.push_str("{{"),
            '}' => escaped.push_str("}}"),
            _ => escaped.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }

    escaped
}

/// Substitute `{post_content}` in an escaped template.
///
/// Single pass: `{{` and `}}` collapse to literal braces and the content is
/// inserted verbatim. Inserted content is never rescanned, so braces or
/// placeholder syntax inside the post cannot reach the substitution step.
pub fn substitute(escaped: &str, content: &str) -> Result<String, PromptBuildError> {
    let mut out = String::with_capacity(escaped.len() + content.len());
    let mut chars = escaped.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let start = offset + 1;
                let mut end = None;
                for (i, ch) in chars.by_ref() {
                    match ch {
                        '}' => {
                            end = Some(i);
                            break;
                        }
                        '{' => return Err(PromptBuildError::UnbalancedBrace { offset }),
                        _ => {}
                    }
                }
                let end = end.ok_or(PromptBuildError::UnbalancedBrace { offset })?;

                let name = &escaped[start..end];
                if name != PLACEHOLDER_NAME {
                    return Err(PromptBuildError::UnknownPlaceholder {
                        name: name.to_string(),
                    });
                }
                out.push_str(content);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(PromptBuildError::UnbalancedBrace { offset });
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Compose the full prompt for one post.
///
/// Missing template fields render as empty text. The post content is
/// opaque data: it is inserted exactly once, unmodified.
pub fn compose(config: &TemplateConfig, post_content: &str) -> Result<String, PromptBuildError> {
    let template = &config.prompt_template.user_prompt_template;
    let found = count_placeholders(template);
    if found != 1 {
        return Err(PromptBuildError::PlaceholderCount { found });
    }
    let user_prompt = substitute(&escape_template(template), post_content)?;

    let system = &config.system;
    let instruction = &system.system_instruction;

    let prompt = format!(
        "TASK: {task}\n\n\
         {description}\n\n\
         CRITICAL NOTE: {critical_note}\n\n\
         ANALYSIS STEPS:\n{steps}\n\n\
         {output_format}\n\n\
         IMPORTANT NOTES:\n{notes}\n\n\
         ---\n\n\
         {user_prompt}\n",
        task = instruction.task,
        description = instruction.description,
        critical_note = instruction.critical_note,
        steps = render_steps(&system.analysis_steps),
        output_format = render_output_format(&system.output_requirements),
        notes = render_bullets(&system.important_notes, "- "),
        user_prompt = user_prompt,
    );

    tracing::debug!(
        prompt_length = prompt.len(),
        steps = system.analysis_steps.len(),
        "Composed fact-check prompt"
    );

    Ok(prompt)
}

fn render_steps(steps: &[AnalysisStep]) -> String {
    steps
        .iter()
        .map(|step| {
            let label = step
                .step
                .as_ref()
                .map(|label| label.to_string())
                .unwrap_or_default();
            let mut text = format!("{}. {}:\n{}", label, step.name, step.description);
            if let Some(criteria) = &step.criteria {
                text.push_str("\nCriteria:\n");
                text.push_str(&render_bullets(criteria, "  - "));
            }
            text
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_output_format(req: &OutputRequirements) -> String {
    format!(
        "Response format:\n\
         - red_flags: {} ({})\n\
         - misinformation_probability: {} ({})\n\
         - analysis: {} (Tone: {})\n\
         - evidence_sources: {} (Format: {})",
        req.red_flags.description,
        req.red_flags.format,
        req.misinformation_probability.description,
        req.misinformation_probability.calculation,
        req.analysis.description,
        req.analysis.tone,
        req.evidence_sources.description,
        req.evidence_sources.format,
    )
}

fn render_bullets(items: &[String], bullet: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", bullet, item))
        .collect::<Vec<_>>()
        .join("\n")
}
