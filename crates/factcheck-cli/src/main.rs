//! `factcheck` - assess a post's misinformation risk from the command line.
//!
//! ```bash
//! factcheck check "Breaking: scientists confirm the moon is hollow"
//! echo '{"post_content": "..."}' | factcheck check --json
//! factcheck prompt --file post.txt
//! factcheck parse reply.txt
//! factcheck templates --templates ./templates
//! ```
//!
//! Results go to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use factcheck_core::{analyze_reply, compose, AnalysisRequest, AnalysisResult, TemplateConfig};
use factcheck_runtime::{append_schema_instruction, FactChecker, RuntimeConfig};

/// Misinformation fact-checking with a search-grounded model
#[derive(Parser)]
#[command(name = "factcheck", author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the template documents
    #[arg(long, global = true, value_name = "DIR")]
    templates: Option<PathBuf>,

    /// Runtime config file (JSON or YAML)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fact-check a post
    Check {
        /// Post text; read from --file or stdin when omitted
        text: Option<String>,

        /// Read the post from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Treat the input as a request body: {"post_content": "..."}
        #[arg(long)]
        json: bool,
    },

    /// Print the prompt that would be sent to the model
    Prompt {
        /// Post text; read from --file or stdin when omitted
        text: Option<String>,

        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Validate a saved model reply
    Parse {
        /// Reply file; stdin when omitted
        path: Option<PathBuf>,
    },

    /// Load the template documents and print a summary
    Templates,
}

/// A check that ran and failed.
#[derive(Debug)]
struct CheckFailed(String);

impl fmt::Display for CheckFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fact-check failed: {}", self.0)
    }
}

impl std::error::Error for CheckFailed {}

fn failed(err: impl fmt::Display) -> anyhow::Error {
    CheckFailed(err.to_string()).into()
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<CheckFailed>() {
            Some(failure) => {
                let detail = serde_json::json!({ "detail": failure.to_string() });
                println!("{}", detail);
                ExitCode::from(1)
            }
            None => {
                eprintln!("error: {:#}", err);
                ExitCode::from(2)
            }
        },
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = runtime_config(cli.config.as_deref(), cli.templates)?;
    tracing::debug!(?config, "Runtime configuration resolved");

    match cli.command {
        Command::Check { text, file, json } => {
            let input = read_input(text, file.as_deref())?;
            let request = if json {
                AnalysisRequest::from_json(&input).context("Invalid request body")?
            } else {
                AnalysisRequest {
                    post_content: input,
                }
            };

            let checker =
                FactChecker::from_env(&config).context("Failed to initialize fact checker")?;
            let result = checker.check_request(&request).await.map_err(failed)?;
            print_result(&result)
        }

        Command::Prompt { text, file } => {
            let input = read_input(text, file.as_deref())?;
            let templates = load_templates(&config)?;
            let prompt = compose(&templates, &input).map_err(failed)?;
            println!(
                "{}",
                append_schema_instruction(&prompt, templates.request_schema.response_schema())
            );
            Ok(())
        }

        Command::Parse { path } => {
            let reply = read_input(None, path.as_deref())?;
            let result = analyze_reply(&reply).map_err(failed)?;
            print_result(&result)
        }

        Command::Templates => {
            let templates = load_templates(&config)?;
            let source = config
                .templates_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "built-in".to_string());

            println!("Source:         {}", source);
            println!("Model:          {}", templates.model());
            if let Some(version) = &templates.prompt_template.version {
                println!("Template:       v{}", version);
            }
            println!("Analysis steps: {}", templates.system.analysis_steps.len());
            println!("Notes:          {}", templates.system.important_notes.len());
            println!(
                "Placeholders:   {}",
                templates.prompt_template.placeholder_count()
            );
            Ok(())
        }
    }
}

/// Config file (or defaults), then environment, then `--templates`.
fn runtime_config(path: Option<&Path>, templates: Option<PathBuf>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    let mut config = config
        .with_env_overrides()
        .context("Invalid configuration override")?;

    if templates.is_some() {
        config.templates_dir = templates;
    }

    Ok(config)
}

fn load_templates(config: &RuntimeConfig) -> Result<TemplateConfig> {
    config
        .load_templates()
        .context("Failed to load template documents")
}

fn read_input(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }

    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read stdin")?;
    Ok(input)
}

fn print_result(result: &AnalysisResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_check() {
        let cli = Cli::try_parse_from(["factcheck", "--verbose", "check", "the moon is hollow"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Check { text, file, json } => {
                assert_eq!(text.as_deref(), Some("the moon is hollow"));
                assert!(file.is_none());
                assert!(!json);
            }
            _ => panic!("Expected check command"),
        }
    }

    #[test]
    fn test_text_and_file_conflict() {
        let result = Cli::try_parse_from(["factcheck", "check", "text", "--file", "post.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_templates_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["factcheck", "templates", "--templates", "/tmp/t"]).unwrap();
        assert_eq!(cli.templates, Some(PathBuf::from("/tmp/t")));
    }

    #[test]
    fn test_templates_flag_overrides_config() {
        let config = runtime_config(None, Some(PathBuf::from("/srv/templates"))).unwrap();
        assert_eq!(config.templates_dir, Some(PathBuf::from("/srv/templates")));
    }

    #[test]
    fn test_failure_detail_message() {
        let err = failed("Empty response from model");
        let failure = err.downcast_ref::<CheckFailed>().unwrap();
        assert_eq!(failure.to_string(), "Fact-check failed: Empty response from model");
    }
}
