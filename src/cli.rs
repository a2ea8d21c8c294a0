//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::IdeaInput;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// StartupGPT - multi-agent LLM reports for startup ideas
///
/// Runs legal, economic and business-structure agents against a hosted
/// model, stores their outputs per idea, and aggregates them into one
/// comprehensive report you can read back or chat about.
///
/// Examples:
///   startupgpt run --idea-id idea_007 --industry Technology --business-model Subscription
///   startupgpt report idea_007
///   startupgpt aggregate idea_007
///   startupgpt chat idea_007
///   startupgpt ideas
///   startupgpt --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .startupgpt.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the JSON record store
    #[arg(long, value_name = "FILE", env = "STARTUPGPT_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .startupgpt.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run all agents for an idea and store the comprehensive report
    Run(RunArgs),

    /// Print the stored comprehensive report for an idea
    Report {
        /// Idea identifier (defaults to [general] default_idea_id)
        idea_id: Option<String>,
    },

    /// Rebuild the comprehensive report from the analyses already stored
    Aggregate {
        /// Idea identifier (defaults to [general] default_idea_id)
        idea_id: Option<String>,
    },

    /// Ask questions in a conversational session
    Chat(ChatArgs),

    /// List stored ideas and the fields each one has
    Ideas,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Identifier to store the outputs under
    #[arg(long, value_name = "ID")]
    pub idea_id: Option<String>,

    /// Industry of the startup (default: General)
    #[arg(long)]
    pub industry: Option<String>,

    /// Business model, e.g. Subscription or Freemium (default: Standard)
    #[arg(long)]
    pub business_model: Option<String>,

    /// Business model type used for structure analysis (default: Standard)
    #[arg(long)]
    pub business_model_type: Option<String>,

    /// Company size, e.g. Startup, Small, Medium, Large (default: Startup)
    #[arg(long)]
    pub company_size: Option<String>,

    /// JSON file with input fields; explicit flags take precedence
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Completion model to use
    #[arg(short, long, env = "STARTUPGPT_MODEL")]
    pub model: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries after a transient completion failure
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<u32>,

    /// Also write a run report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Format of the run report (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Keep outputs in memory instead of writing the record store
    #[arg(long)]
    pub no_save: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ChatArgs {
    /// Show this idea's report before the first question
    pub idea_id: Option<String>,

    /// Chat model to use
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Output format for the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.init_config {
            return Ok(());
        }

        match self.command {
            None => Err(
                "A subcommand is required (run, report, aggregate, chat, ideas)".to_string(),
            ),
            Some(Command::Run(ref run)) => run.validate(),
            Some(Command::Report { ref idea_id }) | Some(Command::Aggregate { ref idea_id }) => {
                validate_idea_id(idea_id.as_deref())
            }
            Some(Command::Chat(ref chat)) => validate_idea_id(chat.idea_id.as_deref()),
            Some(Command::Ideas) => Ok(()),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl RunArgs {
    pub fn validate(&self) -> Result<(), String> {
        validate_idea_id(self.idea_id.as_deref())?;

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Input fields given as flags.
    pub fn flag_fields(&self) -> IdeaInput {
        let flags = [
            (IdeaInput::INDUSTRY, &self.industry),
            (IdeaInput::BUSINESS_MODEL, &self.business_model),
            (IdeaInput::BUSINESS_MODEL_TYPE, &self.business_model_type),
            (IdeaInput::COMPANY_SIZE, &self.company_size),
        ];

        flags
            .into_iter()
            .fold(IdeaInput::new(), |input, (key, value)| match value {
                Some(value) => input.with(key, value.clone()),
                None => input,
            })
    }
}

fn validate_idea_id(idea_id: Option<&str>) -> Result<(), String> {
    match idea_id {
        Some(id) if id.trim().is_empty() => Err("Idea ID must not be empty".to_string()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            command: Some(command),
            config: None,
            store: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_run_subcommand() {
        let args = Args::try_parse_from([
            "startupgpt",
            "run",
            "--idea-id",
            "idea_42",
            "--industry",
            "Fintech",
            "--format",
            "json",
        ])
        .unwrap();

        match args.command {
            Some(Command::Run(ref run)) => {
                assert_eq!(run.idea_id.as_deref(), Some("idea_42"));
                assert_eq!(run.industry.as_deref(), Some("Fintech"));
                assert_eq!(run.format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_flag_fields() {
        let run = RunArgs {
            industry: Some("Health".to_string()),
            company_size: Some("Medium".to_string()),
            ..RunArgs::default()
        };

        let input = run.flag_fields();
        assert_eq!(input.industry(), "Health");
        assert_eq!(input.company_size(), "Medium");
        assert_eq!(input.get(IdeaInput::BUSINESS_MODEL), None);
    }

    #[test]
    fn test_validation_temperature() {
        let args = make_args(Command::Run(RunArgs {
            temperature: Some(1.5),
            ..RunArgs::default()
        }));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_empty_idea_id() {
        let args = make_args(Command::Report {
            idea_id: Some("  ".to_string()),
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_parse_aggregate_subcommand() {
        let args = Args::try_parse_from(["startupgpt", "aggregate", "idea_9"]).unwrap();
        match args.command {
            Some(Command::Aggregate { ref idea_id }) => {
                assert_eq!(idea_id.as_deref(), Some("idea_9"))
            }
            ref other => panic!("unexpected command: {:?}", other),
        }

        let args = make_args(Command::Aggregate {
            idea_id: Some(String::new()),
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_requires_subcommand() {
        let mut args = make_args(Command::Ideas);
        args.command = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::Ideas);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::Ideas);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
