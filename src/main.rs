//! StartupGPT - multi-agent LLM analysis of startup ideas
//!
//! A CLI tool that runs legal, economic and business-structure agents
//! against a hosted model, stores their outputs per idea in a JSON file,
//! and aggregates them into a comprehensive Markdown report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing credential, bad config, no stored report, etc.)

mod agent;
mod analysis;
mod chat;
mod cli;
mod config;
mod llm;
mod models;
mod pipeline;
mod report;
mod storage;

use analysis::Aggregator;
use anyhow::{Context, Result};
use chat::{ChatSession, EMPTY_QUESTION};
use cli::{Args, ChatArgs, Command, OutputFormat, RunArgs};
use config::{Config, ConfigError, CONFIG_FILE_NAME};
use llm::{ClientSettings, CompletionClient, GenerationParams, GroqClient, RetryPolicy, Retrying};
use models::{AgentKind, IdeaInput, LEGACY_REPORT_KEY};
use pipeline::{Pipeline, PipelineOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage::{JsonFileStore, MemoryStore, RecordStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);
    if let Err(e) = config.validate() {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = init_logging(&args, &config) {
        eprintln!("⚠️  Logging disabled: {:#}", e);
    }

    info!("StartupGPT v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        Some(ref path) => debug!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match dispatch(&args, &config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .startupgpt.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize models, credentials, storage, and more.");
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>), ConfigError> {
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    match Config::load_default()? {
        Some(config) => Ok((config, Some(PathBuf::from(CONFIG_FILE_NAME)))),
        None => Ok((Config::default(), None)),
    }
}

/// Initialize logging from the command line and `[logging]` settings.
///
/// `RUST_LOG` wins over both when set.
fn init_logging(args: &Args, config: &Config) -> Result<()> {
    let level = if args.quiet || args.verbose {
        args.log_level().to_string()
    } else if config.general.verbose {
        tracing::Level::DEBUG.to_string()
    } else {
        config
            .logging
            .level
            .clone()
            .unwrap_or_else(|| args.log_level().to_string())
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_lowercase()))
        .context("Invalid log level")?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    match config.logging.file {
        Some(ref path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
        None => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
    }

    Ok(())
}

/// Run the selected subcommand. Returns the exit code.
async fn dispatch(args: &Args, config: &Config) -> Result<i32> {
    match args.command {
        Some(Command::Run(ref run)) => run_pipeline(run, config, !args.quiet).await,
        Some(Command::Report { ref idea_id }) => {
            let idea_id = idea_id.as_deref().unwrap_or(&config.general.default_idea_id);
            show_report(idea_id, config)
        }
        Some(Command::Aggregate { ref idea_id }) => {
            let idea_id = idea_id.as_deref().unwrap_or(&config.general.default_idea_id);
            aggregate_stored(idea_id, config).await
        }
        Some(Command::Chat(ref chat)) => run_chat(chat, config).await,
        Some(Command::Ideas) => list_ideas(config),
        // Rejected by Args::validate
        None => Ok(1),
    }
}

/// Build the completion client for one agent.
///
/// The credential is resolved here so a missing key fails before any stage runs.
fn build_client(config: &Config, kind: AgentKind) -> Result<Arc<dyn CompletionClient>, ConfigError> {
    let settings = ClientSettings {
        api_url: config.model.api_url.clone(),
        model: config.model_for(kind).to_string(),
        timeout_seconds: config.model.timeout_seconds,
    };
    let client = GroqClient::from_env(settings, config.api_key_env_for(kind))?;
    let policy = RetryPolicy::from_model_config(&config.model);

    Ok(Arc::new(Retrying::new(client, policy)))
}

fn open_store(config: &Config) -> Result<JsonFileStore> {
    let path = &config.general.store_path;
    JsonFileStore::open(path).with_context(|| format!("Failed to open record store {}", path))
}

/// Open the store for commands that only read it.
fn open_store_readonly(config: &Config) -> JsonFileStore {
    JsonFileStore::open_existing(&config.general.store_path)
}

/// Read `--input` (if any) and overlay the explicit flags.
fn load_input(run: &RunArgs) -> Result<IdeaInput> {
    let mut input = match run.input {
        Some(ref path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input file {}", path.display()))?;
            serde_json::from_str::<IdeaInput>(&content).with_context(|| {
                format!(
                    "Input file {} must be a JSON object of string fields",
                    path.display()
                )
            })?
        }
        None => IdeaInput::new(),
    };

    input.merge(run.flag_fields());
    Ok(input)
}

/// Run the full pipeline for one idea.
async fn run_pipeline(run: &RunArgs, config: &Config, show_progress: bool) -> Result<i32> {
    let idea_id = run
        .idea_id
        .clone()
        .unwrap_or_else(|| config.general.default_idea_id.clone());
    let input = load_input(run)?;

    let params = GenerationParams::new(config.model.max_tokens, config.model.temperature);
    let analysts = agent::analysts(|kind| build_client(config, kind), params)
        .context("Failed to initialize agents")?;
    let aggregator = Aggregator::new(
        build_client(config, AgentKind::ComprehensiveReport)
            .context("Failed to initialize the report agent")?,
        params,
    );

    let store: Box<dyn RecordStore> = if run.no_save {
        Box::new(MemoryStore::new())
    } else {
        Box::new(open_store(config)?)
    };

    println!("🚀 Analyzing idea: {}", idea_id);
    println!("   Industry: {}", input.industry());
    println!("   Business model: {}", input.business_model());
    println!("   Model: {}", config.model.name);
    if run.no_save {
        println!("   Storage: in memory (--no-save)");
    } else {
        println!("   Storage: {}", config.general.store_path);
    }
    println!();

    let options = PipelineOptions {
        stage_timeout: Duration::from_secs(config.general.stage_timeout_seconds),
        show_progress,
    };
    let result = Pipeline::new(analysts, aggregator, store.as_ref(), options)
        .run(&idea_id, &input)
        .await;

    println!("\n{}\n", result.report);

    if let Some(ref output) = run.output {
        let content = match run.format {
            OutputFormat::Json => report::generate_json_report(&result)?,
            OutputFormat::Markdown => report::generate_markdown_report(&result),
        };
        report::write_report(&content, output)
            .with_context(|| format!("Failed to write report to {}", output.display()))?;
        println!("📝 Run report saved to: {}", output.display());
    }

    let fallbacks = result.fallback_count();
    if fallbacks > 0 {
        println!(
            "⚠️  {} section(s) used placeholder text; see the log for the failed calls.",
            fallbacks
        );
    }
    println!(
        "✅ Analysis complete in {:.1}s. Stored under idea_id: {}",
        result.metadata.duration_seconds, idea_id
    );

    Ok(0)
}

/// The stored report for an idea, if any.
fn stored_report(store: &dyn RecordStore, idea_id: &str) -> Option<String> {
    let mut record = store.retrieve_outputs(idea_id);

    // Documents written before per-agent keys only have the legacy slot
    record
        .remove(AgentKind::ComprehensiveReport.key())
        .or_else(|| record.remove(LEGACY_REPORT_KEY))
}

/// Text to print for the `report` command, and the exit code.
fn report_output(store: &dyn RecordStore, idea_id: &str) -> (String, i32) {
    match stored_report(store, idea_id) {
        Some(report) => (report, 0),
        None => (format!("No report found for idea_id: {}", idea_id), 1),
    }
}

/// Print the stored comprehensive report for an idea.
fn show_report(idea_id: &str, config: &Config) -> Result<i32> {
    let store = open_store_readonly(config);
    let (text, exit_code) = report_output(&store, idea_id);
    println!("{}", text);
    Ok(exit_code)
}

/// Stored idea ids with the fields each one has.
fn idea_listing(store: &dyn RecordStore) -> Vec<(String, Vec<String>)> {
    store
        .idea_ids()
        .into_iter()
        .map(|id| {
            let fields = store.retrieve_outputs(&id).into_keys().collect();
            (id, fields)
        })
        .collect()
}

/// List stored ideas and the fields each one has.
fn list_ideas(config: &Config) -> Result<i32> {
    let store = open_store_readonly(config);
    let listing = idea_listing(&store);

    if listing.is_empty() {
        println!("No ideas stored in {}", store.path().display());
        return Ok(0);
    }

    println!("📚 Stored ideas ({}):\n", listing.len());
    for (id, fields) in listing {
        println!("   {} ({})", id, fields.join(", "));
    }

    Ok(0)
}

/// Rebuild and store the comprehensive report from the stored analyses.
async fn aggregate_stored(idea_id: &str, config: &Config) -> Result<i32> {
    let store = open_store_readonly(config);
    if store.idea_ids().iter().all(|id| id != idea_id) {
        println!("No analyses stored for idea_id: {}", idea_id);
        return Ok(1);
    }

    let params = GenerationParams::new(config.model.max_tokens, config.model.temperature);
    let aggregator = Aggregator::new(
        build_client(config, AgentKind::ComprehensiveReport)
            .context("Failed to initialize the report agent")?,
        params,
    );

    println!("🧩 Aggregating stored analyses for idea_id: {}", idea_id);
    let report = aggregator.process(&store, idea_id).await;
    store
        .try_store_output(AgentKind::ComprehensiveReport.key(), &report.text, idea_id)
        .context("Failed to store the report")?;

    println!("\n{}\n", report.text);
    if report.is_degraded() {
        println!("⚠️  The report used placeholder text; see the log for the failed calls.");
    }
    Ok(0)
}

/// Interactive question loop on stdin.
async fn run_chat(chat_args: &ChatArgs, config: &Config) -> Result<i32> {
    let settings = ClientSettings {
        api_url: config.model.api_url.clone(),
        model: config.chat.name.clone(),
        timeout_seconds: config.model.timeout_seconds,
    };
    let client = GroqClient::from_env(settings, config.chat_api_key_env())
        .context("Failed to initialize chat client")?;
    let policy = RetryPolicy {
        max_retries: config.chat.retries,
        base_delay_ms: config.model.retry_delay_ms,
        ..RetryPolicy::default()
    };
    let params = GenerationParams::new(config.chat.max_tokens, config.chat.temperature);
    let mut session = ChatSession::new(
        Arc::new(Retrying::new(client, policy)),
        params,
        config.chat.system_prompt.clone(),
    );

    if let Some(ref idea_id) = chat_args.idea_id {
        show_report(idea_id, config)?;
        println!();
    }

    println!("💬 Chatting with {}. Type 'exit' or 'quit' to leave.", config.chat.name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let question = line.trim();

        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        if question.is_empty() {
            println!("{}", EMPTY_QUESTION);
            continue;
        }

        match session.ask(question).await {
            Ok(answer) => println!("\n{}\n", answer),
            Err(e) => println!("❌ {}", e),
        }
    }

    debug!("Chat ended with {} messages in history", session.history().len());
    Ok(0)
}
