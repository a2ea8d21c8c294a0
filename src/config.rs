//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.startupgpt.toml` files.

use crate::models::AgentKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".startupgpt.toml";

/// Errors raised while setting the application up.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} not set")]
    MissingCredential(String),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Read a bearer credential from the environment.
pub fn resolve_credential(var: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingCredential(var.to_string())),
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Completion model used by the agents.
    #[serde(default)]
    pub model: ModelConfig,

    /// Conversational model used by the chat command.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-agent overrides.
    #[serde(default)]
    pub agents: AgentsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Path of the JSON record store.
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Idea identifier used when none is given on the command line.
    #[serde(default = "default_idea_id")]
    pub default_idea_id: String,

    /// Upper bound on one pipeline stage, in seconds.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: u64,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            default_idea_id: default_idea_id(),
            stage_timeout_seconds: default_stage_timeout(),
            verbose: false,
        }
    }
}

fn default_store_path() -> String {
    "storage/data.json".to_string()
}

fn default_idea_id() -> String {
    "idea_007".to_string()
}

fn default_stage_timeout() -> u64 {
    900
}

/// Completion model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name sent with each request.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries after a transient failure.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay before a retry, in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_model() -> String {
    "llama3-8b-8192".to_string()
}

fn default_api_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay() -> u64 {
    500
}

/// Chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub name: String,

    /// Falls back to `[model] api_key_env` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_chat_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_chat_retries")]
    pub retries: u32,

    /// System prompt that opens every chat session.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            name: default_chat_model(),
            api_key_env: None,
            temperature: 0.0,
            max_tokens: default_chat_max_tokens(),
            retries: default_chat_retries(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_chat_model() -> String {
    "mixtral-8x7b-32768".to_string()
}

fn default_chat_max_tokens() -> u32 {
    1024
}

fn default_chat_retries() -> u32 {
    2
}

fn default_system_prompt() -> String {
    "You are a helpful assistant answering questions about startup ideas. \
     Be concise and say so when you are unsure."
        .to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of error, warn, info, debug, trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Write logs to this file instead of stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Per-agent settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub legal: AgentOverrides,
    #[serde(default)]
    pub economics: AgentOverrides,
    #[serde(default)]
    pub business_structure: AgentOverrides,
    #[serde(default)]
    pub generalized: AgentOverrides,
}

/// Overrides for one agent. Unset fields inherit from `[model]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AgentsConfig {
    pub fn for_agent(&self, kind: AgentKind) -> &AgentOverrides {
        match kind {
            AgentKind::Legal => &self.legal,
            AgentKind::Economics => &self.economics,
            AgentKind::BusinessStructure => &self.business_structure,
            AgentKind::ComprehensiveReport => &self.generalized,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Environment variable holding the credential for an agent.
    pub fn api_key_env_for(&self, kind: AgentKind) -> &str {
        self.agents
            .for_agent(kind)
            .api_key_env
            .as_deref()
            .unwrap_or(&self.model.api_key_env)
    }

    /// Model name used by an agent.
    pub fn model_for(&self, kind: AgentKind) -> &str {
        self.agents
            .for_agent(kind)
            .model
            .as_deref()
            .unwrap_or(&self.model.name)
    }

    pub fn chat_api_key_env(&self) -> &str {
        self.chat
            .api_key_env
            .as_deref()
            .unwrap_or(&self.model.api_key_env)
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref store) = args.store {
            self.general.store_path = store.display().to_string();
        }

        if args.verbose {
            self.general.verbose = true;
        }

        match args.command {
            Some(crate::cli::Command::Run(ref run)) => {
                if let Some(ref model) = run.model {
                    self.model.name = model.clone();
                }
                if let Some(temperature) = run.temperature {
                    self.model.temperature = temperature;
                }
                if let Some(timeout) = run.timeout {
                    self.model.timeout_seconds = timeout;
                }
                if let Some(retries) = run.retries {
                    self.model.retries = retries;
                }
            }
            Some(crate::cli::Command::Chat(ref chat)) => {
                if let Some(ref model) = chat.model {
                    self.chat.name = model.clone();
                }
            }
            _ => {}
        }
    }

    /// Check the value ranges serde cannot express.
    ///
    /// Run after `merge_with_args`, so flag values are checked too.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_temperature("model.temperature", self.model.temperature)?;
        check_temperature("chat.temperature", self.chat.temperature)?;
        check_positive("model.max_tokens", u64::from(self.model.max_tokens))?;
        check_positive("chat.max_tokens", u64::from(self.chat.max_tokens))?;
        check_positive("model.timeout_seconds", self.model.timeout_seconds)?;
        check_positive(
            "general.stage_timeout_seconds",
            self.general.stage_timeout_seconds,
        )?;

        if self.general.store_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "general.store_path must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn check_temperature(field: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be between 0.0 and 1.0, got {}",
            field, value
        )))
    }
}

fn check_positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{} must be positive", field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3-8b-8192");
        assert_eq!(config.model.max_tokens, 500);
        assert_eq!(config.model.temperature, 0.7);
        assert_eq!(config.general.store_path, "storage/data.json");
        assert_eq!(config.chat.name, "mixtral-8x7b-32768");
        assert_eq!(config.chat.temperature, 0.0);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
store_path = "data/ideas.json"
verbose = true

[model]
name = "llama-3.1-70b"
temperature = 0.2

[logging]
level = "debug"

[agents.legal]
api_key_env = "LEGAL_AGENT_API_KEY"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.store_path, "data/ideas.json");
        assert!(config.general.verbose);
        assert_eq!(config.model.name, "llama-3.1-70b");
        assert_eq!(config.model.temperature, 0.2);
        // Unspecified fields keep their defaults
        assert_eq!(config.model.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(
            config.agents.legal.api_key_env.as_deref(),
            Some("LEGAL_AGENT_API_KEY")
        );
    }

    #[test]
    fn test_agent_overrides_fall_back_to_model() {
        let mut config = Config::default();
        config.agents.economics.api_key_env = Some("ECONOMICS_AGENT_API_KEY".to_string());
        config.agents.generalized.model = Some("llama-3.1-70b".to_string());

        assert_eq!(
            config.api_key_env_for(AgentKind::Economics),
            "ECONOMICS_AGENT_API_KEY"
        );
        assert_eq!(config.api_key_env_for(AgentKind::Legal), "GROQ_API_KEY");
        assert_eq!(
            config.model_for(AgentKind::ComprehensiveReport),
            "llama-3.1-70b"
        );
        assert_eq!(config.model_for(AgentKind::Legal), "llama3-8b-8192");
        assert_eq!(config.chat_api_key_env(), "GROQ_API_KEY");
    }

    #[test]
    fn test_missing_credential() {
        let err = resolve_credential("STARTUPGPT_TEST_DEFINITELY_UNSET").unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(ref v) if v == "STARTUPGPT_TEST_DEFINITELY_UNSET"));
        assert_eq!(
            err.to_string(),
            "environment variable STARTUPGPT_TEST_DEFINITELY_UNSET not set"
        );
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[model\nname = ").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            Config::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[chat]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.model.name, "llama3-8b-8192");
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
        let reparsed: Config = toml::from_str(&Config::default_toml()).unwrap();
        assert!(reparsed.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let cases = [
            ("[model]\ntemperature = 1.5\n", "model.temperature"),
            ("[model]\ntemperature = -0.1\n", "model.temperature"),
            ("[chat]\ntemperature = 2.0\n", "chat.temperature"),
            ("[model]\nmax_tokens = 0\n", "model.max_tokens"),
            ("[chat]\nmax_tokens = 0\n", "chat.max_tokens"),
            ("[model]\ntimeout_seconds = 0\n", "model.timeout_seconds"),
            (
                "[general]\nstage_timeout_seconds = 0\n",
                "general.stage_timeout_seconds",
            ),
            ("[general]\nstore_path = \"  \"\n", "general.store_path"),
        ];

        for (content, field) in cases {
            let config: Config = toml::from_str(content).unwrap();
            match config.validate() {
                Err(ConfigError::Invalid(message)) => {
                    assert!(message.contains(field), "{}: {}", field, message)
                }
                other => panic!("{} should be rejected, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_validate_checks_merged_flags() {
        use crate::cli::Args;
        use clap::Parser;

        let mut config = Config::default();
        let args = Args::try_parse_from(["startupgpt", "run", "--temperature", "0.3"]).unwrap();
        config.merge_with_args(&args);
        assert_eq!(config.model.temperature, 0.3);
        assert!(config.validate().is_ok());
    }
}
