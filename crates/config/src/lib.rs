//! Configuration loading and validation for Tiller.
//!
//! Loads configuration from `~/.tiller/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tiller/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model endpoint settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool security settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Conversation storage settings
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model name sent to the endpoint
    #[serde(default = "default_model")]
    pub name: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Whether the endpoint supports native tool calling
    #[serde(default = "default_true")]
    pub native_tools: bool,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum reasoning iterations per message
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Fraction of the context window that triggers auto-truncation
    #[serde(default = "default_budget_threshold")]
    pub budget_threshold: f64,

    /// Whether skill matching is enabled
    #[serde(default = "default_true")]
    pub skills_enabled: bool,

    /// System prompt override (defaults to a built-in coding prompt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> usize {
    20
}
fn default_budget_threshold() -> f64 {
    0.85
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            budget_threshold: default_budget_threshold(),
            skills_enabled: true,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Shell commands the shell tool may run. Empty = allow all.
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,

    /// Extra paths the file tools must never touch
    #[serde(default)]
    pub forbidden_paths: Vec<String>,
}

fn default_allowed_commands() -> Vec<String> {
    [
        "ls", "dir", "cat", "type", "head", "tail", "echo", "pwd", "date", "wc", "grep",
        "findstr", "find", "which", "where", "git", "cargo", "node", "npm", "python",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            allowed_commands: default_allowed_commands(),
            forbidden_paths: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding conversation JSON files
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

fn default_store_dir() -> PathBuf {
    AppConfig::config_dir().join("conversations")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("store", &self.store)
            .finish()
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("name", &self.name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("native_tools", &self.native_tools)
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            name: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            native_tools: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tiller/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `TILLER_API_KEY` (falls back to `OPENAI_API_KEY`)
    /// - `TILLER_API_URL`
    /// - `TILLER_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(key) = std::env::var("TILLER_API_KEY") {
            config.model.api_key = Some(key);
        } else if config.model.api_key.is_none() {
            config.model.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        if let Ok(url) = std::env::var("TILLER_API_URL") {
            config.model.api_url = url;
        }

        if let Ok(model) = std::env::var("TILLER_MODEL") {
            config.model.name = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tiller")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.agent.budget_threshold) {
            return Err(ConfigError::ValidationError(
                "agent.budget_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
