//! Configuration loading, validation, and management for Colloquy.
//!
//! Loads configuration from `~/.colloquy/config.toml` with environment
//! variable overrides. Validates all settings at startup. Every numeric
//! threshold the memory and adjudication pipelines use lives here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.colloquy/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model for new nodes
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Provider endpoint configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Memory compression and fact-store tuning
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Adjudication tuning
    #[serde(default)]
    pub adjudication: AdjudicationConfig,

    /// Pipeline worker tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("default_model", &self.default_model)
            .field("provider", &self.provider)
            .field("memory", &self.memory)
            .field("adjudication", &self.adjudication)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

/// Provider endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// HTTP client timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_http_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Tuning for memory compression and the long-term fact store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Folded turns before compression triggers
    #[serde(default = "default_working_memory_limit")]
    pub working_memory_limit: u64,

    /// Estimated-token budget for working memory (chars / 4)
    #[serde(default = "default_max_token_estimate")]
    pub max_token_estimate: usize,

    /// Cosine similarity at or above which a candidate fact merges into
    /// an existing one
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Facts below this confidence are pruned and never resurface
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Facts below this confidence are kept but not shown in context
    #[serde(default = "default_min_display_confidence")]
    pub min_display_confidence: f64,

    /// Hard cap on the fact set, applied after confidence sort
    #[serde(default = "default_max_facts")]
    pub max_facts: usize,

    /// How many top-confidence facts to include in assembled context
    #[serde(default = "default_context_fact_limit")]
    pub context_fact_limit: usize,

    /// Weekly multiplicative confidence decay rate
    #[serde(default = "default_weekly_decay")]
    pub weekly_decay: f64,
}

fn default_working_memory_limit() -> u64 {
    20
}
fn default_max_token_estimate() -> usize {
    4000
}
fn default_similarity_threshold() -> f64 {
    0.75
}
fn default_min_confidence() -> f64 {
    0.2
}
fn default_min_display_confidence() -> f64 {
    0.3
}
fn default_max_facts() -> usize {
    50
}
fn default_context_fact_limit() -> usize {
    10
}
fn default_weekly_decay() -> f64 {
    0.95
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            working_memory_limit: default_working_memory_limit(),
            max_token_estimate: default_max_token_estimate(),
            similarity_threshold: default_similarity_threshold(),
            min_confidence: default_min_confidence(),
            min_display_confidence: default_min_display_confidence(),
            max_facts: default_max_facts(),
            context_fact_limit: default_context_fact_limit(),
            weekly_decay: default_weekly_decay(),
        }
    }
}

/// Tuning for the adjudication engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjudicationConfig {
    /// Provider call timeout in seconds. A timed-out call resolves to the
    /// same conservative fallback verdict as a parse failure.
    #[serde(default = "default_adjudication_timeout")]
    pub timeout_secs: u64,

    /// How many top-confidence facts to show the adjudicator
    #[serde(default = "default_adjudication_fact_limit")]
    pub fact_limit: usize,
}

fn default_adjudication_timeout() -> u64 {
    30
}
fn default_adjudication_fact_limit() -> usize {
    10
}

impl Default for AdjudicationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_adjudication_timeout(),
            fact_limit: default_adjudication_fact_limit(),
        }
    }
}

/// Tuning for the pipeline worker loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Long-poll wait per receive, in seconds
    #[serde(default = "default_poll_wait")]
    pub poll_wait_secs: u64,

    /// Generate an assistant reply for accepted messages and fold it into
    /// working memory alongside the user turn
    #[serde(default = "default_true")]
    pub generate_replies: bool,
}

fn default_poll_wait() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_wait_secs: default_poll_wait(),
            generate_replies: default_true(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.colloquy/config.toml).
    ///
    /// Also checks environment variables:
    /// - `COLLOQUY_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `COLLOQUY_MODEL` overrides `default_model`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("COLLOQUY_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("COLLOQUY_MODEL") {
            config.default_model = model;
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
        dirs_home().join(".colloquy")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, value: f64| {
            if !(0.0..=1.0).contains(&value) {
                Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 1.0, got {value}"
                )))
            } else {
                Ok(())
            }
        };

        unit("memory.similarity_threshold", self.memory.similarity_threshold)?;
        unit("memory.min_confidence", self.memory.min_confidence)?;
        unit(
            "memory.min_display_confidence",
            self.memory.min_display_confidence,
        )?;
        unit("memory.weekly_decay", self.memory.weekly_decay)?;

        if self.memory.max_facts == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_facts must be at least 1".into(),
            ));
        }

        if self.memory.working_memory_limit == 0 {
            return Err(ConfigError::ValidationError(
                "memory.working_memory_limit must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            provider: ProviderConfig::default(),
            memory: MemoryConfig::default(),
            adjudication: AdjudicationConfig::default(),
            pipeline: PipelineConfig::default(),
        }
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
