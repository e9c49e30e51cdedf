//! Configuration management for Chatdeck
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ChatdeckError, Result};
use crate::streaming::ChunkPolicy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for Chatdeck
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote completion service settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Simulated streaming settings
    #[serde(default)]
    pub streaming: StreamingConfig,
    /// Local persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Attachment settings
    #[serde(default)]
    pub attachments: AttachmentConfig,
}

/// Remote completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the text completion endpoint
    #[serde(default = "default_completion_path")]
    pub completion_path: String,

    /// Path of the image generation endpoint
    #[serde(default = "default_image_path")]
    pub image_path: String,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_completion_path() -> String {
    "/ai_response".to_string()
}

fn default_image_path() -> String {
    "/generate_image".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            completion_path: default_completion_path(),
            image_path: default_image_path(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Simulated streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Responses longer than this many characters are revealed word by word
    #[serde(default = "default_word_threshold")]
    pub word_threshold: usize,

    /// Pause after each revealed word (milliseconds)
    #[serde(default = "default_word_delay")]
    pub word_delay_ms: u64,

    /// Pause after each revealed character (milliseconds)
    #[serde(default = "default_char_delay")]
    pub char_delay_ms: u64,
}

fn default_word_threshold() -> usize {
    200
}

fn default_word_delay() -> u64 {
    30
}

fn default_char_delay() -> u64 {
    15
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            word_threshold: default_word_threshold(),
            word_delay_ms: default_word_delay(),
            char_delay_ms: default_char_delay(),
        }
    }
}

impl StreamingConfig {
    /// Chunking policy for the streaming simulator
    pub fn policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            word_threshold: self.word_threshold,
            word_delay: Duration::from_millis(self.word_delay_ms),
            char_delay: Duration::from_millis(self.char_delay_ms),
        }
    }
}

/// Local persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database location; defaults to the platform data directory
    #[serde(default)]
    pub path: Option<String>,

    /// Keep sessions in memory only
    #[serde(default)]
    pub ephemeral: bool,
}

impl StorageConfig {
    /// Resolve the database path
    ///
    /// # Errors
    ///
    /// Returns `ChatdeckError::Storage` if no data directory can be determined
    pub fn resolve_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(PathBuf::from(path));
        }

        let proj_dirs = ProjectDirs::from("com", "chatdeck", "chatdeck").ok_or_else(|| {
            ChatdeckError::Storage("Could not determine data directory".to_string())
        })?;
        Ok(proj_dirs.data_dir().join("sessions.sled"))
    }
}

/// Attachment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    /// Largest file accepted for extraction (bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
        }
    }
}

/// Upper bound accepted for either pacing delay
const MAX_DELAY_MS: u64 = 5_000;

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatdeckError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| ChatdeckError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("CHATDECK_API_URL") {
            self.api.base_url = url;
        }

        if let Ok(timeout) = std::env::var("CHATDECK_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid CHATDECK_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(path) = std::env::var("CHATDECK_STORAGE_PATH") {
            self.storage.path = Some(path);
        }

        if let Ok(delay) = std::env::var("CHATDECK_WORD_DELAY_MS") {
            if let Ok(value) = delay.parse() {
                self.streaming.word_delay_ms = value;
            } else {
                tracing::warn!("Invalid CHATDECK_WORD_DELAY_MS: {}", delay);
            }
        }

        if let Ok(delay) = std::env::var("CHATDECK_CHAR_DELAY_MS") {
            if let Ok(value) = delay.parse() {
                self.streaming.char_delay_ms = value;
            } else {
                tracing::warn!("Invalid CHATDECK_CHAR_DELAY_MS: {}", delay);
            }
        }

        if let Ok(limit) = std::env::var("CHATDECK_MAX_ATTACHMENT_BYTES") {
            if let Ok(value) = limit.parse() {
                self.attachments.max_file_size_bytes = value;
            } else {
                tracing::warn!("Invalid CHATDECK_MAX_ATTACHMENT_BYTES: {}", limit);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(url) = &cli.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }
        if cli.ephemeral {
            self.storage.ephemeral = true;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(ChatdeckError::Config("api.base_url cannot be empty".to_string()).into());
        }

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ChatdeckError::Config(format!(
                "api.base_url must start with http:// or https://, got {}",
                base_url
            ))
            .into());
        }

        if self.api.timeout_seconds == 0 {
            return Err(ChatdeckError::Config(
                "api.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.streaming.word_threshold == 0 {
            return Err(ChatdeckError::Config(
                "streaming.word_threshold must be greater than 0".to_string(),
            )
            .into());
        }

        if self.streaming.word_delay_ms > MAX_DELAY_MS || self.streaming.char_delay_ms > MAX_DELAY_MS
        {
            return Err(ChatdeckError::Config(format!(
                "streaming delays must be at most {} ms",
                MAX_DELAY_MS
            ))
            .into());
        }

        if self.attachments.max_file_size_bytes == 0 {
            return Err(ChatdeckError::Config(
                "attachments.max_file_size_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
