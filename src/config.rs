//! Configuration management for coursetimers
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Later sources win: file, then environment, then command line.

use crate::error::{CourseTimersError, Result};
use crate::gateway::http::HttpGatewayConfig;
use crate::runtime::RuntimeSettings;
use crate::storage::local::DEFAULT_NAMESPACE;
use crate::storage::SledStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted username, in characters
pub const MAX_USERNAME_LEN: usize = 32;

/// Main configuration structure for coursetimers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Session service settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Timer runtime cadence and time zone
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Local state location
    #[serde(default)]
    pub storage: StorageConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Username to act as; overrides the one stored by `login`
    #[serde(default)]
    pub username: Option<String>,
}

/// Session service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL that endpoint paths are joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Timer runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// How often the running clock is recomputed (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How often the server's active session is polled (seconds)
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,

    /// IANA time zone reported with start requests
    ///
    /// Falls back to the `TZ` environment variable, then `UTC`.
    #[serde(default)]
    pub time_zone: Option<String>,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_refresh_interval_seconds() -> u64 {
    15
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            refresh_interval_seconds: default_refresh_interval_seconds(),
            time_zone: None,
        }
    }
}

/// Local state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the state database; platform data dir when unset
    #[serde(default)]
    pub path: Option<String>,

    /// Prefix of every stored key
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            namespace: default_namespace(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON instead of human-readable lines
    #[serde(default)]
    pub json_format: bool,

    /// Also append log lines to this file
    #[serde(default)]
    pub file_path: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CourseTimersError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| CourseTimersError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("COURSETIMERS_API_URL") {
            self.api.base_url = url;
        }

        if let Ok(username) = std::env::var("COURSETIMERS_USERNAME") {
            self.username = Some(username);
        }

        if let Ok(path) = std::env::var("COURSETIMERS_STATE_PATH") {
            self.storage.path = Some(path);
        }

        if let Ok(tz) = std::env::var("COURSETIMERS_TZ") {
            self.runtime.time_zone = Some(tz);
        }

        if let Ok(timeout) = std::env::var("COURSETIMERS_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid COURSETIMERS_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(url) = &cli.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(username) = &cli.username {
            self.username = Some(username.clone());
        }
        if let Some(path) = &cli.state_path {
            self.storage.path = Some(path.clone());
        }
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(CourseTimersError::Config("api.base_url cannot be empty".to_string()).into());
        }

        if self.api.timeout_seconds == 0 {
            return Err(CourseTimersError::Config(
                "api.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.runtime.tick_interval_ms == 0 {
            return Err(CourseTimersError::Config(
                "runtime.tick_interval_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.runtime.refresh_interval_seconds == 0 {
            return Err(CourseTimersError::Config(
                "runtime.refresh_interval_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.namespace.trim().is_empty() {
            return Err(
                CourseTimersError::Config("storage.namespace cannot be empty".to_string()).into(),
            );
        }

        if let Some(username) = &self.username {
            validate_username(username)?;
        }

        Ok(())
    }

    /// Time zone sent with start requests: configured, `TZ`, or `UTC`
    pub fn time_zone(&self) -> String {
        self.runtime
            .time_zone
            .clone()
            .or_else(|| std::env::var("TZ").ok())
            .map(|tz| tz.trim().to_string())
            .filter(|tz| !tz.is_empty())
            .unwrap_or_else(|| "UTC".to_string())
    }

    /// Settings for a [`crate::runtime::TimerRuntime`]
    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            time_zone: self.time_zone(),
            tick_interval: Duration::from_millis(self.runtime.tick_interval_ms),
            refresh_interval: Duration::from_secs(self.runtime.refresh_interval_seconds),
        }
    }

    /// Settings for the HTTP gateway acting as `username`
    pub fn gateway_config(&self, username: Option<String>) -> HttpGatewayConfig {
        HttpGatewayConfig {
            base_url: self.api.base_url.clone(),
            username,
            timeout_secs: self.api.timeout_seconds,
        }
    }

    /// Directory of the state database
    ///
    /// # Errors
    ///
    /// Returns error if no path is configured and the platform data
    /// directory cannot be determined
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(SledStore::default_path()?),
        }
    }
}

/// Trim `raw` and check it is an acceptable username
///
/// # Errors
///
/// Returns [`CourseTimersError::InvalidUsername`] when the trimmed name is
/// empty or longer than [`MAX_USERNAME_LEN`] characters.
pub fn validate_username(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(CourseTimersError::InvalidUsername("username cannot be empty".to_string()).into());
    }
    if name.chars().count() > MAX_USERNAME_LEN {
        return Err(CourseTimersError::InvalidUsername(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LEN
        ))
        .into());
    }
    Ok(name.to_string())
}
