//! File and environment configuration.
//!
//! Everything has a sensible default; a TOML file and `SAGASU_`-prefixed
//! environment variables can override the catalog endpoint, the upload
//! API timeout and the retry policy. The subcommand flags (range,
//! parallelism, directories) stay on the command line.

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogConfig;
use crate::retry::{BackoffPolicy, Jitter, RetryPolicy};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    /// Failed to parse config.
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub upload: UploadApiConfig,
}

/// Upload API settings that do not come from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadApiConfig {
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

fn default_upload_timeout() -> u64 {
    30
}

impl Default for UploadApiConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_upload_timeout(),
        }
    }
}

/// Retry policy as it appears in the config file.
///
/// The defaults reproduce the historical behavior: retry forever with no
/// delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts before giving up on an id. `0` retries forever.
    #[serde(default)]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds. `0` retries
    /// immediately and disables backoff entirely.
    #[serde(default)]
    pub first_delay_ms: u64,

    /// Cap for the computed delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Multiplicative delay growth per attempt.
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Delay randomization.
    #[serde(default)]
    pub jitter: Jitter,
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_factor() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            first_delay_ms: 0,
            max_delay_ms: default_max_delay_ms(),
            factor: default_factor(),
            jitter: Jitter::None,
        }
    }
}

impl RetryConfig {
    /// Builds the runtime policy this configuration describes.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
            backoff: (self.first_delay_ms > 0).then(|| BackoffPolicy {
                first: Duration::from_millis(self.first_delay_ms),
                max: Duration::from_millis(self.max_delay_ms),
                factor: self.factor,
                jitter: self.jitter,
            }),
        }
    }
}

/// Loads configuration from a file with environment variable overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("SAGASU_").split("_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Loads configuration from a TOML string (useful for testing).
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
