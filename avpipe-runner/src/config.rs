//! Runtime settings.
//!
//! Sources, lowest to highest precedence: built-in defaults, an optional TOML
//! file, `.env` plus the process environment. Command-line flags are applied
//! on top by the binary.

use avpipe_core::data::{OutputSize, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_API_KEY: &str = "ALPHAVANTAGE_API_KEY";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_RETRY_ATTEMPTS: &str = "API_RETRY_ATTEMPTS";
pub const ENV_RETRY_BACKOFF: &str = "API_RETRY_BACKOFF";
pub const ENV_RETRY_ERROR_MESSAGES: &str = "API_RETRY_ERROR_MESSAGES";

pub const DEFAULT_DATABASE_URL: &str = "alphavantage.db";

/// Symbols loaded when none are given.
pub const DEFAULT_TICKERS: [&str; 10] = [
    "AAPL", "MSFT", "TSLA", "NVDA", "GOOG", "AMZN", "META", "JPM", "NFLX", "AMD",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("ALPHAVANTAGE_API_KEY is not set")]
    MissingApiKey,

    #[error("retry_attempts must be at least 1")]
    ZeroAttempts,

    #[error("retry_backoff_secs must be a non-negative number, got {0}")]
    InvalidBackoff(f64),
}

/// Pipeline settings, passed explicitly to the client and orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub database_url: String,
    pub retry_attempts: u32,
    pub retry_backoff_secs: f64,
    /// Retry responses carrying `"Error Message"`. Off by default since these
    /// usually mean an unknown symbol.
    pub retry_error_messages: bool,
    pub output_size: OutputSize,
    pub tickers: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            retry_attempts: 3,
            retry_backoff_secs: 1.5,
            retry_error_messages: false,
            output_size: OutputSize::Compact,
            tickers: DEFAULT_TICKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Defaults, then the optional TOML file, then `.env` and the environment.
    ///
    /// Does not validate; call [`Settings::validate`] once CLI overrides are in.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        // A missing .env file is normal.
        let _ = dotenv::dotenv();
        settings.apply_env(|var| std::env::var(var).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay environment values. Unset and empty variables are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(url) = get(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Some(raw) = get(ENV_RETRY_ATTEMPTS) {
            self.retry_attempts = raw.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidEnv {
                    var: ENV_RETRY_ATTEMPTS,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(raw) = get(ENV_RETRY_BACKOFF) {
            self.retry_backoff_secs = raw.parse().map_err(|e: std::num::ParseFloatError| {
                ConfigError::InvalidEnv {
                    var: ENV_RETRY_BACKOFF,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(raw) = get(ENV_RETRY_ERROR_MESSAGES) {
            self.retry_error_messages = parse_flag(&raw).ok_or_else(|| ConfigError::InvalidEnv {
                var: ENV_RETRY_ERROR_MESSAGES,
                value: raw.clone(),
                reason: "expected true/false".to_string(),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !self.retry_backoff_secs.is_finite() || self.retry_backoff_secs < 0.0 {
            return Err(ConfigError::InvalidBackoff(self.retry_backoff_secs));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            backoff: Duration::try_from_secs_f64(self.retry_backoff_secs).unwrap_or(Duration::ZERO),
            retry_error_messages: self.retry_error_messages,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
