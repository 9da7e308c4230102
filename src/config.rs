//! Configuration management for Keygate.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{KeygateError, Result};
use crate::ratelimit::LimiterSettings;

/// Main configuration for the Keygate driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeygateConfig {
    /// Rate limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rate limiter configuration.
///
/// Values are checked when converted into [`LimiterSettings`], not when
/// parsed, so command-line overrides can still fix them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Requests admitted per window, per key
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window duration in milliseconds
    #[serde(default = "default_window_size_ms")]
    pub window_size_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_size_ms: default_window_size_ms(),
        }
    }
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_size_ms() -> u64 {
    1000
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl KeygateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| KeygateError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Validate the limiter section.
    pub fn limiter_settings(&self) -> Result<LimiterSettings> {
        LimiterSettings::new(self.limiter.max_requests, self.limiter.window_size_ms)
    }
}
