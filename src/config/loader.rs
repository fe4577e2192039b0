//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{LoggingConfig, ParseValueError};

/// Selects the minimum severity (`info`, `debug`, ...).
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
/// Selects the record format (`json` or `plain`).
pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";
/// Selects the output stream (`stdout` or `stderr`).
pub const LOG_STREAM_VAR: &str = "LOG_STREAM";
/// Extra per-target filter directives.
pub const RUST_LOG_VAR: &str = "RUST_LOG";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {var}: {source}")]
    Env {
        var: &'static str,
        #[source]
        source: ParseValueError,
    },
}

impl LoggingConfig {
    /// Defaults overridden by `LOG_LEVEL`, `LOG_FORMAT`, `LOG_STREAM` and `RUST_LOG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    ///
    /// Unset and empty variables leave the current value alone.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(LOG_LEVEL_VAR) {
            self.level = value.parse().map_err(|source| ConfigError::Env {
                var: LOG_LEVEL_VAR,
                source,
            })?;
        }
        if let Some(value) = get(LOG_FORMAT_VAR) {
            self.format = value.parse().map_err(|source| ConfigError::Env {
                var: LOG_FORMAT_VAR,
                source,
            })?;
        }
        if let Some(value) = get(LOG_STREAM_VAR) {
            self.stream = value.parse().map_err(|source| ConfigError::Env {
                var: LOG_STREAM_VAR,
                source,
            })?;
        }
        if let Some(value) = get(RUST_LOG_VAR) {
            self.filter = Some(value);
        }

        Ok(self)
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LoggingConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: LoggingConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration from an optional file, then apply environment overrides.
pub fn load(path: Option<&Path>) -> Result<LoggingConfig, ConfigError> {
    let base = match path {
        Some(path) => load_config(path)?,
        None => LoggingConfig::default(),
    };
    base.with_env_overrides(|key| std::env::var(key).ok())
}
