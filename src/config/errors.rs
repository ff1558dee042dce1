//! Configuration errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::errors::Severity;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A field holds a value outside its allowed range
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::ReadFailed { .. } => "CHRONO_CONFIG_READ_FAILED",
            ConfigError::InvalidJson { .. } => "CHRONO_CONFIG_INVALID_JSON",
            ConfigError::InvalidValue { .. } => "CHRONO_CONFIG_INVALID_VALUE",
        }
    }

    /// A datastore cannot start without a valid configuration.
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }

    pub fn is_fatal(&self) -> bool {
        true
    }
}
