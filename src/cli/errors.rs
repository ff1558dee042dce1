//! CLI error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::datastore::DataStoreError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("datastore at {0} is not initialized; run 'chronostamp init' first")]
    NotInitialized(String),

    #[error("failed to start runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("output failed: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    DataStore(#[from] DataStoreError),
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            CliError::NotInitialized(_) => "CHRONO_CLI_NOT_INITIALIZED",
            CliError::Runtime(_) => "CHRONO_CLI_RUNTIME_FAILED",
            CliError::Io(_) => "CHRONO_CLI_IO_ERROR",
            CliError::Json(_) => "CHRONO_CLI_JSON_ERROR",
            CliError::Config(e) => e.code(),
            CliError::DataStore(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            CliError::NotInitialized("/tmp/x".into()).code(),
            "CHRONO_CLI_NOT_INITIALIZED"
        );
        let io = CliError::from(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        assert_eq!(io.code(), "CHRONO_CLI_IO_ERROR");
    }
}
