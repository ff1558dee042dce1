//! Stamp error types
//!
//! Interning, alias and comment operations never fail. Only loading and
//! flushing the side tables touches the filesystem.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::errors::Severity;

/// Result type for stamp persistence
pub type StampResult<T> = Result<T, StampError>;

#[derive(Debug, Error)]
pub enum StampError {
    /// Side table could not be written
    #[error("Failed to write stamp table {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Side table could not be read or is malformed
    #[error("Failed to read stamp table {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StampError {
    pub fn code(&self) -> &'static str {
        match self {
            StampError::WriteFailed { .. } => "CHRONO_STAMP_WRITE_FAILED",
            StampError::ReadFailed { .. } => "CHRONO_STAMP_READ_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StampError::WriteFailed { .. } => Severity::Error,
            // A table we cannot read means aliases and comments are lost.
            StampError::ReadFailed { .. } => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
