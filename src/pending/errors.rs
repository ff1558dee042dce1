//! Pending bookkeeping errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::errors::Severity;

/// Result type for pending bookkeeping operations
pub type PendingResult<T> = Result<T, PendingError>;

#[derive(Debug, Error)]
pub enum PendingError {
    /// The bucket owner task has stopped
    #[error("Pending bucket owner is not running")]
    OwnerStopped,

    /// commit-manager.data could not be written
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// commit-manager.data could not be read or is malformed
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PendingError {
    pub fn code(&self) -> &'static str {
        match self {
            PendingError::OwnerStopped => "CHRONO_PENDING_OWNER_STOPPED",
            PendingError::WriteFailed { .. } => "CHRONO_PENDING_WRITE_FAILED",
            PendingError::ReadFailed { .. } => "CHRONO_PENDING_READ_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PendingError::OwnerStopped | PendingError::WriteFailed { .. } => Severity::Error,
            PendingError::ReadFailed { .. } => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
