//! Changeset log errors
//!
//! Corrupt framing found while replaying is fatal: the segment cannot be
//! trusted and nothing past the bad frame is applied.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::collaborators::StoreError;
use crate::errors::Severity;
use crate::write::WriteError;

/// Result type for changeset operations
pub type ChangesetResult<T> = Result<T, ChangesetError>;

#[derive(Debug, Error)]
pub enum ChangesetError {
    /// A segment or tracking file could not be written
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A segment or tracking file could not be read
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Bad checksum, truncated frame or malformed body
    #[error("Corrupt changeset {path} at offset {offset}: {reason}")]
    Corruption {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    /// The writer thread has stopped
    #[error("Changeset writer is not running")]
    WriterStopped,

    #[error("Changeset storage failure: {0}")]
    Store(#[from] StoreError),

    /// A replayed chronology could not be imported
    #[error("Changeset import failed: {0}")]
    Import(#[from] WriteError),
}

impl ChangesetError {
    pub fn corruption(path: impl Into<PathBuf>, offset: u64, reason: impl Into<String>) -> Self {
        ChangesetError::Corruption {
            path: path.into(),
            offset,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ChangesetError::WriteFailed { .. } => "CHRONO_CHANGESET_WRITE_FAILED",
            ChangesetError::ReadFailed { .. } => "CHRONO_CHANGESET_READ_FAILED",
            ChangesetError::Corruption { .. } => "CHRONO_CHANGESET_CORRUPTION",
            ChangesetError::WriterStopped => "CHRONO_CHANGESET_WRITER_STOPPED",
            ChangesetError::Store(_) => "CHRONO_CHANGESET_STORAGE_FAILED",
            ChangesetError::Import(_) => "CHRONO_CHANGESET_IMPORT_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ChangesetError::Corruption { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
