//! Datastore lifecycle errors
//!
//! An id mismatch between the datastore and a collaborator is fatal: the
//! collaborator belongs to another datastore and writing through it would
//! corrupt both.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::changeset::ChangesetError;
use crate::commit::CommitError;
use crate::config::ConfigError;
use crate::errors::Severity;
use crate::pending::PendingError;
use crate::stamp::StampError;

/// Result type for datastore lifecycle operations
pub type DataStoreResult<T> = Result<T, DataStoreError>;

#[derive(Debug, Error)]
pub enum DataStoreError {
    /// Layout directory or id file could not be created or read
    #[error("Datastore layout failure at {path}: {source}")]
    Layout {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid datastore id in {path}: {value:?}")]
    InvalidId { path: PathBuf, value: String },

    #[error("Datastore id mismatch: {collaborator} reports {found}, datastore is {expected}")]
    IdMismatch {
        collaborator: &'static str,
        expected: Uuid,
        found: Uuid,
    },

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Pending(#[from] PendingError),

    #[error("{0}")]
    Stamps(#[from] StampError),

    #[error("{0}")]
    Commit(#[from] CommitError),

    #[error("{0}")]
    Changeset(#[from] ChangesetError),
}

impl DataStoreError {
    pub fn code(&self) -> &'static str {
        match self {
            DataStoreError::Layout { .. } => "CHRONO_DATASTORE_LAYOUT_FAILED",
            DataStoreError::InvalidId { .. } => "CHRONO_DATASTORE_INVALID_ID",
            DataStoreError::IdMismatch { .. } => "CHRONO_DATASTORE_ID_MISMATCH",
            DataStoreError::Config(e) => e.code(),
            DataStoreError::Pending(e) => e.code(),
            DataStoreError::Stamps(e) => e.code(),
            DataStoreError::Commit(e) => e.code(),
            DataStoreError::Changeset(e) => e.code(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DataStoreError::Layout { .. } => Severity::Error,
            DataStoreError::InvalidId { .. } | DataStoreError::IdMismatch { .. } => Severity::Fatal,
            DataStoreError::Config(e) => e.severity(),
            DataStoreError::Pending(e) => e.severity(),
            DataStoreError::Stamps(e) => e.severity(),
            DataStoreError::Commit(e) => e.severity(),
            DataStoreError::Changeset(e) => e.severity(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
