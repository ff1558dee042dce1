//! Write pipeline errors
//!
//! These are delivered on the write handle, never raised by `submit_write`
//! itself (except when the pipeline is closed).

use thiserror::Error;

use crate::checker::{blocking_count, Alert};
use crate::collaborators::StoreError;
use crate::errors::Severity;
use crate::nid::Nid;
use crate::pending::PendingError;
use crate::transaction::TransactionError;

/// Result type for write operations
pub type WriteResult<T> = Result<T, WriteError>;

#[derive(Debug, Clone, Error)]
pub enum WriteError {
    /// The object store failed to persist or read back the chronology
    #[error("Write failed: {0}")]
    Storage(#[from] StoreError),

    /// An ADD_UNCOMMITTED checker raised a blocking alert
    #[error("Write of nid {nid} rejected by {} blocking alert(s)", blocking_count(.alerts))]
    CheckFailed { nid: Nid, alerts: Vec<Alert> },

    /// The pending bucket owner could not be reached
    #[error("Pending bookkeeping unavailable: {0}")]
    Bookkeeping(String),

    /// The transaction the write targets is no longer open
    #[error("Transaction write failed: {0}")]
    Transaction(#[from] TransactionError),

    /// The pipeline was shut down before the write was accepted
    #[error("Write pipeline is closed")]
    Closed,

    /// The write task ended without reporting a result
    #[error("Write task for nid {0} aborted")]
    Aborted(Nid),
}

impl From<PendingError> for WriteError {
    fn from(err: PendingError) -> Self {
        WriteError::Bookkeeping(err.to_string())
    }
}

impl WriteError {
    pub fn code(&self) -> &'static str {
        match self {
            WriteError::Storage(_) => "CHRONO_WRITE_STORAGE_FAILED",
            WriteError::CheckFailed { .. } => "CHRONO_WRITE_CHECK_FAILED",
            WriteError::Bookkeeping(_) => "CHRONO_WRITE_BOOKKEEPING_FAILED",
            WriteError::Transaction(_) => "CHRONO_WRITE_TRANSACTION_CLOSED",
            WriteError::Closed => "CHRONO_WRITE_PIPELINE_CLOSED",
            WriteError::Aborted(_) => "CHRONO_WRITE_ABORTED",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Error
    }

    /// True for rejections by checkers, as opposed to failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, WriteError::CheckFailed { .. })
    }

    /// Alerts carried by a checker rejection.
    pub fn alerts(&self) -> &[Alert] {
        match self {
            WriteError::CheckFailed { alerts, .. } => alerts,
            _ => &[],
        }
    }
}
