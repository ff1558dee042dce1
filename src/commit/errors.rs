//! Commit coordinator errors
//!
//! A commit rejected by a checker is not an error: it is a
//! `CommitOutcome` with no record and a blocking alert.

use thiserror::Error;

use crate::collaborators::StoreError;
use crate::errors::Severity;
use crate::pending::PendingError;
use crate::stamp::StampError;
use crate::transaction::TransactionError;

/// Result type for commit operations
pub type CommitResult<T> = Result<T, CommitError>;

#[derive(Debug, Error)]
pub enum CommitError {
    /// The object store failed while reading or marking versions
    #[error("Commit storage failure: {0}")]
    Store(#[from] StoreError),

    /// Pending buckets unreachable or commit-manager.data not written
    #[error("Commit bookkeeping failure: {0}")]
    Bookkeeping(#[from] PendingError),

    /// Stamp side tables could not be written
    #[error("Commit stamp table failure: {0}")]
    Stamps(#[from] StampError),

    /// Transaction not open or its checkers could not run
    #[error("Commit transaction failure: {0}")]
    Transaction(#[from] TransactionError),

    /// The commit task panicked or was aborted
    #[error("Commit task aborted: {0}")]
    Aborted(String),
}

impl CommitError {
    pub fn code(&self) -> &'static str {
        match self {
            CommitError::Store(_) => "CHRONO_COMMIT_STORAGE_FAILED",
            CommitError::Bookkeeping(_) => "CHRONO_COMMIT_BOOKKEEPING_FAILED",
            CommitError::Stamps(_) => "CHRONO_COMMIT_STAMP_TABLE_FAILED",
            CommitError::Transaction(_) => "CHRONO_COMMIT_TRANSACTION_FAILED",
            CommitError::Aborted(_) => "CHRONO_COMMIT_ABORTED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            CommitError::Bookkeeping(e) => e.severity(),
            CommitError::Stamps(e) => e.severity(),
            _ => Severity::Error,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
