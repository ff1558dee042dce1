//! Transaction errors

use thiserror::Error;
use uuid::Uuid;

use super::TransactionState;
use crate::collaborators::StoreError;
use crate::errors::Severity;

/// Result type for transaction operations
pub type TransactionResult<T> = Result<T, TransactionError>;

#[derive(Debug, Clone, Error)]
pub enum TransactionError {
    /// The transaction was already committed or canceled
    #[error("Transaction {id} is {state}, not open")]
    NotOpen { id: Uuid, state: TransactionState },

    /// No pending transaction with this id
    #[error("Unknown transaction {0}")]
    Unknown(Uuid),

    /// A component could not be read for checking
    #[error("Transaction store failure: {0}")]
    Store(#[from] StoreError),

    /// A checker task panicked or was aborted
    #[error("Checker task for transaction {id} failed: {message}")]
    CheckerTask { id: Uuid, message: String },
}

impl TransactionError {
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::NotOpen { .. } => "CHRONO_TXN_NOT_OPEN",
            TransactionError::Unknown(_) => "CHRONO_TXN_UNKNOWN",
            TransactionError::Store(_) => "CHRONO_TXN_STORE_FAILED",
            TransactionError::CheckerTask { .. } => "CHRONO_TXN_CHECKER_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}
