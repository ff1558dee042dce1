//! Errors raised by external collaborators

use thiserror::Error;

use crate::errors::Severity;
use crate::nid::Nid;

/// Result type for collaborator operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The object store rejected or failed a read or write
    #[error("Object store failure for nid {nid}: {message}")]
    Storage { nid: Nid, message: String },

    /// The object store cannot be reached at all
    #[error("Object store unavailable: {0}")]
    Unavailable(String),

    /// Indexing a chronology failed
    #[error("Index failure for nid {nid}: {message}")]
    Index { nid: Nid, message: String },

    /// Rebuilding derived taxonomy failed
    #[error("Taxonomy rebuild failure for nid {nid}: {message}")]
    Taxonomy { nid: Nid, message: String },
}

impl StoreError {
    pub fn storage(nid: Nid, message: impl Into<String>) -> Self {
        StoreError::Storage {
            nid,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Storage { .. } => "CHRONO_STORE_WRITE_FAILED",
            StoreError::Unavailable(_) => "CHRONO_STORE_UNAVAILABLE",
            StoreError::Index { .. } => "CHRONO_INDEX_FAILED",
            StoreError::Taxonomy { .. } => "CHRONO_TAXONOMY_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(StoreError::storage(-1, "x").code(), "CHRONO_STORE_WRITE_FAILED");
        assert_eq!(
            StoreError::Unavailable("down".into()).code(),
            "CHRONO_STORE_UNAVAILABLE"
        );
    }

    #[test]
    fn test_display_includes_nid() {
        let err = StoreError::storage(-42, "disk full");
        let display = err.to_string();
        assert!(display.contains("-42"));
        assert!(display.contains("disk full"));
    }
}
