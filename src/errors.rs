//! Shared error vocabulary
//!
//! Every subsystem error exposes a stable code and one of two severities:
//! - `Error`: the operation fails, the datastore keeps running
//! - `Fatal`: state can no longer be trusted, startup or serving must stop

use std::fmt;

/// Severity levels shared by all subsystem errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, datastore continues
    Error,
    /// Datastore must stop
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}
