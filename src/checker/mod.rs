//! Change checker protocol
//!
//! Checkers are pluggable validation hooks run at two checkpoints:
//! - `AddUncommitted`: when a chronology with pending edits is written
//! - `Commit`: when pending edits are about to be committed
//!
//! A checker returns zero or one [`Alert`]. An alert whose `fail_commit()`
//! is true aborts the enclosing write or commit.
//!
//! Checkers run in no particular order.

mod alert;
mod defaults;
mod registry;

pub use alert::{any_blocking, blocking_count, Alert, AlertSeverity, CheckPhase};
pub use defaults::{DescriptionVersionChecker, SingleUncommittedVersionChecker};
pub use registry::{ChangeChecker, CheckContext, CheckerId, CheckerRegistry};

use serde::{Deserialize, Serialize};

/// Whether a transaction runs checkers at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckerMode {
    #[default]
    Active,
    /// Trusted bulk import: skip validation entirely.
    Off,
}
