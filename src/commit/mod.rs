//! Commit coordination
//!
//! This module provides:
//! - The commit clock (strictly increasing commit times)
//! - Scoped commits (global, single chronology, transaction) run through one
//!   routine
//! - Cancel of pending edits by editor or by transaction
//! - Commit records handed to listeners on every successful commit

mod clock;
mod coordinator;
mod errors;
mod outcome;
mod queue;
mod record;
mod scope;

pub use clock::CommitClock;
pub use coordinator::{CommitCoordinator, CoordinatorBuilder};
pub use errors::{CommitError, CommitResult};
pub use outcome::{CommitHandle, CommitOutcome};
pub use record::{CommitRecord, CommitSummary};
pub use scope::CommitScope;
