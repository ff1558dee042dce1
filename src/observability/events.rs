//! Lifecycle events for chronostamp
//!
//! Every observable lifecycle step has an explicit, typed event. Events are
//! emitted through `tracing`; the event name is carried in the `event` field
//! so log consumers can filter on a stable vocabulary.

use std::fmt;

/// Observable events in the commit and versioning core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    /// Datastore open begins
    BootStart,
    /// Datastore open complete, ready to accept writes
    BootComplete,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,
    /// Datastore identifiers disagree across collaborators (FATAL)
    DataStoreIdMismatch,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Write pipeline
    /// Write task accepted (permit acquired)
    WriteAccepted,
    /// Write task finished successfully
    WriteComplete,
    /// Write task failed (surfaced by the completion drainer)
    WriteFailed,

    // Commit
    /// Commit task started
    CommitBegin,
    /// Commit produced a record
    CommitComplete,
    /// Commit rejected by a checker, pending state restored
    CommitReverted,
    /// Commit found nothing to do
    CommitEmpty,
    /// Uncommitted edits discarded
    CancelComplete,

    // Transactions
    /// Transaction opened
    TransactionOpened,
    /// Transaction committed
    TransactionCommitted,
    /// Transaction canceled
    TransactionCanceled,

    // Changesets
    /// Changeset frames appended to the segment pair
    ChangesetAppend,
    /// Changeset segment corrupt (FATAL at startup)
    ChangesetCorruption,
    /// Replay of changeset segments begins
    ReplayBegin,
    /// A segment was skipped because it was already processed
    ReplaySegmentSkipped,
    /// Replay of changeset segments complete
    ReplayComplete,
    /// Post-replay index and taxonomy rebuild complete
    ReplayPostProcessComplete,

    // Sync
    /// Sync begins
    SyncBegin,
    /// Sync complete, bookkeeping persisted
    SyncComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "DATASTORE_OPEN_BEGIN",
            Event::BootComplete => "DATASTORE_OPEN_COMPLETE",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::DataStoreIdMismatch => "DATASTORE_ID_MISMATCH",

            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::WriteAccepted => "WRITE_ACCEPTED",
            Event::WriteComplete => "WRITE_COMPLETE",
            Event::WriteFailed => "WRITE_FAILED",

            Event::CommitBegin => "COMMIT_BEGIN",
            Event::CommitComplete => "COMMIT_COMPLETE",
            Event::CommitReverted => "COMMIT_REVERTED",
            Event::CommitEmpty => "COMMIT_EMPTY",
            Event::CancelComplete => "CANCEL_COMPLETE",

            Event::TransactionOpened => "TRANSACTION_OPENED",
            Event::TransactionCommitted => "TRANSACTION_COMMITTED",
            Event::TransactionCanceled => "TRANSACTION_CANCELED",

            Event::ChangesetAppend => "CHANGESET_APPEND",
            Event::ChangesetCorruption => "CHANGESET_CORRUPTION",
            Event::ReplayBegin => "CHANGESET_REPLAY_BEGIN",
            Event::ReplaySegmentSkipped => "CHANGESET_SEGMENT_SKIPPED",
            Event::ReplayComplete => "CHANGESET_REPLAY_COMPLETE",
            Event::ReplayPostProcessComplete => "CHANGESET_POST_PROCESS_COMPLETE",

            Event::SyncBegin => "SYNC_BEGIN",
            Event::SyncComplete => "SYNC_COMPLETE",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Event::DataStoreIdMismatch | Event::ChangesetCorruption
        )
    }

    /// Returns true if this event reports a failure that is not fatal
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::WriteFailed | Event::CommitReverted)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::BootStart,
            Event::BootComplete,
            Event::ShutdownStart,
            Event::ShutdownComplete,
            Event::DataStoreIdMismatch,
            Event::ConfigLoaded,
            Event::WriteAccepted,
            Event::WriteComplete,
            Event::WriteFailed,
            Event::CommitBegin,
            Event::CommitComplete,
            Event::CommitReverted,
            Event::CommitEmpty,
            Event::CancelComplete,
            Event::TransactionOpened,
            Event::TransactionCommitted,
            Event::TransactionCanceled,
            Event::ChangesetAppend,
            Event::ChangesetCorruption,
            Event::ReplayBegin,
            Event::ReplaySegmentSkipped,
            Event::ReplayComplete,
            Event::ReplayPostProcessComplete,
            Event::SyncBegin,
            Event::SyncComplete,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::DataStoreIdMismatch.is_fatal());
        assert!(Event::ChangesetCorruption.is_fatal());
        assert!(!Event::CommitReverted.is_fatal());
        assert!(!Event::BootStart.is_fatal());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::BootStart), "DATASTORE_OPEN_BEGIN");
        assert_eq!(format!("{}", Event::CommitComplete), "COMMIT_COMPLETE");
    }
}
