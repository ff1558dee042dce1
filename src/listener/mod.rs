//! Change and changeset listeners
//!
//! - Change listeners fire on every individual write and on every commit
//! - Changeset listeners fire only after a successful commit, with the
//!   full commit record
//!
//! Registration returns a [`Subscription`] that must be disposed explicitly.

mod registry;

pub use registry::{ListenerRegistry, Subscription};

use crate::chronology::Chronology;
use crate::commit::CommitRecord;

/// Observer of writes and commits.
pub trait ChronologyChangeListener: Send + Sync {
    /// A chronology was written.
    fn handle_change(&self, chronology: &Chronology);

    /// A commit completed.
    fn handle_commit(&self, record: &CommitRecord);
}

/// Observer of successful commits.
pub trait ChangeSetListener: Send + Sync {
    fn handle_post_commit(&self, record: &CommitRecord);
}

/// Both listener registries of a coordinator.
#[derive(Default)]
pub struct Listeners {
    pub changes: ListenerRegistry<dyn ChronologyChangeListener>,
    pub changesets: ListenerRegistry<dyn ChangeSetListener>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_change(&self, chronology: &Chronology) {
        self.changes.for_each(|l| l.handle_change(chronology));
    }

    /// Change listeners first, then changeset listeners.
    pub fn notify_commit(&self, record: &CommitRecord) {
        self.changes.for_each(|l| l.handle_commit(record));
        self.changesets.for_each(|l| l.handle_post_commit(record));
    }
}
