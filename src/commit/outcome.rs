//! Commit outcomes and handles

use tokio::task::JoinHandle;

use super::errors::{CommitError, CommitResult};
use super::record::CommitRecord;
use crate::checker::{any_blocking, Alert};

/// Result of one commit attempt.
///
/// `record` is `None` when nothing was committed. A blocking alert in
/// `alerts` then means the attempt was rejected; no blocking alert means
/// there was nothing to commit.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub record: Option<CommitRecord>,
    pub alerts: Vec<Alert>,
}

impl CommitOutcome {
    pub(crate) fn committed(record: CommitRecord, alerts: Vec<Alert>) -> Self {
        Self {
            record: Some(record),
            alerts,
        }
    }

    pub(crate) fn not_committed(alerts: Vec<Alert>) -> Self {
        Self {
            record: None,
            alerts,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.record.is_some()
    }

    /// No record, and a checker blocked the commit.
    pub fn is_rejected(&self) -> bool {
        self.record.is_none() && any_blocking(&self.alerts)
    }

    /// No record, and no checker objected.
    pub fn is_nothing_to_commit(&self) -> bool {
        self.record.is_none() && !any_blocking(&self.alerts)
    }
}

/// A spawned commit.
#[derive(Debug)]
pub struct CommitHandle {
    task: JoinHandle<CommitResult<CommitOutcome>>,
}

impl CommitHandle {
    pub(crate) fn new(task: JoinHandle<CommitResult<CommitOutcome>>) -> Self {
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> CommitResult<CommitOutcome> {
        self.task
            .await
            .map_err(|e| CommitError::Aborted(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    use crate::nid::NidSet;

    #[test]
    fn test_empty_outcome_distinguishes_rejection() {
        let rejected = CommitOutcome::not_committed(vec![Alert::error("c", -1, "bad")]);
        assert!(rejected.is_rejected());
        assert!(!rejected.is_nothing_to_commit());

        let warned = CommitOutcome::not_committed(vec![Alert::warning("c", -1, "hm")]);
        assert!(!warned.is_rejected());
        assert!(warned.is_nothing_to_commit());
    }

    #[test]
    fn test_committed_outcome() {
        let record = CommitRecord {
            commit_time: 5,
            stamps_committed: BTreeSet::from([1]),
            stamp_aliases: BTreeMap::new(),
            concept_nids: NidSet::new(),
            semantic_nids: NidSet::new(),
            comment: None,
        };
        let outcome = CommitOutcome::committed(record, Vec::new());
        assert!(outcome.is_committed());
        assert!(!outcome.is_rejected());
        assert!(!outcome.is_nothing_to_commit());
    }

    #[tokio::test]
    async fn test_panicking_commit_is_aborted() {
        let handle = CommitHandle::new(tokio::spawn(async {
            if true {
                panic!("boom");
            }
            Ok(CommitOutcome::not_committed(Vec::new()))
        }));
        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.code(), "CHRONO_COMMIT_ABORTED");
    }
}
