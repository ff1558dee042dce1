//! Commit record - the summary of one successful commit

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::nid::{Nid, NidSet};
use crate::stamp::StampSequence;

/// Immutable summary of one successful commit.
///
/// Produced exactly once per successful commit and handed to change and
/// changeset listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Epoch milliseconds shared by every stamp finalized in this commit.
    pub commit_time: i64,
    pub stamps_committed: BTreeSet<StampSequence>,
    /// Finalized sequence -> sequence that already named the same tuple.
    pub stamp_aliases: BTreeMap<StampSequence, StampSequence>,
    pub concept_nids: NidSet,
    pub semantic_nids: NidSet,
    pub comment: Option<String>,
}

impl CommitRecord {
    pub fn commit_instant(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.commit_time)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Every affected nid, concepts first.
    pub fn affected_nids(&self) -> Vec<Nid> {
        let mut nids = self.concept_nids.to_vec();
        nids.extend(self.semantic_nids.to_vec());
        nids
    }

    pub fn summary(&self) -> CommitSummary {
        CommitSummary {
            commit_time: self.commit_time,
            commit_instant: self.commit_instant().to_rfc3339(),
            stamps_committed: self.stamps_committed.len(),
            stamp_aliases: self.stamp_aliases.len(),
            concepts: self.concept_nids.len(),
            semantics: self.semantic_nids.len(),
            comment: self.comment.clone(),
        }
    }
}

/// Serializable counts of a commit record, for logs and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct CommitSummary {
    pub commit_time: i64,
    pub commit_instant: String,
    pub stamps_committed: usize,
    pub stamp_aliases: usize,
    pub concepts: usize,
    pub semantics: usize,
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CommitRecord {
        CommitRecord {
            commit_time: 1_700_000_000_123,
            stamps_committed: BTreeSet::from([3, 4]),
            stamp_aliases: BTreeMap::from([(4, 1)]),
            concept_nids: [-10].into_iter().collect(),
            semantic_nids: [-20, -21].into_iter().collect(),
            comment: Some("release".into()),
        }
    }

    #[test]
    fn test_commit_instant() {
        let instant = record().commit_instant();
        assert_eq!(instant.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_affected_nids() {
        assert_eq!(record().affected_nids(), vec![-10, -21, -20]);
    }

    #[test]
    fn test_summary_counts() {
        let summary = record().summary();
        assert_eq!(summary.stamps_committed, 2);
        assert_eq!(summary.stamp_aliases, 1);
        assert_eq!(summary.semantics, 2);
    }
}
