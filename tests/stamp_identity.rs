//! Stamp Identity Tests
//!
//! Tests for stamp numbering through commits:
//! - Identical tuples share one sequence
//! - Committing a tuple that already has a sequence records an alias
//! - Alias resolution is closed over chains in both directions
//! - Alias and comment tables survive a reload

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use chronostamp::chronology::{Chronology, Version, VersionData};
use chronostamp::collaborators::MemoryChronologyStore;
use chronostamp::commit::CommitCoordinator;
use chronostamp::nid::Nid;
use chronostamp::stamp::{Stamp, StampService, StampStore, Status};

const EDITOR: Nid = -1;
const MODULE: Nid = -5;
const PATH: Nid = -9;

/// Identical uncommitted tuples are interned once.
#[test]
fn test_identical_tuples_share_sequence() {
    let stamps = StampStore::new();
    let a = stamps.stamp_sequence(Stamp::uncommitted(Status::Active, EDITOR, MODULE, PATH));
    let b = stamps.stamp_sequence(Stamp::uncommitted(Status::Active, EDITOR, MODULE, PATH));
    let c = stamps.stamp_sequence(Stamp::uncommitted(Status::Inactive, EDITOR, MODULE, PATH));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(stamps.pending_stamps_for_author(EDITOR).len(), 2);
}

/// Committing onto an existing committed tuple aliases the two sequences.
#[tokio::test]
async fn test_commit_onto_existing_tuple_records_alias() {
    let floor = Utc::now().timestamp_millis() + 86_400_000;
    let store = Arc::new(MemoryChronologyStore::new(Uuid::new_v4()));
    let stamps = Arc::new(StampStore::new());
    let coordinator = CommitCoordinator::builder(store, stamps.clone())
        .clock_floor(floor)
        .start();

    let existing = stamps.stamp_sequence(Stamp::new(Status::Active, floor + 1, EDITOR, MODULE, PATH));
    let pending = stamps.stamp_sequence(Stamp::uncommitted(Status::Active, EDITOR, MODULE, PATH));
    assert_ne!(existing, pending);

    let chronology = Chronology::new_concept(-10, Uuid::new_v4())
        .with_version(Version::uncommitted(pending, VersionData::Concept));
    coordinator
        .submit_write(chronology, false)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    let record = coordinator
        .commit_global(EDITOR, None)
        .wait()
        .await
        .unwrap()
        .record
        .expect("committed");
    assert_eq!(record.commit_time, floor + 1);
    assert_eq!(record.stamp_aliases, BTreeMap::from([(pending, existing)]));
    assert_eq!(stamps.resolve_aliases(existing), BTreeSet::from([pending]));
    assert_eq!(stamps.resolve_aliases(pending), BTreeSet::from([existing]));
    assert_eq!(stamps.stamp(pending), stamps.stamp(existing));
}

/// Alias chains resolve to every member from any member.
#[test]
fn test_alias_closure() {
    let stamps = StampStore::new();
    stamps.add_alias(1, 2);
    stamps.add_alias(2, 3);
    stamps.add_alias(5, 3);

    assert_eq!(stamps.resolve_aliases(1), BTreeSet::from([2, 3, 5]));
    assert_eq!(stamps.resolve_aliases(5), BTreeSet::from([1, 2, 3]));
    assert!(stamps.resolve_aliases(9).is_empty());
}

/// Side tables written by one store are read back by another.
#[test]
fn test_side_tables_survive_reload() {
    let dir = TempDir::new().unwrap();
    let stamps = StampStore::new();
    stamps.add_alias(1, 2);
    stamps.set_comment(1, Some("reviewed".into()));
    stamps.persist_side_tables(dir.path()).unwrap();

    let reloaded = StampStore::new();
    reloaded.load_side_tables(dir.path()).unwrap();
    assert_eq!(reloaded.resolve_aliases(2), BTreeSet::from([1]));
    assert_eq!(reloaded.get_comment(1).as_deref(), Some("reviewed"));
}
