//! Commit Coordinator Tests
//!
//! Tests for the commit path through the public API:
//! - Commit times strictly increase, also under concurrent commits
//! - A cancel dropped while queued does not stall later commits
//! - Blocking checkers revert a whole batch and keep its nids pending
//! - A stamp shared across chronologies commits on all of them
//! - Storage failures during a commit leave the nids pending
//! - The write pipeline holds submitters back when permits run out
//! - Transactions commit and cancel as one unit

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use uuid::Uuid;

use chronostamp::checker::{Alert, ChangeChecker, CheckContext, CheckPhase, CheckerMode, CheckerRegistry};
use chronostamp::chronology::{Chronology, Version, VersionData};
use chronostamp::collaborators::{ChronologyStore, MemoryChronologyStore, StoreError, StoreResult};
use chronostamp::commit::{CommitCoordinator, CommitRecord};
use chronostamp::listener::ChangeSetListener;
use chronostamp::nid::Nid;
use chronostamp::stamp::{Stamp, StampSequence, StampService, StampStore, Status};
use chronostamp::transaction::TransactionState;

const EDITOR: Nid = -1;
const MODULE: Nid = -5;
const PATH: Nid = -9;

fn coordinator() -> (CommitCoordinator, Arc<StampStore>) {
    let store = Arc::new(MemoryChronologyStore::new(Uuid::new_v4()));
    let stamps = Arc::new(StampStore::new());
    let coordinator = CommitCoordinator::builder(store, stamps.clone())
        .checkers(Arc::new(CheckerRegistry::with_defaults()))
        .start();
    (coordinator, stamps)
}

fn pending_stamp(stamps: &StampStore, status: Status, author: Nid) -> StampSequence {
    stamps.stamp_sequence(Stamp::uncommitted(status, author, MODULE, PATH))
}

fn concept_with(nid: Nid, seq: StampSequence) -> Chronology {
    Chronology::new_concept(nid, Uuid::new_v4())
        .with_version(Version::uncommitted(seq, VersionData::Concept))
}

async fn write(coordinator: &CommitCoordinator, chronology: Chronology) {
    coordinator
        .submit_write(chronology, true)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
}

struct RecordingListener {
    times: Mutex<Vec<i64>>,
}

impl ChangeSetListener for RecordingListener {
    fn handle_post_commit(&self, record: &CommitRecord) {
        self.times.lock().unwrap().push(record.commit_time);
    }
}

// =============================================================================
// Commit Ordering Tests
// =============================================================================

/// Commits submitted one after another get increasing commit times.
#[tokio::test]
async fn test_sequential_commits_strictly_increase() {
    let (coordinator, stamps) = coordinator();
    let mut handles = Vec::new();
    for i in 0..20 {
        let author = -100 - i;
        write(&coordinator, concept_with(-1000 - i, pending_stamp(&stamps, Status::Active, author))).await;
        handles.push(coordinator.commit_global(author, None));
    }

    let mut previous = i64::MIN;
    for handle in handles {
        let record = handle.wait().await.unwrap().record.expect("committed");
        assert!(record.commit_time > previous);
        previous = record.commit_time;
    }
}

/// Concurrent commits never share a commit time and reach listeners in
/// commit time order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commits_have_unique_ordered_times() {
    let (coordinator, stamps) = coordinator();
    let listener = Arc::new(RecordingListener {
        times: Mutex::new(Vec::new()),
    });
    let subscription = coordinator
        .listeners()
        .changesets
        .subscribe(listener.clone() as Arc<dyn ChangeSetListener>);

    for i in 0..16 {
        write(&coordinator, concept_with(-2000 - i, pending_stamp(&stamps, Status::Active, -200 - i))).await;
    }

    let mut tasks = Vec::new();
    for i in 0..16 {
        let coordinator = coordinator.clone();
        tasks.push(tokio::spawn(async move {
            coordinator.commit_global(-200 - i, None).wait().await
        }));
    }

    let mut times = BTreeSet::new();
    for task in tasks {
        let record = task.await.unwrap().unwrap().record.expect("committed");
        assert!(times.insert(record.commit_time), "duplicate commit time");
    }

    coordinator.sync().await.unwrap();
    let observed = listener.times.lock().unwrap().clone();
    assert_eq!(observed.len(), 16);
    assert!(observed.windows(2).all(|w| w[0] < w[1]));
    assert!(coordinator.listeners().changesets.unsubscribe(subscription));
}

/// A cancel whose caller stops waiting still takes its turn, so commits
/// queued behind it run.
#[tokio::test]
async fn test_dropped_cancel_does_not_stall_commits() {
    let (coordinator, stamps) = coordinator();
    write(&coordinator, concept_with(-10, pending_stamp(&stamps, Status::Active, EDITOR))).await;

    let first = coordinator.commit_global(EDITOR, None);
    let cancel = coordinator.cancel_chronology(-10, EDITOR).now_or_never();
    assert!(cancel.is_none(), "cancel finished ahead of the queued commit");
    assert!(first.wait().await.unwrap().is_committed());

    write(&coordinator, concept_with(-11, pending_stamp(&stamps, Status::Active, EDITOR))).await;
    let later = tokio::time::timeout(
        Duration::from_secs(3),
        coordinator.commit_global(EDITOR, None).wait(),
    )
    .await
    .expect("commit queued behind a dropped cancel never ran")
    .unwrap();
    assert!(later.is_committed());
    tokio::time::timeout(Duration::from_secs(3), coordinator.sync())
        .await
        .expect("sync waited on a dropped cancel")
        .unwrap();
}

// =============================================================================
// Checker Tests
// =============================================================================

/// Blocks commit of any pending version stamped CANCELED.
struct BlockCanceled;

impl ChangeChecker for BlockCanceled {
    fn name(&self) -> &str {
        "block-canceled"
    }

    fn check(&self, chronology: &Chronology, phase: CheckPhase, context: &CheckContext<'_>) -> Option<Alert> {
        if phase != CheckPhase::Commit {
            return None;
        }
        let canceled = chronology.uncommitted_versions().any(|v| {
            context
                .stamps
                .stamp(v.stamp_sequence)
                .map(|s| s.status == Status::Canceled)
                .unwrap_or(false)
        });
        canceled.then(|| Alert::error(self.name(), chronology.nid(), "canceled status"))
    }
}

/// A blocking checker reverts the commit and leaves the nid pending.
#[tokio::test]
async fn test_blocking_checker_keeps_nid_pending() {
    let (coordinator, stamps) = coordinator();
    coordinator.checkers().register(Arc::new(BlockCanceled));

    let seq = pending_stamp(&stamps, Status::Canceled, EDITOR);
    write(&coordinator, concept_with(-10, seq)).await;

    let outcome = coordinator.commit_global(EDITOR, None).wait().await.unwrap();
    assert!(outcome.record.is_none());
    assert!(outcome.is_rejected());
    assert!(outcome.alerts.iter().any(|a| a.fail_commit()));

    let pending = coordinator.pending_snapshot().await.unwrap();
    assert!(pending.contains(-10));
    assert!(stamps.is_uncommitted(seq));
    assert!(coordinator.store().get(-10).unwrap().unwrap().has_uncommitted());
}

/// One blocked nid rejects the whole batch: no stamp is finalized and every
/// nid keeps its bucket.
#[tokio::test]
async fn test_blocked_member_reverts_whole_batch() {
    let (coordinator, stamps) = coordinator();
    coordinator.checkers().register(Arc::new(BlockCanceled));

    let passing = pending_stamp(&stamps, Status::Active, EDITOR);
    let blocked = pending_stamp(&stamps, Status::Canceled, EDITOR);
    write(&coordinator, concept_with(-10, passing)).await;
    write(&coordinator, concept_with(-11, blocked)).await;
    let before = coordinator.pending_snapshot().await.unwrap();
    assert_eq!(before.counts().total(), 2);

    let outcome = coordinator.commit_global(EDITOR, None).wait().await.unwrap();
    assert!(outcome.is_rejected());
    let blocking: Vec<Option<Nid>> = outcome
        .alerts
        .iter()
        .filter(|a| a.fail_commit())
        .map(|a| a.nid)
        .collect();
    assert_eq!(blocking, vec![Some(-11)]);

    assert_eq!(coordinator.pending_snapshot().await.unwrap(), before);
    assert!(stamps.is_uncommitted(passing));
    assert!(stamps.is_uncommitted(blocked));
    assert_eq!(stamps.pending_stamps_for_author(EDITOR).len(), 2);
    for nid in [-10, -11] {
        assert!(coordinator.store().get(nid).unwrap().unwrap().has_uncommitted());
    }
}

/// Two uncommitted versions from one author only warn.
#[tokio::test]
async fn test_second_uncommitted_version_is_a_warning() {
    let (coordinator, stamps) = coordinator();
    let first = pending_stamp(&stamps, Status::Active, EDITOR);
    let second = stamps.stamp_sequence(Stamp::uncommitted(Status::Inactive, EDITOR, MODULE, PATH));
    let chronology = concept_with(-10, first)
        .with_version(Version::uncommitted(second, VersionData::Opaque(vec![7])));

    let summary = coordinator
        .submit_write(chronology, true)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(summary.alerts.len(), 1);
    assert!(!summary.alerts[0].fail_commit());

    let outcome = coordinator.commit_global(EDITOR, None).wait().await.unwrap();
    assert!(outcome.is_committed());
}

// =============================================================================
// Shared Stamp Tests
// =============================================================================

/// Committing one chronology finalizes its stamp, so every other
/// chronology carrying that stamp is committed with it and nothing is left
/// for a later global commit.
#[tokio::test]
async fn test_chronology_commit_settles_shared_stamp() {
    let (coordinator, stamps) = coordinator();
    let seq = pending_stamp(&stamps, Status::Active, EDITOR);
    write(&coordinator, concept_with(-10, seq)).await;
    write(&coordinator, concept_with(-11, seq)).await;

    let record = coordinator
        .commit_chronology(-10, EDITOR, None)
        .wait()
        .await
        .unwrap()
        .record
        .expect("committed");
    assert_eq!(stamps.stamp(seq).unwrap().time, record.commit_time);

    let global = coordinator.commit_global(EDITOR, None).wait().await.unwrap();
    assert!(global.is_nothing_to_commit());

    let other = coordinator.store().get(-11).unwrap().unwrap();
    assert!(!other.has_uncommitted());
    assert!(record.concept_nids.contains(-11));
    assert!(!coordinator.pending_snapshot().await.unwrap().contains(-11));
}

// =============================================================================
// Storage Failure Tests
// =============================================================================

/// Store whose `put` fails while the switch is on.
struct FailingStore {
    inner: MemoryChronologyStore,
    fail_puts: AtomicBool,
}

impl ChronologyStore for FailingStore {
    fn data_store_id(&self) -> Uuid {
        self.inner.data_store_id()
    }

    fn get(&self, nid: Nid) -> StoreResult<Option<Chronology>> {
        self.inner.get(nid)
    }

    fn put(&self, chronology: &Chronology) -> StoreResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::storage(chronology.nid(), "disk full"));
        }
        self.inner.put(chronology)
    }

    fn replace(&self, chronology: Chronology) -> StoreResult<()> {
        self.inner.replace(chronology)
    }

    fn remove(&self, nid: Nid) -> StoreResult<bool> {
        self.inner.remove(nid)
    }

    fn nids(&self) -> StoreResult<Vec<Nid>> {
        self.inner.nids()
    }
}

/// A put failing after the stamps were finalized leaves the nids pending,
/// and the next commit settles them.
#[tokio::test]
async fn test_store_failure_during_commit_keeps_nids_pending() {
    let store = Arc::new(FailingStore {
        inner: MemoryChronologyStore::new(Uuid::new_v4()),
        fail_puts: AtomicBool::new(false),
    });
    let stamps = Arc::new(StampStore::new());
    let coordinator = CommitCoordinator::builder(store.clone(), stamps.clone()).start();
    let seq = pending_stamp(&stamps, Status::Active, EDITOR);
    write(&coordinator, concept_with(-10, seq)).await;
    let before = coordinator.pending_snapshot().await.unwrap();

    store.fail_puts.store(true, Ordering::SeqCst);
    let err = coordinator.commit_global(EDITOR, None).wait().await.unwrap_err();
    assert_eq!(err.code(), "CHRONO_COMMIT_STORAGE_FAILED");
    assert_eq!(coordinator.pending_snapshot().await.unwrap(), before);
    assert!(coordinator.store().get(-10).unwrap().unwrap().has_uncommitted());

    store.fail_puts.store(false, Ordering::SeqCst);
    let record = coordinator
        .commit_global(EDITOR, None)
        .wait()
        .await
        .unwrap()
        .record
        .expect("stranded versions committed");
    assert_eq!(record.concept_nids.to_vec(), vec![-10]);
    assert!(record.stamps_committed.contains(&seq));
    assert!(!coordinator.store().get(-10).unwrap().unwrap().has_uncommitted());
    assert!(coordinator.pending_snapshot().await.unwrap().is_empty());
}

// =============================================================================
// Backpressure Tests
// =============================================================================

/// Store whose `put` blocks until the gate opens.
struct GatedStore {
    inner: MemoryChronologyStore,
    open: Mutex<bool>,
    opened: Condvar,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: MemoryChronologyStore::new(Uuid::new_v4()),
            open: Mutex::new(false),
            opened: Condvar::new(),
        }
    }

    fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

impl ChronologyStore for GatedStore {
    fn data_store_id(&self) -> Uuid {
        self.inner.data_store_id()
    }

    fn get(&self, nid: Nid) -> StoreResult<Option<Chronology>> {
        self.inner.get(nid)
    }

    fn put(&self, chronology: &Chronology) -> StoreResult<()> {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
        drop(open);
        self.inner.put(chronology)
    }

    fn replace(&self, chronology: Chronology) -> StoreResult<()> {
        self.inner.replace(chronology)
    }

    fn remove(&self, nid: Nid) -> StoreResult<bool> {
        self.inner.remove(nid)
    }

    fn nids(&self) -> StoreResult<Vec<Nid>> {
        self.inner.nids()
    }
}

/// Ten writes submitted at once through two permits: two are accepted, the
/// rest wait for a permit, and all ten land once the store moves again.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submitters_held_back_when_permits_exhausted() {
    let store = Arc::new(GatedStore::new());
    let stamps = Arc::new(StampStore::new());
    let coordinator = CommitCoordinator::builder(store.clone(), stamps.clone())
        .write_permits(2)
        .start();
    let seq = pending_stamp(&stamps, Status::Active, EDITOR);
    let accepted = Arc::new(AtomicUsize::new(0));

    let mut submitters = Vec::new();
    for nid in -19..=-10 {
        let coordinator = coordinator.clone();
        let accepted = Arc::clone(&accepted);
        submitters.push(tokio::spawn(async move {
            let handle = coordinator
                .submit_write(concept_with(nid, seq), false)
                .await
                .unwrap();
            accepted.fetch_add(1, Ordering::SeqCst);
            handle
        }));
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    assert_eq!(coordinator.write_pipeline().available_permits(), 0);
    assert!(submitters.iter().filter(|s| !s.is_finished()).count() >= 8);

    store.release();
    for submitter in submitters {
        submitter.await.unwrap().wait().await.unwrap();
    }

    assert_eq!(accepted.load(Ordering::SeqCst), 10);
    assert_eq!(coordinator.write_pipeline().available_permits(), 2);
    assert_eq!(coordinator.database_sequence(), 10);
    assert_eq!(coordinator.pending_snapshot().await.unwrap().counts().total(), 10);
}

// =============================================================================
// Transaction Tests
// =============================================================================

/// Committing a transaction finalizes only its own stamps.
#[tokio::test]
async fn test_transaction_commit() {
    let (coordinator, stamps) = coordinator();
    let loose = pending_stamp(&stamps, Status::Active, EDITOR);
    write(&coordinator, concept_with(-20, loose)).await;

    let transaction = coordinator.begin_transaction("edit", CheckerMode::Active);
    let seq = transaction
        .get_stamp(Status::Active, EDITOR, MODULE, PATH)
        .unwrap();
    assert_ne!(seq, loose);
    coordinator
        .write_in_transaction(&transaction, concept_with(-10, seq))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(coordinator.pending_transactions(), vec![transaction.id()]);

    let outcome = coordinator
        .commit_transaction(&transaction, Some("txn".into()))
        .wait()
        .await
        .unwrap();
    let record = outcome.record.expect("committed");
    assert_eq!(record.stamps_committed, BTreeSet::from([seq]));
    assert_eq!(record.concept_nids.to_vec(), vec![-10]);
    assert_eq!(transaction.state(), TransactionState::Committed);
    assert!(coordinator.pending_transactions().is_empty());

    assert!(stamps.is_uncommitted(loose));
    assert!(!coordinator.store().get(-10).unwrap().unwrap().has_uncommitted());

    // A closed transaction accepts no more writes.
    let err = coordinator
        .write_in_transaction(&transaction, concept_with(-11, seq))
        .await
        .unwrap_err();
    assert!(!err.is_validation());
}

/// Canceling a transaction removes its versions and closes it.
#[tokio::test]
async fn test_transaction_cancel() {
    let (coordinator, stamps) = coordinator();
    let transaction = coordinator.begin_transaction("discard", CheckerMode::Off);
    let seq = transaction
        .get_stamp(Status::Active, EDITOR, MODULE, PATH)
        .unwrap();
    coordinator
        .write_in_transaction(&transaction, concept_with(-10, seq))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(coordinator.cancel_transaction(&transaction).await.unwrap(), 1);
    assert_eq!(transaction.state(), TransactionState::Canceled);
    assert!(coordinator.store().get(-10).unwrap().is_none());
    assert_eq!(stamps.pending_count(), 0);
    assert!(coordinator.pending_transactions().is_empty());

    let outcome = coordinator
        .commit_transaction(&transaction, None)
        .wait()
        .await;
    assert!(outcome.is_err());
}
