//! Commit coordinator
//!
//! Owns the write pipeline, the pending buckets and the commit clock, and
//! runs every commit through one routine parametrized by [`CommitScope`]:
//!
//! 1. Wait for this commit's turn in submission order
//! 2. Gather the scope's work (taking buckets and stamps where it applies)
//! 3. Run COMMIT checkers; on a blocking alert revert and return no record
//! 4. Read the candidates, then take one commit time and finalize every
//!    gathered stamp with it
//! 5. Mark every version under a finalized stamp committed, including
//!    versions on pending chronologies outside the scope
//! 6. Build the `CommitRecord` and notify listeners
//! 7. Persist bookkeeping
//!
//! Cancels wait for a turn in the same queue, so a cancel never interleaves
//! with a commit's finalization. Like commits they run on their own task, so
//! every ticket handed out is served even if the caller stops waiting.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use super::clock::CommitClock;
use super::errors::{CommitError, CommitResult};
use super::outcome::{CommitHandle, CommitOutcome};
use super::queue::CommitQueue;
use super::record::CommitRecord;
use super::scope::{CommitScope, Gathered};
use crate::checker::{any_blocking, CheckerMode, CheckerRegistry};
use crate::chronology::Chronology;
use crate::collaborators::ChronologyStore;
use crate::listener::Listeners;
use crate::nid::{Nid, NidSet, ObjectType};
use crate::observability::{log_event, Event};
use crate::pending::{write_commit_manager_file, PendingBuckets, PendingSets};
use crate::stamp::{Finalized, StampService, StampSequence};
use crate::transaction::{PendingTransactions, Transaction, TransactionState};
use crate::write::{
    InFlight, WriteContext, WriteHandle, WritePipeline, WriteResult, WriteTarget,
    DEFAULT_WRITE_PERMITS,
};

/// Builder for [`CommitCoordinator`].
pub struct CoordinatorBuilder {
    store: Arc<dyn ChronologyStore>,
    stamps: Arc<dyn StampService>,
    checkers: Option<Arc<CheckerRegistry>>,
    listeners: Option<Arc<Listeners>>,
    write_permits: usize,
    data_dir: Option<PathBuf>,
    pending: PendingSets,
    database_sequence: i64,
    clock_floor: i64,
}

impl CoordinatorBuilder {
    /// Defaults to the mandatory checkers, fresh listeners, 40 write permits
    /// and no bookkeeping directory.
    pub fn new(store: Arc<dyn ChronologyStore>, stamps: Arc<dyn StampService>) -> Self {
        Self {
            store,
            stamps,
            checkers: None,
            listeners: None,
            write_permits: DEFAULT_WRITE_PERMITS,
            data_dir: None,
            pending: PendingSets::new(),
            database_sequence: 0,
            clock_floor: 0,
        }
    }

    pub fn checkers(mut self, checkers: Arc<CheckerRegistry>) -> Self {
        self.checkers = Some(checkers);
        self
    }

    pub fn listeners(mut self, listeners: Arc<Listeners>) -> Self {
        self.listeners = Some(listeners);
        self
    }

    pub fn write_permits(mut self, permits: usize) -> Self {
        self.write_permits = permits;
        self
    }

    /// Directory receiving `commit-manager.data` and the stamp side tables.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Pending buckets and database sequence loaded from a previous run.
    pub fn pending(mut self, pending: PendingSets, database_sequence: i64) -> Self {
        self.pending = pending;
        self.database_sequence = database_sequence;
        self
    }

    /// Every commit time handed out will be greater than `time`.
    pub fn clock_floor(mut self, time: i64) -> Self {
        self.clock_floor = time;
        self
    }

    /// Start the background tasks. Must be called inside a tokio runtime.
    pub fn start(self) -> CommitCoordinator {
        let (buckets, bucket_owner) = PendingBuckets::spawn(self.pending);
        let ctx = WriteContext {
            store: self.store,
            stamps: self.stamps,
            checkers: self
                .checkers
                .unwrap_or_else(|| Arc::new(CheckerRegistry::with_defaults())),
            buckets,
            listeners: self.listeners.unwrap_or_default(),
            database_sequence: Arc::new(AtomicI64::new(self.database_sequence)),
            in_flight: InFlight::new(),
        };
        let (pipeline, drainer) = WritePipeline::start(ctx.clone(), self.write_permits.max(1));

        CommitCoordinator {
            inner: Arc::new(Inner {
                ctx,
                pipeline,
                clock: CommitClock::from_observed(self.clock_floor),
                queue: CommitQueue::new(),
                transactions: PendingTransactions::new(),
                data_dir: self.data_dir,
                persist_lock: tokio::sync::Mutex::new(()),
                background: Mutex::new(vec![bucket_owner, drainer]),
            }),
        }
    }
}

struct Inner {
    ctx: WriteContext,
    pipeline: WritePipeline,
    clock: CommitClock,
    queue: CommitQueue,
    transactions: PendingTransactions,
    data_dir: Option<PathBuf>,
    persist_lock: tokio::sync::Mutex<()>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheaply cloneable handle to the running coordinator.
#[derive(Clone)]
pub struct CommitCoordinator {
    inner: Arc<Inner>,
}

impl CommitCoordinator {
    pub fn builder(
        store: Arc<dyn ChronologyStore>,
        stamps: Arc<dyn StampService>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder::new(store, stamps)
    }

    // ========== Accessors ==========

    pub fn store(&self) -> &Arc<dyn ChronologyStore> {
        &self.inner.ctx.store
    }

    pub fn stamps(&self) -> &Arc<dyn StampService> {
        &self.inner.ctx.stamps
    }

    pub fn checkers(&self) -> &Arc<CheckerRegistry> {
        &self.inner.ctx.checkers
    }

    pub fn listeners(&self) -> &Arc<Listeners> {
        &self.inner.ctx.listeners
    }

    pub fn clock(&self) -> &CommitClock {
        &self.inner.clock
    }

    pub fn write_pipeline(&self) -> &WritePipeline {
        &self.inner.pipeline
    }

    /// Number of writes applied since the datastore was created.
    pub fn database_sequence(&self) -> i64 {
        self.inner.ctx.database_sequence.load(Ordering::SeqCst)
    }

    /// Point-in-time copy of the four pending buckets.
    pub async fn pending_snapshot(&self) -> CommitResult<PendingSets> {
        Ok(self.inner.ctx.buckets.snapshot().await?)
    }

    /// Write and commit tasks not yet finished.
    pub fn in_flight(&self) -> usize {
        self.inner.ctx.in_flight.running()
    }

    // ========== Writes ==========

    /// Submit a chronology for persistence.
    ///
    /// Waits for a write permit when the pipeline is saturated. Storage
    /// failures and blocking checker alerts arrive on the returned handle.
    pub async fn submit_write(
        &self,
        chronology: Chronology,
        with_checks: bool,
    ) -> WriteResult<WriteHandle> {
        self.inner
            .pipeline
            .submit(chronology, WriteTarget::Pending { with_checks })
            .await
    }

    /// Write without running checkers. Used for already-validated facts.
    pub async fn import(&self, chronology: Chronology) -> WriteResult<WriteHandle> {
        self.submit_write(chronology, false).await
    }

    // ========== Transactions ==========

    pub fn begin_transaction(
        &self,
        name: impl Into<String>,
        checker_mode: CheckerMode,
    ) -> Arc<Transaction> {
        let transaction = Arc::new(Transaction::new(
            name,
            checker_mode,
            Arc::clone(&self.inner.ctx.stamps),
        ));
        self.inner.transactions.insert(Arc::clone(&transaction));
        log_event(
            Event::TransactionOpened,
            &[
                ("transaction", &transaction.id().to_string()),
                ("name", transaction.name()),
            ],
        );
        transaction
    }

    pub fn transaction(&self, id: &Uuid) -> Option<Arc<Transaction>> {
        self.inner.transactions.get(id)
    }

    /// Ids of transactions neither committed nor canceled.
    pub fn pending_transactions(&self) -> Vec<Uuid> {
        self.inner.transactions.ids()
    }

    /// Write a chronology whose pending edits belong to `transaction`.
    pub async fn write_in_transaction(
        &self,
        transaction: &Arc<Transaction>,
        chronology: Chronology,
    ) -> WriteResult<WriteHandle> {
        if !transaction.is_open() {
            return Err(crate::transaction::TransactionError::NotOpen {
                id: transaction.id(),
                state: transaction.state(),
            }
            .into());
        }
        self.inner
            .pipeline
            .submit(chronology, WriteTarget::Transaction(Arc::clone(transaction)))
            .await
    }

    // ========== Commit ==========

    /// Spawn a commit for `scope`.
    ///
    /// The commit's place in line is fixed when this returns, so commits
    /// submitted one after another get increasing commit times.
    pub fn commit(&self, scope: CommitScope, comment: Option<String>) -> CommitHandle {
        let ticket = self.inner.queue.ticket();
        let guard = self.inner.ctx.in_flight.enter();
        let inner = Arc::clone(&self.inner);
        let span = tracing::info_span!("commit", scope = scope.label(), ticket);

        CommitHandle::new(tokio::spawn(
            async move {
                let _guard = guard;
                inner.run_commit(scope, comment, ticket).await
            }
            .instrument(span),
        ))
    }

    pub fn commit_global(&self, editor: Nid, comment: Option<String>) -> CommitHandle {
        self.commit(CommitScope::global(editor), comment)
    }

    pub fn commit_chronology(
        &self,
        nid: Nid,
        editor: Nid,
        comment: Option<String>,
    ) -> CommitHandle {
        self.commit(CommitScope::chronology(nid, editor), comment)
    }

    pub fn commit_transaction(
        &self,
        transaction: &Arc<Transaction>,
        comment: Option<String>,
    ) -> CommitHandle {
        self.commit(CommitScope::transaction(Arc::clone(transaction)), comment)
    }

    // ========== Cancel ==========

    /// Discard `editor`'s uncommitted versions of `nid`.
    ///
    /// Other authors' pending versions on the same chronology are kept. A
    /// write for `nid` still in flight is not stopped; callers must not race
    /// the two. Returns the number of versions removed.
    ///
    /// The cancel runs on its own task once queued, so dropping the returned
    /// future does not stop it.
    pub async fn cancel_chronology(&self, nid: Nid, editor: Nid) -> CommitResult<usize> {
        let ticket = self.inner.queue.ticket();
        let guard = self.inner.ctx.in_flight.enter();
        let inner = Arc::clone(&self.inner);
        let span = tracing::info_span!("cancel", nid, editor, ticket);

        tokio::spawn(
            async move {
                let _guard = guard;
                inner.cancel_chronology(nid, editor, ticket).await
            }
            .instrument(span),
        )
        .await
        .map_err(|e| CommitError::Aborted(e.to_string()))?
    }

    /// Discard every pending edit of `transaction` and close it.
    pub async fn cancel_transaction(&self, transaction: &Arc<Transaction>) -> CommitResult<usize> {
        let ticket = self.inner.queue.ticket();
        let guard = self.inner.ctx.in_flight.enter();
        let inner = Arc::clone(&self.inner);
        let transaction = Arc::clone(transaction);
        let span = tracing::info_span!("cancel", transaction = %transaction.id(), ticket);

        tokio::spawn(
            async move {
                let _guard = guard;
                inner.cancel_transaction(&transaction, ticket).await
            }
            .instrument(span),
        )
        .await
        .map_err(|e| CommitError::Aborted(e.to_string()))?
    }

    // ========== Sync / shutdown ==========

    /// Wait for every submitted write and commit, then persist bookkeeping.
    pub async fn sync(&self) -> CommitResult<()> {
        self.inner.ctx.in_flight.wait_idle().await;
        self.inner.persist().await
    }

    /// Stop accepting writes, sync, and stop the background tasks.
    pub async fn shutdown(&self) -> CommitResult<()> {
        self.inner.pipeline.close();
        let synced = self.sync().await;
        let handles: Vec<JoinHandle<()>> = {
            let mut background = self
                .inner
                .background
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            background.drain(..).collect()
        };
        for handle in handles {
            handle.abort();
        }
        synced
    }
}

impl Inner {
    async fn run_commit(
        &self,
        scope: CommitScope,
        comment: Option<String>,
        ticket: u64,
    ) -> CommitResult<CommitOutcome> {
        let _turn = self.queue.turn(ticket).await;
        log_event(Event::CommitBegin, &[("scope", scope.label())]);

        let gathered = scope.gather(&self.ctx).await?;
        let alerts = match scope.validate(&self.ctx, &gathered).await {
            Ok(alerts) => alerts,
            Err(e) => {
                scope.revert(&self.ctx, gathered).await?;
                return Err(e);
            }
        };

        if any_blocking(&alerts) {
            let pending = gathered.candidates.len();
            scope.revert(&self.ctx, gathered).await?;
            log_event(
                Event::CommitReverted,
                &[
                    ("scope", scope.label()),
                    ("alerts", &alerts.len().to_string()),
                    ("pending", &pending.to_string()),
                ],
            );
            return Ok(CommitOutcome::not_committed(alerts));
        }

        // Read everything before finalizing so a failed read changes nothing.
        let loaded = match self.load_candidates(&gathered) {
            Ok(loaded) => loaded,
            Err(e) => {
                scope.revert(&self.ctx, gathered).await?;
                return Err(e);
            }
        };
        // Versions left uncommitted under an already finalized stamp by an
        // earlier commit that failed part way.
        let stranded = loaded
            .iter()
            .any(|chronology| !self.ctx.finalized_stamps(chronology).is_empty());

        if gathered.stamps.is_empty() && !stranded {
            scope.revert(&self.ctx, gathered).await?;
            log_event(Event::CommitEmpty, &[("scope", scope.label())]);
            return Ok(CommitOutcome::not_committed(alerts));
        }

        let commit_time = self.clock.next_commit_time();
        let (committed, stamp_aliases) = self.finalize_stamps(&gathered, commit_time);
        if committed.is_empty() && !stranded {
            scope.revert(&self.ctx, gathered).await?;
            log_event(Event::CommitEmpty, &[("scope", scope.label())]);
            return Ok(CommitOutcome::not_committed(alerts));
        }

        let marked = match self.mark_committed(&gathered, loaded).await {
            Ok(marked) => marked,
            Err(e) => {
                // The stamps stay finalized. Putting the nids back in their
                // buckets lets a later commit or write settle them.
                tracing::error!(
                    code = e.code(),
                    commit_time,
                    "versions not marked after finalizing stamps: {}",
                    e
                );
                if !gathered.taken_buckets.is_empty() {
                    self.ctx.buckets.restore(gathered.taken_buckets).await?;
                }
                return Err(e);
            }
        };

        if let Some(text) = &comment {
            for seq in &committed {
                self.ctx.stamps.set_comment(*seq, Some(text.clone()));
            }
        }

        let mut stamps_committed = committed;
        stamps_committed.extend(marked.stamps);
        let record = CommitRecord {
            commit_time,
            stamps_committed,
            stamp_aliases,
            concept_nids: marked.concept_nids,
            semantic_nids: marked.semantic_nids,
            comment,
        };

        if let CommitScope::Transaction(txn) = &scope {
            txn.mark(TransactionState::Committed)?;
            self.transactions.remove(&txn.id());
            log_event(
                Event::TransactionCommitted,
                &[
                    ("transaction", &txn.id().to_string()),
                    ("commit_time", &commit_time.to_string()),
                ],
            );
        }

        self.ctx.listeners.notify_commit(&record);
        log_event(
            Event::CommitComplete,
            &[
                ("scope", scope.label()),
                ("commit_time", &commit_time.to_string()),
                ("stamps", &record.stamps_committed.len().to_string()),
                ("concepts", &record.concept_nids.len().to_string()),
                ("semantics", &record.semantic_nids.len().to_string()),
            ],
        );

        if let Err(e) = self.persist().await {
            tracing::error!(code = e.code(), "bookkeeping not persisted after commit: {}", e);
        }
        Ok(CommitOutcome::committed(record, alerts))
    }

    async fn cancel_chronology(&self, nid: Nid, editor: Nid, ticket: u64) -> CommitResult<usize> {
        let _turn = self.queue.turn(ticket).await;
        let ctx = &self.ctx;

        let Some(mut chronology) = ctx.store.get(nid)? else {
            return Ok(0);
        };
        let editor_pending: BTreeSet<StampSequence> = ctx
            .stamps
            .pending_stamps_for_author(editor)
            .into_iter()
            .map(|p| p.sequence)
            .collect();
        let canceled: BTreeSet<StampSequence> = chronology
            .uncommitted_versions()
            .map(|v| v.stamp_sequence)
            .filter(|seq| editor_pending.contains(seq))
            .collect();
        if canceled.is_empty() {
            return Ok(0);
        }

        let removed = self.discard_versions(&mut chronology, &canceled)?;
        if !chronology.has_uncommitted() {
            ctx.buckets.remove(nid).await?;
        }

        // A stamp may also cover pending versions on other chronologies.
        let still_used = self.stamps_in_use(nid, &canceled).await?;
        for seq in canceled.difference(&still_used) {
            ctx.stamps.cancel(*seq);
        }

        log_event(
            Event::CancelComplete,
            &[
                ("nid", &nid.to_string()),
                ("editor", &editor.to_string()),
                ("versions", &removed.to_string()),
            ],
        );
        Ok(removed)
    }

    async fn cancel_transaction(
        &self,
        transaction: &Arc<Transaction>,
        ticket: u64,
    ) -> CommitResult<usize> {
        let _turn = self.queue.turn(ticket).await;

        let stamps = transaction.stamp_sequences();
        transaction.mark(TransactionState::Canceled)?;

        let mut removed = 0;
        for nid in transaction.components().to_vec() {
            if let Some(mut chronology) = self.ctx.store.get(nid)? {
                removed += self.discard_versions(&mut chronology, &stamps)?;
            }
        }
        for seq in &stamps {
            self.ctx.stamps.cancel(*seq);
        }
        self.transactions.remove(&transaction.id());

        log_event(
            Event::TransactionCanceled,
            &[
                ("transaction", &transaction.id().to_string()),
                ("versions", &removed.to_string()),
            ],
        );
        Ok(removed)
    }

    /// Finalize every gathered stamp at `commit_time`.
    fn finalize_stamps(
        &self,
        gathered: &Gathered,
        commit_time: i64,
    ) -> (BTreeSet<StampSequence>, BTreeMap<StampSequence, StampSequence>) {
        let mut committed = BTreeSet::new();
        let mut aliases = BTreeMap::new();
        for &seq in &gathered.stamps {
            match self.ctx.stamps.finalize(seq, commit_time) {
                Finalized::Committed => {
                    committed.insert(seq);
                }
                Finalized::AliasOf(existing) => {
                    committed.insert(seq);
                    aliases.insert(seq, existing);
                }
                Finalized::NotPending => {
                    tracing::debug!(stamp = seq, "stamp no longer pending at commit");
                }
            }
        }
        (committed, aliases)
    }

    fn load_candidates(&self, gathered: &Gathered) -> CommitResult<Vec<Chronology>> {
        let mut loaded = Vec::with_capacity(gathered.candidates.len());
        for &nid in &gathered.candidates {
            if let Some(chronology) = self.ctx.store.get(nid)? {
                loaded.push(chronology);
            }
        }
        Ok(loaded)
    }

    /// Mark every uncommitted version under a finalized stamp as committed.
    ///
    /// Candidates that still carry other pending versions go back to their
    /// bucket. Pending chronologies outside the scope are swept as well: a
    /// stamp shared with them is finalized all the same, and a write may have
    /// reached a bucket only after `gather` ran.
    async fn mark_committed(
        &self,
        gathered: &Gathered,
        loaded: Vec<Chronology>,
    ) -> CommitResult<Marked> {
        let mut marked = Marked::default();

        for chronology in loaded {
            let nid = chronology.nid();
            let stored = match self.ctx.settle(&chronology)? {
                Some((settled, stamps)) => {
                    marked.add(&settled, stamps);
                    settled
                }
                None => chronology,
            };
            if let Some(key) = gathered.taken_buckets.locate(nid) {
                if stored.has_uncommitted() {
                    self.ctx.buckets.record(nid, key).await?;
                }
            }
        }

        let live = self.ctx.buckets.snapshot().await?;
        for (_, set) in live.buckets() {
            for nid in set.to_vec() {
                if gathered.candidates.contains(&nid) {
                    continue;
                }
                let Some(chronology) = self.ctx.store.get(nid)? else {
                    continue;
                };
                if let Some((settled, stamps)) = self.ctx.settle(&chronology)? {
                    marked.add(&settled, stamps);
                    if !settled.has_uncommitted() {
                        self.ctx.buckets.remove(nid).await?;
                    }
                }
            }
        }
        Ok(marked)
    }

    /// Drop uncommitted versions stamped with one of `stamps`.
    fn discard_versions(
        &self,
        chronology: &mut Chronology,
        stamps: &BTreeSet<StampSequence>,
    ) -> CommitResult<usize> {
        let removed =
            chronology.retain_versions(|v| !(v.is_uncommitted() && stamps.contains(&v.stamp_sequence)));
        if removed == 0 {
            return Ok(0);
        }
        if chronology.versions().is_empty() {
            self.ctx.store.remove(chronology.nid())?;
        } else {
            self.ctx.store.replace(chronology.clone())?;
        }
        self.ctx.listeners.notify_change(chronology);
        Ok(removed)
    }

    /// The subset of `stamps` still referenced by pending versions of
    /// chronologies other than `exclude`.
    async fn stamps_in_use(
        &self,
        exclude: Nid,
        stamps: &BTreeSet<StampSequence>,
    ) -> CommitResult<BTreeSet<StampSequence>> {
        let pending = self.ctx.buckets.snapshot().await?;
        let mut in_use = BTreeSet::new();
        for (_, set) in pending.buckets() {
            for nid in set.to_vec() {
                if nid == exclude {
                    continue;
                }
                if let Some(other) = self.ctx.store.get(nid)? {
                    in_use.extend(
                        other
                            .uncommitted_versions()
                            .map(|v| v.stamp_sequence)
                            .filter(|seq| stamps.contains(seq)),
                    );
                }
            }
        }
        Ok(in_use)
    }

    /// Write `commit-manager.data` and the stamp side tables.
    async fn persist(&self) -> CommitResult<()> {
        let Some(dir) = self.data_dir.clone() else {
            return Ok(());
        };
        let _serial = self.persist_lock.lock().await;
        let sets = self.ctx.buckets.snapshot().await?;
        let sequence = self.ctx.database_sequence.load(Ordering::SeqCst);
        let stamps = Arc::clone(&self.ctx.stamps);

        tokio::task::spawn_blocking(move || persist_files(&dir, sequence, &sets, stamps.as_ref()))
            .await
            .map_err(|e| CommitError::Aborted(e.to_string()))?
    }
}

/// What `mark_committed` changed in the object store.
#[derive(Default)]
struct Marked {
    concept_nids: NidSet,
    semantic_nids: NidSet,
    stamps: BTreeSet<StampSequence>,
}

impl Marked {
    fn add(&mut self, chronology: &Chronology, stamps: BTreeSet<StampSequence>) {
        match chronology.object_type() {
            ObjectType::Concept => self.concept_nids.add(chronology.nid()),
            ObjectType::Semantic => self.semantic_nids.add(chronology.nid()),
        };
        self.stamps.extend(stamps);
    }
}

fn persist_files(
    dir: &Path,
    sequence: i64,
    sets: &PendingSets,
    stamps: &dyn StampService,
) -> CommitResult<()> {
    write_commit_manager_file(dir, sequence, sets)?;
    stamps.persist_side_tables(dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chronology::{DescriptionData, Version, VersionData};
    use crate::collaborators::MemoryChronologyStore;
    use crate::stamp::{Stamp, StampStore, Status, UNCOMMITTED_TIME};

    const EDITOR: Nid = -1;
    const OTHER: Nid = -2;
    const MODULE: Nid = -5;
    const PATH: Nid = -9;

    fn setup() -> (CommitCoordinator, Arc<StampStore>) {
        let store = Arc::new(MemoryChronologyStore::new(Uuid::new_v4()));
        let stamps = Arc::new(StampStore::new());
        let coordinator = CommitCoordinator::builder(store, stamps.clone()).start();
        (coordinator, stamps)
    }

    fn pending_stamp(stamps: &StampStore, author: Nid) -> StampSequence {
        stamps.stamp_sequence(Stamp::new(Status::Active, UNCOMMITTED_TIME, author, MODULE, PATH))
    }

    fn concept_with(nid: Nid, seq: StampSequence) -> Chronology {
        Chronology::new_concept(nid, Uuid::new_v4())
            .with_version(Version::uncommitted(seq, VersionData::Concept))
    }

    #[tokio::test]
    async fn test_global_commit_finalizes_pending_writes() {
        let (coordinator, stamps) = setup();
        let seq = pending_stamp(&stamps, EDITOR);
        for nid in [-10, -11] {
            coordinator
                .submit_write(concept_with(nid, seq), true)
                .await
                .unwrap()
                .wait()
                .await
                .unwrap();
        }

        let outcome = coordinator
            .commit_global(EDITOR, Some("first".into()))
            .wait()
            .await
            .unwrap();
        let record = outcome.record.expect("committed");
        assert_eq!(record.stamps_committed, BTreeSet::from([seq]));
        assert_eq!(record.concept_nids.to_vec(), vec![-11, -10]);
        assert_eq!(stamps.stamp(seq).unwrap().time, record.commit_time);
        assert_eq!(stamps.get_comment(seq).as_deref(), Some("first"));

        let stored = coordinator.store().get(-10).unwrap().unwrap();
        assert!(!stored.has_uncommitted());
        assert!(coordinator.pending_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_to_commit() {
        let (coordinator, _) = setup();
        let outcome = coordinator.commit_global(EDITOR, None).wait().await.unwrap();
        assert!(outcome.is_nothing_to_commit());
        assert!(outcome.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_commit_keeps_pending_state() {
        let (coordinator, stamps) = setup();
        let seq = pending_stamp(&stamps, EDITOR);
        let broken = Chronology::new_semantic(-20, Uuid::new_v4(), -3, -10).with_version(
            Version::uncommitted(seq, VersionData::Description(DescriptionData::default())),
        );
        let err = coordinator
            .submit_write(broken, true)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let before = coordinator.pending_snapshot().await.unwrap();
        let outcome = coordinator.commit_global(EDITOR, None).wait().await.unwrap();
        assert!(outcome.is_rejected());
        assert_eq!(coordinator.pending_snapshot().await.unwrap(), before);
        assert!(stamps.is_uncommitted(seq));
        assert_eq!(stamps.pending_stamps_for_author(EDITOR).len(), 1);
    }

    #[tokio::test]
    async fn test_chronology_commit_only_takes_editor_versions() {
        let (coordinator, stamps) = setup();
        let mine = pending_stamp(&stamps, EDITOR);
        let theirs = pending_stamp(&stamps, OTHER);
        let chronology = concept_with(-10, mine)
            .with_version(Version::uncommitted(theirs, VersionData::Opaque(vec![1])));
        coordinator
            .submit_write(chronology, false)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        let outcome = coordinator
            .commit_chronology(-10, EDITOR, None)
            .wait()
            .await
            .unwrap();
        assert_eq!(
            outcome.record.unwrap().stamps_committed,
            BTreeSet::from([mine])
        );
        assert!(stamps.is_uncommitted(theirs));

        let pending = coordinator.pending_snapshot().await.unwrap();
        assert!(pending.contains(-10));
    }

    #[tokio::test]
    async fn test_cancel_keeps_other_authors() {
        let (coordinator, stamps) = setup();
        let mine = pending_stamp(&stamps, EDITOR);
        let theirs = pending_stamp(&stamps, OTHER);
        let chronology = concept_with(-10, mine)
            .with_version(Version::uncommitted(theirs, VersionData::Opaque(vec![1])));
        coordinator
            .submit_write(chronology, true)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(coordinator.cancel_chronology(-10, EDITOR).await.unwrap(), 1);
        let stored = coordinator.store().get(-10).unwrap().unwrap();
        assert_eq!(stored.versions().len(), 1);
        assert_eq!(stored.versions()[0].stamp_sequence, theirs);
        assert!(coordinator.pending_snapshot().await.unwrap().contains(-10));

        assert_eq!(coordinator.cancel_chronology(-10, OTHER).await.unwrap(), 1);
        assert!(coordinator.store().get(-10).unwrap().is_none());
        assert!(!coordinator.pending_snapshot().await.unwrap().contains(-10));
    }

    #[tokio::test]
    async fn test_cancel_keeps_stamp_shared_with_other_chronology() {
        let (coordinator, stamps) = setup();
        let seq = pending_stamp(&stamps, EDITOR);
        for nid in [-10, -11] {
            coordinator
                .submit_write(concept_with(nid, seq), true)
                .await
                .unwrap()
                .wait()
                .await
                .unwrap();
        }

        coordinator.cancel_chronology(-10, EDITOR).await.unwrap();
        assert!(stamps.is_uncommitted(seq));
        assert_eq!(stamps.pending_stamps_for_author(EDITOR).len(), 1);

        let record = coordinator
            .commit_global(EDITOR, None)
            .wait()
            .await
            .unwrap()
            .record
            .unwrap();
        assert_eq!(record.concept_nids.to_vec(), vec![-11]);
    }

    #[tokio::test]
    async fn test_write_under_finalized_stamp_is_settled() {
        let (coordinator, stamps) = setup();
        let seq = pending_stamp(&stamps, EDITOR);
        assert_eq!(stamps.finalize(seq, 1_000), Finalized::Committed);

        // The write lands after a commit already finalized its stamp.
        coordinator
            .submit_write(concept_with(-10, seq), true)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        let stored = coordinator.store().get(-10).unwrap().unwrap();
        assert!(!stored.has_uncommitted());
        assert!(!coordinator.pending_snapshot().await.unwrap().contains(-10));
    }

    #[tokio::test]
    async fn test_shared_stamp_committed_on_every_chronology() {
        let (coordinator, stamps) = setup();
        let seq = pending_stamp(&stamps, EDITOR);
        for nid in [-10, -11] {
            coordinator
                .submit_write(concept_with(nid, seq), true)
                .await
                .unwrap()
                .wait()
                .await
                .unwrap();
        }

        let record = coordinator
            .commit_chronology(-10, EDITOR, None)
            .wait()
            .await
            .unwrap()
            .record
            .expect("committed");
        assert_eq!(record.concept_nids.to_vec(), vec![-11, -10]);
        assert!(!coordinator.store().get(-11).unwrap().unwrap().has_uncommitted());
        assert!(coordinator.pending_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_persists_bookkeeping() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(MemoryChronologyStore::new(Uuid::new_v4()));
        let stamps = Arc::new(StampStore::new());
        let coordinator = CommitCoordinator::builder(store, stamps.clone())
            .data_dir(dir.path())
            .start();

        let seq = pending_stamp(&stamps, EDITOR);
        coordinator
            .submit_write(concept_with(-10, seq), true)
            .await
            .unwrap();
        coordinator.sync().await.unwrap();

        let (sequence, sets) = crate::pending::read_commit_manager_file(dir.path()).unwrap();
        assert_eq!(sequence, 1);
        assert!(sets.contains(-10));
        coordinator.shutdown().await.unwrap();
    }
}
