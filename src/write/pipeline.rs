//! Bounded write-and-check pipeline
//!
//! `submit_write` waits for one of N permits before it returns: when the
//! pool is saturated callers are held back rather than rejected. The write
//! itself runs on a spawned task that owns the permit and releases it when
//! the task ends, whatever the outcome.
//!
//! Task steps:
//! 1. Persist the chronology (the store merges versions)
//! 2. Run ADD_UNCOMMITTED checkers on the merged chronology
//! 3. Update pending bookkeeping (a bucket, or the owning transaction)
//!    and settle versions whose stamp a commit finalized meanwhile
//! 4. Bump the database sequence and notify change listeners
//! 5. Fail with `CheckFailed` if any alert blocks
//!
//! A rejected chronology stays persisted and pending, so the next commit
//! re-checks it and refuses it until it is fixed or canceled.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;

use super::drain::{spawn_drainer, Completion};
use super::errors::{WriteError, WriteResult};
use super::handle::{WriteHandle, WriteStage, WriteSummary};
use super::tracker::InFlight;
use crate::checker::{any_blocking, CheckContext, CheckPhase, CheckerMode, CheckerRegistry};
use crate::chronology::{Chronology, CommitState};
use crate::collaborators::{ChronologyStore, StoreResult};
use crate::listener::Listeners;
use crate::pending::{BucketKey, PendingBuckets};
use crate::stamp::{StampSequence, StampService};
use crate::transaction::Transaction;

/// Default number of concurrent write tasks.
pub const DEFAULT_WRITE_PERMITS: usize = 40;

/// Shared state every write task needs.
#[derive(Clone)]
pub(crate) struct WriteContext {
    pub store: Arc<dyn ChronologyStore>,
    pub stamps: Arc<dyn StampService>,
    pub checkers: Arc<CheckerRegistry>,
    pub buckets: PendingBuckets,
    pub listeners: Arc<Listeners>,
    pub database_sequence: Arc<AtomicI64>,
    pub in_flight: InFlight,
}

impl WriteContext {
    /// Stamps of `chronology`'s uncommitted versions that already carry a
    /// commit time.
    pub(crate) fn finalized_stamps(&self, chronology: &Chronology) -> BTreeSet<StampSequence> {
        chronology
            .uncommitted_versions()
            .map(|v| v.stamp_sequence)
            .filter(|seq| {
                self.stamps
                    .stamp(*seq)
                    .is_some_and(|stamp| !stamp.is_uncommitted())
            })
            .collect()
    }

    /// Mark the uncommitted versions of `chronology` whose stamp is
    /// finalized as committed and store them.
    ///
    /// Returns the chronology as stored afterwards with the stamps whose
    /// versions were marked, or `None` if nothing needed marking.
    pub(crate) fn settle(
        &self,
        chronology: &Chronology,
    ) -> StoreResult<Option<(Chronology, BTreeSet<StampSequence>)>> {
        let finalized = self.finalized_stamps(chronology);
        if finalized.is_empty() {
            return Ok(None);
        }
        let mut marked = chronology.clone();
        marked.set_commit_state(&finalized, CommitState::Committed);
        marked.retain_versions(|v| finalized.contains(&v.stamp_sequence));
        self.store.put(&marked)?;

        let mut settled = chronology.clone();
        settled.merge(&marked);
        Ok(Some((settled, finalized)))
    }
}

/// Where a write's pending edits are tracked.
#[derive(Clone)]
pub(crate) enum WriteTarget {
    Pending { with_checks: bool },
    Transaction(Arc<Transaction>),
}

pub struct WritePipeline {
    ctx: WriteContext,
    permits: Arc<Semaphore>,
    capacity: usize,
    completions: mpsc::UnboundedSender<Completion>,
}

impl WritePipeline {
    /// Build the pipeline and start its completion drainer.
    pub(crate) fn start(ctx: WriteContext, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let drainer = spawn_drainer(rx);
        let pipeline = Self {
            ctx,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            completions: tx,
        };
        (pipeline, drainer)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held by a write task.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop accepting writes. Tasks already running finish normally.
    pub fn close(&self) {
        self.permits.close();
    }

    pub(crate) async fn submit(
        &self,
        chronology: Chronology,
        target: WriteTarget,
    ) -> WriteResult<WriteHandle> {
        let nid = chronology.nid();
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| WriteError::Closed)?;
        tracing::trace!(nid, available = self.permits.available_permits(), "write accepted");

        let (result_tx, result_rx) = tokio::sync::oneshot::channel();
        let (progress_tx, progress_rx) = watch::channel(WriteStage::Queued);
        let guard = self.ctx.in_flight.enter();
        let ctx = self.ctx.clone();

        let task = tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            let outcome = run_write(&ctx, chronology, &target, &progress_tx).await;
            progress_tx.send_replace(match outcome {
                Ok(_) => WriteStage::Complete,
                Err(_) => WriteStage::Failed,
            });
            let _ = result_tx.send(outcome.clone());
            outcome
        });

        if self.completions.send(Completion { nid, task }).is_err() {
            tracing::warn!(nid, "write completion drainer is gone");
        }
        Ok(WriteHandle::new(nid, result_rx, progress_rx))
    }
}

async fn run_write(
    ctx: &WriteContext,
    chronology: Chronology,
    target: &WriteTarget,
    progress: &watch::Sender<WriteStage>,
) -> WriteResult<WriteSummary> {
    let nid = chronology.nid();

    progress.send_replace(WriteStage::Persisting);
    ctx.store.put(&chronology)?;
    let merged = ctx.store.get(nid)?.unwrap_or_else(|| chronology.clone());

    let (check, context) = match target {
        WriteTarget::Pending { with_checks } => {
            (*with_checks, CheckContext::new(ctx.stamps.as_ref()))
        }
        WriteTarget::Transaction(txn) => (
            txn.checker_mode() == CheckerMode::Active,
            CheckContext::for_transaction(ctx.stamps.as_ref(), txn.id()),
        ),
    };
    let alerts = if check {
        progress.send_replace(WriteStage::Checking);
        ctx.checkers.run(&merged, CheckPhase::AddUncommitted, &context)
    } else {
        Vec::new()
    };

    progress.send_replace(WriteStage::Recording);
    match target {
        WriteTarget::Pending { with_checks } => {
            if merged.has_uncommitted() {
                let key = BucketKey::new(merged.object_type(), *with_checks);
                ctx.buckets.record(nid, key).await?;
                // A commit may have finalized this write's stamp before the
                // nid reached a bucket.
                if let Some(stored) = ctx.store.get(nid)? {
                    if let Some((settled, _)) = ctx.settle(&stored)? {
                        if !settled.has_uncommitted() {
                            ctx.buckets.remove(nid).await?;
                        }
                    }
                }
            } else {
                ctx.buckets.remove(nid).await?;
            }
        }
        WriteTarget::Transaction(txn) => {
            txn.record_write(&chronology)?;
        }
    }

    let write_sequence = ctx.database_sequence.fetch_add(1, Ordering::SeqCst) + 1;
    ctx.listeners.notify_change(&merged);

    if any_blocking(&alerts) {
        return Err(WriteError::CheckFailed { nid, alerts });
    }
    Ok(WriteSummary {
        nid,
        write_sequence,
        alerts,
    })
}
