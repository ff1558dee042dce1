//! Commit scopes
//!
//! One commit routine serves every granularity. The scope value decides
//! what a commit gathers, how it is validated, and how a rejected attempt
//! is undone:
//! - `Global`: every pending bucket, and the editor's pending stamps
//! - `Chronology`: one object, and only the editor's versions on it
//! - `Transaction`: every path of one transaction

use std::collections::BTreeSet;
use std::sync::Arc;

use super::errors::CommitResult;
use crate::checker::{Alert, CheckContext, CheckPhase};
use crate::nid::Nid;
use crate::pending::PendingSets;
use crate::stamp::{PendingStamp, StampSequence};
use crate::transaction::{Transaction, TransactionError};
use crate::write::WriteContext;

#[derive(Clone)]
pub enum CommitScope {
    /// Everything pending outside transactions, finalizing `editor`'s stamps.
    Global { editor: Nid },
    /// `editor`'s pending versions on one chronology.
    Chronology { nid: Nid, editor: Nid },
    Transaction(Arc<Transaction>),
}

/// Work a scope collected for one commit attempt.
#[derive(Debug, Default)]
pub(crate) struct Gathered {
    /// Stamps to finalize.
    pub stamps: BTreeSet<StampSequence>,
    /// Stamps taken from the stamp service, returned on revert.
    pub taken_stamps: Vec<PendingStamp>,
    /// Bucket entries taken from the live buckets, returned on revert.
    pub taken_buckets: PendingSets,
    /// Nids whose COMMIT checkers must pass.
    pub checked: Vec<Nid>,
    /// Nids whose versions may be committed.
    pub candidates: BTreeSet<Nid>,
}

impl CommitScope {
    pub fn global(editor: Nid) -> Self {
        CommitScope::Global { editor }
    }

    pub fn chronology(nid: Nid, editor: Nid) -> Self {
        CommitScope::Chronology { nid, editor }
    }

    pub fn transaction(transaction: Arc<Transaction>) -> Self {
        CommitScope::Transaction(transaction)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CommitScope::Global { .. } => "global",
            CommitScope::Chronology { .. } => "chronology",
            CommitScope::Transaction(_) => "transaction",
        }
    }

    pub(crate) async fn gather(&self, ctx: &WriteContext) -> CommitResult<Gathered> {
        match self {
            CommitScope::Global { editor } => {
                // Writes landing from here on go into fresh buckets.
                let taken_buckets = ctx.buckets.take_all().await?;
                let taken_stamps = ctx.stamps.take_pending_stamps_for_author(*editor);

                let mut checked = taken_buckets.concepts_with_checks.to_vec();
                checked.extend(taken_buckets.semantics_with_checks.to_vec());
                let candidates = taken_buckets
                    .buckets()
                    .iter()
                    .flat_map(|(_, set)| set.to_vec())
                    .collect();

                Ok(Gathered {
                    stamps: taken_stamps.iter().map(|p| p.sequence).collect(),
                    taken_stamps,
                    taken_buckets,
                    checked,
                    candidates,
                })
            }
            CommitScope::Chronology { nid, editor } => {
                let Some(chronology) = ctx.store.get(*nid)? else {
                    return Ok(Gathered::default());
                };
                let editor_pending: BTreeSet<StampSequence> = ctx
                    .stamps
                    .pending_stamps_for_author(*editor)
                    .into_iter()
                    .map(|p| p.sequence)
                    .collect();
                let stamps = chronology
                    .uncommitted_versions()
                    .map(|v| v.stamp_sequence)
                    .filter(|seq| editor_pending.contains(seq))
                    .collect();

                let taken_buckets = PendingSets::new();
                let with_checks = match ctx.buckets.remove(*nid).await? {
                    Some(key) => {
                        taken_buckets.record(*nid, key);
                        key.with_checks
                    }
                    None => true,
                };

                Ok(Gathered {
                    stamps,
                    taken_stamps: Vec::new(),
                    taken_buckets,
                    checked: if with_checks { vec![*nid] } else { Vec::new() },
                    candidates: BTreeSet::from([*nid]),
                })
            }
            CommitScope::Transaction(txn) => {
                if !txn.is_open() {
                    return Err(TransactionError::NotOpen {
                        id: txn.id(),
                        state: txn.state(),
                    }
                    .into());
                }
                Ok(Gathered {
                    stamps: txn.stamp_sequences(),
                    candidates: txn.components().to_vec().into_iter().collect(),
                    ..Gathered::default()
                })
            }
        }
    }

    /// Run COMMIT checkers over the gathered work.
    pub(crate) async fn validate(
        &self,
        ctx: &WriteContext,
        gathered: &Gathered,
    ) -> CommitResult<Vec<Alert>> {
        let mut alerts = Vec::new();
        match self {
            CommitScope::Transaction(txn) => {
                txn.ready_to_commit(&ctx.checkers, &ctx.store, &mut alerts)
                    .await?;
            }
            _ => {
                let context = CheckContext::new(ctx.stamps.as_ref());
                for nid in &gathered.checked {
                    if let Some(chronology) = ctx.store.get(*nid)? {
                        alerts.extend(ctx.checkers.run(&chronology, CheckPhase::Commit, &context));
                    }
                }
            }
        }
        Ok(alerts)
    }

    /// Put back everything `gather` took.
    pub(crate) async fn revert(&self, ctx: &WriteContext, gathered: Gathered) -> CommitResult<()> {
        if !gathered.taken_stamps.is_empty() {
            ctx.stamps.restore_pending_stamps(gathered.taken_stamps);
        }
        if !gathered.taken_buckets.is_empty() {
            ctx.buckets.restore(gathered.taken_buckets).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CommitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitScope::Global { editor } => f.debug_struct("Global").field("editor", editor).finish(),
            CommitScope::Chronology { nid, editor } => f
                .debug_struct("Chronology")
                .field("nid", nid)
                .field("editor", editor)
                .finish(),
            CommitScope::Transaction(txn) => f.debug_tuple("Transaction").field(&txn.id()).finish(),
        }
    }
}
