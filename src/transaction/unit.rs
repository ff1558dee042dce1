//! Transaction - a path-scoped unit of work
//!
//! Stamps and component nids accumulate per path while the transaction is
//! open. `ready_to_commit` can be called any number of times: it runs
//! checkers, appends to the caller's alert list, and moves the transaction
//! to `Ready` when nothing blocks.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinSet;
use uuid::Uuid;

use super::errors::{TransactionError, TransactionResult};
use super::path::TransactionForPath;
use super::TransactionState;
use crate::checker::{any_blocking, Alert, CheckContext, CheckPhase, CheckerMode, CheckerRegistry};
use crate::chronology::Chronology;
use crate::collaborators::ChronologyStore;
use crate::nid::{Nid, NidSet};
use crate::stamp::{Stamp, StampSequence, StampService, Status};

#[derive(Debug)]
struct TransactionInner {
    state: TransactionState,
    /// Bumped on every change to stamps or components.
    revision: u64,
    paths: BTreeMap<Nid, TransactionForPath>,
}

impl TransactionInner {
    fn changed(&mut self) {
        self.revision += 1;
        self.state = TransactionState::Open;
    }
}

pub struct Transaction {
    id: Uuid,
    name: String,
    checker_mode: CheckerMode,
    stamps: Arc<dyn StampService>,
    inner: Mutex<TransactionInner>,
}

impl Transaction {
    pub fn new(name: impl Into<String>, checker_mode: CheckerMode, stamps: Arc<dyn StampService>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            checker_mode,
            stamps,
            inner: Mutex::new(TransactionInner {
                state: TransactionState::Open,
                revision: 0,
                paths: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TransactionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open_guard(&self) -> TransactionResult<MutexGuard<'_, TransactionInner>> {
        let inner = self.lock();
        if !inner.state.is_active() {
            return Err(TransactionError::NotOpen {
                id: self.id,
                state: inner.state,
            });
        }
        Ok(inner)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn checker_mode(&self) -> CheckerMode {
        self.checker_mode
    }

    pub fn state(&self) -> TransactionState {
        self.lock().state
    }

    /// True while the transaction is `Open` or `Ready`.
    pub fn is_open(&self) -> bool {
        self.state().is_active()
    }

    /// Uncommitted stamp owned by this transaction on `path`.
    pub fn get_stamp(
        &self,
        status: Status,
        author: Nid,
        module: Nid,
        path: Nid,
    ) -> TransactionResult<StampSequence> {
        let mut inner = self.open_guard()?;
        let sequence = self
            .stamps
            .transaction_stamp_sequence(Stamp::uncommitted(status, author, module, path), self.id);
        inner.changed();
        inner
            .paths
            .entry(path)
            .or_insert_with(|| TransactionForPath::new(path))
            .add_stamp(sequence);
        Ok(sequence)
    }

    /// Record `nid` as a component touched on `path`.
    pub fn add_component(&self, path: Nid, nid: Nid) -> TransactionResult<()> {
        let mut inner = self.open_guard()?;
        inner.changed();
        inner
            .paths
            .entry(path)
            .or_insert_with(|| TransactionForPath::new(path))
            .add_component(nid);
        Ok(())
    }

    /// Register `chronology` under every path owning one of its uncommitted
    /// versions. Returns the number of versions matched.
    pub fn record_write(&self, chronology: &Chronology) -> TransactionResult<usize> {
        let mut inner = self.open_guard()?;
        inner.changed();
        let mut matched = 0;
        for version in chronology.uncommitted_versions() {
            if let Some(scope) = inner
                .paths
                .values()
                .find(|scope| scope.owns_stamp(version.stamp_sequence))
            {
                scope.add_component(chronology.nid());
                matched += 1;
            }
        }
        Ok(matched)
    }

    pub fn paths(&self) -> Vec<Nid> {
        self.lock().paths.keys().copied().collect()
    }

    pub fn for_path(&self, path: Nid) -> Option<TransactionForPath> {
        self.lock().paths.get(&path).cloned()
    }

    /// Every stamp across all paths.
    pub fn stamp_sequences(&self) -> BTreeSet<StampSequence> {
        self.lock()
            .paths
            .values()
            .flat_map(|scope| scope.stamps().iter().copied())
            .collect()
    }

    /// Every component across all paths.
    pub fn components(&self) -> NidSet {
        let all = NidSet::new();
        for scope in self.lock().paths.values() {
            all.or(scope.components());
        }
        all
    }

    /// Run commit checkers over every component, fanned out per path.
    ///
    /// Returns true when no alert blocks. With `CheckerMode::Off` nothing is
    /// checked and the transaction is always ready. A passing check moves the
    /// transaction to `Ready` unless it changed while checkers ran.
    pub async fn ready_to_commit(
        &self,
        checkers: &Arc<CheckerRegistry>,
        store: &Arc<dyn ChronologyStore>,
        alerts: &mut Vec<Alert>,
    ) -> TransactionResult<bool> {
        let (scopes, revision): (Vec<TransactionForPath>, u64) = {
            let inner = self.open_guard()?;
            (inner.paths.values().cloned().collect(), inner.revision)
        };
        if self.checker_mode == CheckerMode::Off {
            self.mark_ready(revision)?;
            return Ok(true);
        }

        let mut scheduled = HashSet::new();
        let mut tasks = JoinSet::new();
        for scope in &scopes {
            for nid in scope.components().to_vec() {
                if !scheduled.insert(nid) {
                    continue;
                }
                let checkers = Arc::clone(checkers);
                let store = Arc::clone(store);
                let stamps = Arc::clone(&self.stamps);
                let id = self.id;
                tasks.spawn_blocking(move || -> TransactionResult<Vec<Alert>> {
                    let Some(chronology) = store.get(nid)? else {
                        return Ok(Vec::new());
                    };
                    let context = CheckContext::for_transaction(stamps.as_ref(), id);
                    Ok(checkers.run(&chronology, CheckPhase::Commit, &context))
                });
            }
        }

        let mut found = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| TransactionError::CheckerTask {
                id: self.id,
                message: e.to_string(),
            })?;
            found.extend(result?);
        }
        found.sort_by_key(|alert| alert.nid);

        let ready = !any_blocking(&found);
        alerts.extend(found);
        if ready {
            self.mark_ready(revision)?;
        }
        Ok(ready)
    }

    fn mark_ready(&self, revision: u64) -> TransactionResult<()> {
        let mut inner = self.open_guard()?;
        if inner.revision == revision {
            inner.state = TransactionState::Ready;
        }
        Ok(())
    }

    pub(crate) fn mark(&self, state: TransactionState) -> TransactionResult<()> {
        let mut inner = self.open_guard()?;
        inner.state = state;
        Ok(())
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("checker_mode", &self.checker_mode)
            .field("state", &self.state())
            .finish()
    }
}
