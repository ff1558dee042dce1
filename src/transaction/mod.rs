//! Transaction model
//!
//! A transaction is an explicit unit of work, independent of the pending
//! buckets. It is split into per-path scopes, each owning stamp sequences
//! and affected component nids.
//!
//! State machine:
//! - `Open`: stamps and components accumulate
//! - `Ready`: the last `ready_to_commit` passed and nothing changed since;
//!   any new stamp, component or write returns it to `Open`
//! - `Committed`: stamps finalized, terminal
//! - `Canceled`: stamps discarded, terminal

mod errors;
mod path;
mod unit;

pub use errors::{TransactionError, TransactionResult};
pub use path::TransactionForPath;
pub use unit::Transaction;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Open,
    Ready,
    Committed,
    Canceled,
}

impl TransactionState {
    /// Neither committed nor canceled.
    pub fn is_active(self) -> bool {
        matches!(self, TransactionState::Open | TransactionState::Ready)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Open => write!(f, "open"),
            TransactionState::Ready => write!(f, "ready"),
            TransactionState::Committed => write!(f, "committed"),
            TransactionState::Canceled => write!(f, "canceled"),
        }
    }
}

/// Transactions opened and not yet committed or canceled.
#[derive(Debug, Default)]
pub struct PendingTransactions {
    open: RwLock<HashMap<Uuid, Arc<Transaction>>>,
}

impl PendingTransactions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, transaction: Arc<Transaction>) {
        self.open
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(transaction.id(), transaction);
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<Transaction>> {
        self.open
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Transaction>> {
        self.open
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.open
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.open.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
