//! Checker registry
//!
//! Checkers are registered and unregistered at any time. They run in no
//! particular order: callers must not rely on one checker observing the
//! effect of another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::alert::{Alert, CheckPhase};
use super::defaults::{DescriptionVersionChecker, SingleUncommittedVersionChecker};
use crate::chronology::Chronology;
use crate::stamp::StampService;

/// What a checker can see besides the chronology itself.
pub struct CheckContext<'a> {
    pub stamps: &'a dyn StampService,
    /// Transaction the check runs under, if any.
    pub transaction: Option<Uuid>,
}

impl<'a> CheckContext<'a> {
    pub fn new(stamps: &'a dyn StampService) -> Self {
        Self {
            stamps,
            transaction: None,
        }
    }

    pub fn for_transaction(stamps: &'a dyn StampService, transaction: Uuid) -> Self {
        Self {
            stamps,
            transaction: Some(transaction),
        }
    }
}

/// A validation hook.
pub trait ChangeChecker: Send + Sync {
    fn name(&self) -> &str;

    /// Zero or one alert for `chronology` at `phase`.
    fn check(
        &self,
        chronology: &Chronology,
        phase: CheckPhase,
        context: &CheckContext<'_>,
    ) -> Option<Alert>;
}

/// Handle returned by [`CheckerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheckerId(u64);

#[derive(Default)]
pub struct CheckerRegistry {
    next_id: AtomicU64,
    checkers: RwLock<HashMap<CheckerId, Arc<dyn ChangeChecker>>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the two mandatory checkers.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(SingleUncommittedVersionChecker));
        registry.register(Arc::new(DescriptionVersionChecker));
        registry
    }

    pub fn register(&self, checker: Arc<dyn ChangeChecker>) -> CheckerId {
        let id = CheckerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.checkers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, checker);
        id
    }

    pub fn unregister(&self, id: CheckerId) -> bool {
        self.checkers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.checkers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of the registered checkers.
    pub fn snapshot(&self) -> Vec<Arc<dyn ChangeChecker>> {
        self.checkers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Run every checker against `chronology`.
    pub fn run(
        &self,
        chronology: &Chronology,
        phase: CheckPhase,
        context: &CheckContext<'_>,
    ) -> Vec<Alert> {
        let alerts: Vec<Alert> = self
            .snapshot()
            .iter()
            .filter_map(|checker| checker.check(chronology, phase, context))
            .collect();

        for alert in &alerts {
            tracing::debug!(
                nid = chronology.nid(),
                checker = %alert.checker,
                severity = alert.severity.as_str(),
                "checker alert: {}",
                alert.message
            );
        }
        alerts
    }
}
