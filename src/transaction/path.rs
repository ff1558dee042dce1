//! Per-path scope of a transaction

use std::collections::BTreeSet;

use crate::nid::{Nid, NidSet};
use crate::stamp::StampSequence;

/// The stamps and components a transaction holds on one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionForPath {
    path: Nid,
    stamps: BTreeSet<StampSequence>,
    components: NidSet,
}

impl TransactionForPath {
    pub fn new(path: Nid) -> Self {
        Self {
            path,
            stamps: BTreeSet::new(),
            components: NidSet::new(),
        }
    }

    pub fn path(&self) -> Nid {
        self.path
    }

    pub fn stamps(&self) -> &BTreeSet<StampSequence> {
        &self.stamps
    }

    pub fn components(&self) -> &NidSet {
        &self.components
    }

    pub fn owns_stamp(&self, stamp: StampSequence) -> bool {
        self.stamps.contains(&stamp)
    }

    pub(crate) fn add_stamp(&mut self, stamp: StampSequence) {
        self.stamps.insert(stamp);
    }

    pub(crate) fn add_component(&self, nid: Nid) -> bool {
        self.components.add(nid)
    }
}
