//! NidSet - concurrent ordered set of nids
//!
//! Used both as a transient tracker of pending work and as a persisted
//! snapshot. No operation fails: a poisoned lock is recovered, since every
//! mutation leaves the set structurally valid.
//!
//! Binary format (all little endian):
//! - count (u32)
//! - count × nid (i32), ascending

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Nid;

/// A thread-safe, ordered set of nids.
///
/// Iteration goes through [`NidSet::to_vec`], which copies the contents
/// under the read lock; callers never observe a set mid-mutation.
#[derive(Default)]
pub struct NidSet {
    inner: RwLock<BTreeSet<Nid>>,
}

impl NidSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeSet<Nid>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeSet<Nid>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a nid. Returns true if it was not already present.
    pub fn add(&self, nid: Nid) -> bool {
        self.write().insert(nid)
    }

    /// Removes a nid. Returns true if it was present.
    pub fn remove(&self, nid: Nid) -> bool {
        self.write().remove(&nid)
    }

    pub fn contains(&self, nid: Nid) -> bool {
        self.read().contains(&nid)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Union in place: every nid of `other` is added to `self`.
    pub fn or(&self, other: &NidSet) {
        // Snapshot first so `a.or(&a)` cannot deadlock.
        let incoming = other.to_vec();
        self.write().extend(incoming);
    }

    /// Difference in place: every nid of `other` is removed from `self`.
    pub fn and_not(&self, other: &NidSet) {
        let outgoing = other.to_vec();
        let mut guard = self.write();
        for nid in outgoing {
            guard.remove(&nid);
        }
    }

    /// Moves the contents out, leaving `self` empty.
    pub fn take(&self) -> NidSet {
        let taken = std::mem::take(&mut *self.write());
        NidSet {
            inner: RwLock::new(taken),
        }
    }

    /// Point-in-time copy of the contents in ascending order.
    pub fn to_vec(&self) -> Vec<Nid> {
        self.read().iter().copied().collect()
    }

    /// Write the set in its binary form.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let snapshot = self.to_vec();
        writer.write_all(&(snapshot.len() as u32).to_le_bytes())?;
        for nid in snapshot {
            writer.write_all(&nid.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read a set previously written with [`NidSet::write_to`].
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let count = u32::from_le_bytes(len_buf) as usize;

        let mut set = BTreeSet::new();
        let mut nid_buf = [0u8; 4];
        for _ in 0..count {
            reader.read_exact(&mut nid_buf)?;
            set.insert(i32::from_le_bytes(nid_buf));
        }
        Ok(Self {
            inner: RwLock::new(set),
        })
    }
}

impl Clone for NidSet {
    fn clone(&self) -> Self {
        Self {
            inner: RwLock::new(self.read().clone()),
        }
    }
}

impl PartialEq for NidSet {
    fn eq(&self, other: &Self) -> bool {
        self.to_vec() == other.to_vec()
    }
}

impl Eq for NidSet {}

impl fmt::Debug for NidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.to_vec()).finish()
    }
}

impl FromIterator<Nid> for NidSet {
    fn from_iter<T: IntoIterator<Item = Nid>>(iter: T) -> Self {
        Self {
            inner: RwLock::new(iter.into_iter().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_remove_contains() {
        let set = NidSet::new();
        assert!(set.add(-10));
        assert!(!set.add(-10));
        assert!(set.contains(-10));
        assert!(set.remove(-10));
        assert!(!set.remove(-10));
        assert!(set.is_empty());
    }

    #[test]
    fn test_or_and_not() {
        let a: NidSet = [-1, -2, -3].into_iter().collect();
        let b: NidSet = [-3, -4].into_iter().collect();

        a.or(&b);
        assert_eq!(a.to_vec(), vec![-4, -3, -2, -1]);

        a.and_not(&b);
        assert_eq!(a.to_vec(), vec![-2, -1]);
    }

    #[test]
    fn test_or_with_self_does_not_deadlock() {
        let a: NidSet = [-1, -2].into_iter().collect();
        a.or(&a);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_take_leaves_empty() {
        let a: NidSet = [-7, -8].into_iter().collect();
        let taken = a.take();
        assert!(a.is_empty());
        assert_eq!(taken.to_vec(), vec![-8, -7]);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let a: NidSet = [-1].into_iter().collect();
        let snapshot = a.to_vec();
        a.add(-2);
        assert_eq!(snapshot, vec![-1]);
    }

    #[test]
    fn test_binary_form() {
        let a: NidSet = [-100, -5, i32::MIN + 1].into_iter().collect();
        let mut buf = Vec::new();
        a.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 4 + 3 * 4);

        let b = NidSet::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_truncated_binary_form_is_error() {
        let a: NidSet = [-1, -2].into_iter().collect();
        let mut buf = Vec::new();
        a.write_to(&mut buf).unwrap();
        buf.truncate(buf.len() - 2);
        assert!(NidSet::read_from(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn test_concurrent_adds() {
        let set = Arc::new(NidSet::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let set = Arc::clone(&set);
                thread::spawn(move || {
                    for i in 0..100 {
                        set.add(-(t * 100 + i + 1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(set.len(), 800);
    }
}
