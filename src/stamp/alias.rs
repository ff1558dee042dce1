//! Stamp alias table
//!
//! An alias records that one stamp sequence stands for the same content as
//! another, committed again later. The table is bidirectional; resolution
//! walks forward and reverse links to a fixed point.
//!
//! Binary format (`stamp-alias.map`, little endian):
//! - pair count (u32)
//! - pair count × (stamp i32, alias i32)

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::StampSequence;

#[derive(Debug, Default)]
struct AliasTables {
    forward: BTreeMap<StampSequence, BTreeSet<StampSequence>>,
    reverse: BTreeMap<StampSequence, BTreeSet<StampSequence>>,
}

/// Bidirectional stamp alias map guarded by a read-write lock.
#[derive(Debug, Default)]
pub struct StampAliasMap {
    tables: RwLock<AliasTables>,
}

impl StampAliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, AliasTables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AliasTables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record that `alias` stands for `stamp`.
    pub fn add_alias(&self, stamp: StampSequence, alias: StampSequence) {
        if stamp == alias {
            return;
        }
        let mut tables = self.write();
        tables.forward.entry(stamp).or_default().insert(alias);
        tables.reverse.entry(alias).or_default().insert(stamp);
    }

    /// Every sequence reachable from `stamp` through alias links in either
    /// direction, excluding `stamp` itself.
    pub fn resolve(&self, stamp: StampSequence) -> BTreeSet<StampSequence> {
        let tables = self.read();
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([stamp]);
        seen.insert(stamp);

        while let Some(current) = queue.pop_front() {
            let linked = tables
                .forward
                .get(&current)
                .into_iter()
                .chain(tables.reverse.get(&current))
                .flatten();
            for &next in linked {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        seen.remove(&stamp);
        seen
    }

    /// Number of alias pairs.
    pub fn len(&self) -> usize {
        self.read().forward.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let pairs: Vec<(StampSequence, StampSequence)> = {
            let tables = self.read();
            tables
                .forward
                .iter()
                .flat_map(|(&stamp, aliases)| aliases.iter().map(move |&alias| (stamp, alias)))
                .collect()
        };

        writer.write_all(&(pairs.len() as u32).to_le_bytes())?;
        for (stamp, alias) in pairs {
            writer.write_all(&stamp.to_le_bytes())?;
            writer.write_all(&alias.to_le_bytes())?;
        }
        Ok(())
    }

    /// Merge pairs written by [`StampAliasMap::write_to`] into this map.
    pub fn read_from<R: Read>(&self, reader: &mut R) -> io::Result<usize> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        let count = u32::from_le_bytes(buf) as usize;

        for _ in 0..count {
            reader.read_exact(&mut buf)?;
            let stamp = i32::from_le_bytes(buf);
            reader.read_exact(&mut buf)?;
            let alias = i32::from_le_bytes(buf);
            self.add_alias(stamp, alias);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_stamp_resolves_empty() {
        let map = StampAliasMap::new();
        assert!(map.resolve(42).is_empty());
    }

    #[test]
    fn test_chain_closure() {
        let map = StampAliasMap::new();
        map.add_alias(1, 2);
        map.add_alias(2, 3);

        assert_eq!(map.resolve(1), BTreeSet::from([2, 3]));
        assert_eq!(map.resolve(3), BTreeSet::from([1, 2]));
        assert_eq!(map.resolve(2), BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_cycle_terminates() {
        let map = StampAliasMap::new();
        map.add_alias(1, 2);
        map.add_alias(2, 1);
        assert_eq!(map.resolve(1), BTreeSet::from([2]));
    }

    #[test]
    fn test_self_alias_ignored() {
        let map = StampAliasMap::new();
        map.add_alias(7, 7);
        assert!(map.is_empty());
    }

    #[test]
    fn test_binary_form() {
        let map = StampAliasMap::new();
        map.add_alias(1, 2);
        map.add_alias(1, 5);
        map.add_alias(9, 10);

        let mut buf = Vec::new();
        map.write_to(&mut buf).unwrap();

        let loaded = StampAliasMap::new();
        assert_eq!(loaded.read_from(&mut buf.as_slice()).unwrap(), 3);
        assert_eq!(loaded.resolve(1), BTreeSet::from([2, 5]));
        assert_eq!(loaded.resolve(10), BTreeSet::from([9]));
    }
}
