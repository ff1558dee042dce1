//! Stamp numbering service
//!
//! Interns stamp tuples to sequences, tracks which sequences are still
//! pending, and finalizes pending sequences at commit. A finalized sequence
//! keeps its number: versions that reference it see the committed tuple
//! without being rewritten.
//!
//! Uncommitted stamps are interned per owning transaction. The per-author
//! pending view used by global and single-chronology commits only contains
//! stamps that no transaction owns.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::alias::StampAliasMap;
use super::comment::StampCommentMap;
use super::errors::{StampError, StampResult};
use super::{Stamp, StampSequence};
use crate::nid::Nid;

/// File holding the alias table
pub const STAMP_ALIAS_FILE: &str = "stamp-alias.map";
/// File holding the comment table
pub const STAMP_COMMENT_FILE: &str = "stamp-comment.map";

/// A pending stamp as handed out to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingStamp {
    pub sequence: StampSequence,
    pub stamp: Stamp,
    pub transaction: Option<Uuid>,
}

/// What finalizing a pending sequence did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    /// The sequence now names the committed tuple.
    Committed,
    /// The committed tuple already had a sequence; this one became its alias.
    AliasOf(StampSequence),
    /// The sequence was unknown or already committed.
    NotPending,
}

/// Stamp numbering, alias and comment operations.
///
/// None of these operations fail; unknown sequences yield empty results.
pub trait StampService: Send + Sync {
    /// Intern a tuple. Identical tuples share one sequence.
    fn stamp_sequence(&self, stamp: Stamp) -> StampSequence;

    /// Intern an uncommitted tuple owned by a transaction.
    fn transaction_stamp_sequence(&self, stamp: Stamp, transaction: Uuid) -> StampSequence;

    fn stamp(&self, sequence: StampSequence) -> Option<Stamp>;

    fn is_uncommitted(&self, sequence: StampSequence) -> bool {
        self.stamp(sequence).map(|s| s.is_uncommitted()).unwrap_or(false)
    }

    /// Pending stamps of `author` that no transaction owns.
    fn pending_stamps_for_author(&self, author: Nid) -> Vec<PendingStamp>;

    /// Remove and return the pending stamps of `author` that no transaction
    /// owns. Writes arriving meanwhile get fresh sequences.
    fn take_pending_stamps_for_author(&self, author: Nid) -> Vec<PendingStamp>;

    /// Return stamps obtained from `take_pending_stamps_for_author`.
    fn restore_pending_stamps(&self, stamps: Vec<PendingStamp>);

    /// Replace the uncommitted time of `sequence` with `commit_time`.
    fn finalize(&self, sequence: StampSequence, commit_time: i64) -> Finalized;

    /// Drop an uncommitted sequence from the pending set.
    fn cancel(&self, sequence: StampSequence) -> bool;

    fn add_alias(&self, stamp: StampSequence, alias: StampSequence);

    /// Closure over alias links, excluding `stamp` itself.
    fn resolve_aliases(&self, stamp: StampSequence) -> BTreeSet<StampSequence>;

    fn set_comment(&self, stamp: StampSequence, comment: Option<String>);

    fn get_comment(&self, stamp: StampSequence) -> Option<String>;

    /// Flush the alias and comment tables into `dir`.
    fn persist_side_tables(&self, _dir: &Path) -> StampResult<()> {
        Ok(())
    }

    /// Load the alias and comment tables from `dir`.
    fn load_side_tables(&self, _dir: &Path) -> StampResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StampTables {
    /// Index is `sequence - 1`.
    stamps: Vec<Stamp>,
    committed: HashMap<Stamp, StampSequence>,
    uncommitted: HashMap<(Stamp, Option<Uuid>), StampSequence>,
    /// Pending sequences and their owning transaction.
    pending: BTreeMap<StampSequence, Option<Uuid>>,
}

impl StampTables {
    fn get(&self, sequence: StampSequence) -> Option<Stamp> {
        if sequence < 1 {
            return None;
        }
        self.stamps.get(sequence as usize - 1).copied()
    }

    fn push(&mut self, stamp: Stamp) -> StampSequence {
        self.stamps.push(stamp);
        self.stamps.len() as StampSequence
    }

    fn intern(&mut self, stamp: Stamp, transaction: Option<Uuid>) -> StampSequence {
        if stamp.is_uncommitted() {
            if let Some(&seq) = self.uncommitted.get(&(stamp, transaction)) {
                return seq;
            }
            let seq = self.push(stamp);
            self.uncommitted.insert((stamp, transaction), seq);
            self.pending.insert(seq, transaction);
            seq
        } else {
            if let Some(&seq) = self.committed.get(&stamp) {
                return seq;
            }
            let seq = self.push(stamp);
            self.committed.insert(stamp, seq);
            seq
        }
    }

    fn forget_uncommitted(&mut self, sequence: StampSequence, stamp: Stamp) -> Option<Uuid> {
        let transaction = self.pending.remove(&sequence).flatten();
        let key = (stamp, transaction);
        if self.uncommitted.get(&key) == Some(&sequence) {
            self.uncommitted.remove(&key);
        }
        transaction
    }
}

/// In-process stamp service with alias and comment side tables.
#[derive(Debug, Default)]
pub struct StampStore {
    tables: RwLock<StampTables>,
    aliases: StampAliasMap,
    comments: StampCommentMap,
}

impl StampStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StampTables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StampTables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of interned sequences.
    pub fn stamp_count(&self) -> usize {
        self.read().stamps.len()
    }

    /// Number of sequences still pending.
    pub fn pending_count(&self) -> usize {
        self.read().pending.len()
    }

    /// Human readable rendering of a sequence for logs.
    pub fn describe(&self, sequence: StampSequence) -> String {
        match self.stamp(sequence) {
            Some(stamp) => format!("{}:{}", sequence, stamp),
            None => format!("{}:<unknown>", sequence),
        }
    }

    pub fn aliases(&self) -> &StampAliasMap {
        &self.aliases
    }

    pub fn comments(&self) -> &StampCommentMap {
        &self.comments
    }
}

fn read_failed(path: &Path, source: std::io::Error) -> StampError {
    StampError::ReadFailed {
        path: path.to_path_buf(),
        source,
    }
}

/// Write through a temporary file, fsync, then rename over the target.
fn write_table<F>(path: &Path, write: F) -> StampResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let tmp: PathBuf = path.with_extension("tmp");
    let failed = |source| StampError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(&tmp).map_err(failed)?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).map_err(failed)?;
    writer.flush().map_err(failed)?;
    writer.get_ref().sync_all().map_err(failed)?;
    fs::rename(&tmp, path).map_err(failed)?;
    Ok(())
}

impl StampService for StampStore {
    fn stamp_sequence(&self, stamp: Stamp) -> StampSequence {
        self.write().intern(stamp, None)
    }

    fn transaction_stamp_sequence(&self, stamp: Stamp, transaction: Uuid) -> StampSequence {
        self.write().intern(stamp, Some(transaction))
    }

    fn stamp(&self, sequence: StampSequence) -> Option<Stamp> {
        self.read().get(sequence)
    }

    fn pending_stamps_for_author(&self, author: Nid) -> Vec<PendingStamp> {
        let tables = self.read();
        tables
            .pending
            .iter()
            .filter(|(_, txn)| txn.is_none())
            .filter_map(|(&sequence, _)| {
                let stamp = tables.get(sequence)?;
                (stamp.author == author).then_some(PendingStamp {
                    sequence,
                    stamp,
                    transaction: None,
                })
            })
            .collect()
    }

    fn take_pending_stamps_for_author(&self, author: Nid) -> Vec<PendingStamp> {
        let mut tables = self.write();
        let taken: Vec<PendingStamp> = tables
            .pending
            .iter()
            .filter(|(_, txn)| txn.is_none())
            .filter_map(|(&sequence, _)| {
                let stamp = tables.get(sequence)?;
                (stamp.author == author).then_some(PendingStamp {
                    sequence,
                    stamp,
                    transaction: None,
                })
            })
            .collect();

        for pending in &taken {
            tables.forget_uncommitted(pending.sequence, pending.stamp);
        }
        taken
    }

    fn restore_pending_stamps(&self, stamps: Vec<PendingStamp>) {
        let mut tables = self.write();
        for pending in stamps {
            if !tables.get(pending.sequence).is_some_and(|s| s.is_uncommitted()) {
                continue;
            }
            tables.pending.insert(pending.sequence, pending.transaction);
            // A write that arrived meanwhile may own the tuple now; keep it.
            tables
                .uncommitted
                .entry((pending.stamp, pending.transaction))
                .or_insert(pending.sequence);
        }
    }

    fn finalize(&self, sequence: StampSequence, commit_time: i64) -> Finalized {
        let mut tables = self.write();
        let stamp = match tables.get(sequence) {
            Some(stamp) if stamp.is_uncommitted() => stamp,
            _ => return Finalized::NotPending,
        };

        tables.forget_uncommitted(sequence, stamp);
        let committed = stamp.with_time(commit_time);
        tables.stamps[sequence as usize - 1] = committed;

        let existing = tables.committed.get(&committed).copied();
        match existing {
            Some(existing) if existing != sequence => {
                drop(tables);
                self.aliases.add_alias(existing, sequence);
                Finalized::AliasOf(existing)
            }
            _ => {
                tables.committed.insert(committed, sequence);
                Finalized::Committed
            }
        }
    }

    fn cancel(&self, sequence: StampSequence) -> bool {
        let mut tables = self.write();
        match tables.get(sequence) {
            Some(stamp) if stamp.is_uncommitted() => {
                let was_pending = tables.pending.contains_key(&sequence);
                tables.forget_uncommitted(sequence, stamp);
                was_pending
            }
            _ => false,
        }
    }

    fn add_alias(&self, stamp: StampSequence, alias: StampSequence) {
        self.aliases.add_alias(stamp, alias);
    }

    fn resolve_aliases(&self, stamp: StampSequence) -> BTreeSet<StampSequence> {
        self.aliases.resolve(stamp)
    }

    fn set_comment(&self, stamp: StampSequence, comment: Option<String>) {
        self.comments.set(stamp, comment);
    }

    fn get_comment(&self, stamp: StampSequence) -> Option<String> {
        self.comments.get(stamp)
    }

    fn persist_side_tables(&self, dir: &Path) -> StampResult<()> {
        let alias_path = dir.join(STAMP_ALIAS_FILE);
        write_table(&alias_path, |w| self.aliases.write_to(w))?;

        let comment_path = dir.join(STAMP_COMMENT_FILE);
        write_table(&comment_path, |w| self.comments.write_to(w))?;
        Ok(())
    }

    /// Missing files load as empty tables.
    fn load_side_tables(&self, dir: &Path) -> StampResult<()> {
        let alias_path = dir.join(STAMP_ALIAS_FILE);
        if alias_path.exists() {
            let file = File::open(&alias_path).map_err(|e| read_failed(&alias_path, e))?;
            self.aliases
                .read_from(&mut BufReader::new(file))
                .map_err(|e| read_failed(&alias_path, e))?;
        }

        let comment_path = dir.join(STAMP_COMMENT_FILE);
        if comment_path.exists() {
            let file = File::open(&comment_path).map_err(|e| read_failed(&comment_path, e))?;
            self.comments
                .read_from(&mut BufReader::new(file))
                .map_err(|e| read_failed(&comment_path, e))?;
        }
        Ok(())
    }
}
