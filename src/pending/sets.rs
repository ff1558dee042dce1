//! The four pending buckets and their on-disk form
//!
//! `commit-manager.data` format:
//! - database sequence (i64 LE)
//! - concepts with checks, concepts without checks, semantics with checks,
//!   semantics without checks, each as a serialized NidSet

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::Serialize;

use super::errors::{PendingError, PendingResult};
use crate::nid::{Nid, NidSet, ObjectType};

/// File holding the pending buckets
pub const COMMIT_MANAGER_FILE: &str = "commit-manager.data";

/// Which of the four buckets a nid sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub object_type: ObjectType,
    pub with_checks: bool,
}

impl BucketKey {
    pub fn new(object_type: ObjectType, with_checks: bool) -> Self {
        Self {
            object_type,
            with_checks,
        }
    }
}

/// Identifiers waiting to be committed outside of any transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSets {
    pub concepts_with_checks: NidSet,
    pub concepts_no_checks: NidSet,
    pub semantics_with_checks: NidSet,
    pub semantics_no_checks: NidSet,
}

impl PendingSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(&self, key: BucketKey) -> &NidSet {
        match (key.object_type, key.with_checks) {
            (ObjectType::Concept, true) => &self.concepts_with_checks,
            (ObjectType::Concept, false) => &self.concepts_no_checks,
            (ObjectType::Semantic, true) => &self.semantics_with_checks,
            (ObjectType::Semantic, false) => &self.semantics_no_checks,
        }
    }

    /// Buckets in file order, with their keys.
    pub fn buckets(&self) -> [(BucketKey, &NidSet); 4] {
        [
            (BucketKey::new(ObjectType::Concept, true), &self.concepts_with_checks),
            (BucketKey::new(ObjectType::Concept, false), &self.concepts_no_checks),
            (BucketKey::new(ObjectType::Semantic, true), &self.semantics_with_checks),
            (BucketKey::new(ObjectType::Semantic, false), &self.semantics_no_checks),
        ]
    }

    /// Put `nid` in the bucket for `key`, moving it out of any other bucket.
    /// A nid already waiting with checks keeps them.
    pub fn record(&self, nid: Nid, key: BucketKey) {
        let checked = BucketKey::new(key.object_type, true);
        let key = if self.bucket(checked).contains(nid) {
            checked
        } else {
            key
        };
        for (other, set) in self.buckets() {
            if other != key {
                set.remove(nid);
            }
        }
        self.bucket(key).add(nid);
    }

    /// Remove `nid` from whichever bucket holds it.
    pub fn remove(&self, nid: Nid) -> Option<BucketKey> {
        let mut found = None;
        for (key, set) in self.buckets() {
            if set.remove(nid) && found.is_none() {
                found = Some(key);
            }
        }
        found
    }

    pub fn locate(&self, nid: Nid) -> Option<BucketKey> {
        self.buckets()
            .into_iter()
            .find(|(_, set)| set.contains(nid))
            .map(|(key, _)| key)
    }

    pub fn contains(&self, nid: Nid) -> bool {
        self.locate(nid).is_some()
    }

    /// Union every bucket of `other` into the matching bucket of `self`.
    pub fn merge(&self, other: &PendingSets) {
        for ((_, mine), (_, theirs)) in self.buckets().into_iter().zip(other.buckets()) {
            mine.or(theirs);
        }
    }

    /// Move every bucket out, leaving empty ones behind.
    pub fn take(&self) -> PendingSets {
        PendingSets {
            concepts_with_checks: self.concepts_with_checks.take(),
            concepts_no_checks: self.concepts_no_checks.take(),
            semantics_with_checks: self.semantics_with_checks.take(),
            semantics_no_checks: self.semantics_no_checks.take(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets().iter().all(|(_, set)| set.is_empty())
    }

    pub fn counts(&self) -> PendingCounts {
        PendingCounts {
            concepts_with_checks: self.concepts_with_checks.len(),
            concepts_no_checks: self.concepts_no_checks.len(),
            semantics_with_checks: self.semantics_with_checks.len(),
            semantics_no_checks: self.semantics_no_checks.len(),
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W, database_sequence: i64) -> io::Result<()> {
        writer.write_all(&database_sequence.to_le_bytes())?;
        for (_, set) in self.buckets() {
            set.write_to(writer)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<(i64, PendingSets)> {
        let mut seq_buf = [0u8; 8];
        reader.read_exact(&mut seq_buf)?;
        let database_sequence = i64::from_le_bytes(seq_buf);
        let sets = PendingSets {
            concepts_with_checks: NidSet::read_from(reader)?,
            concepts_no_checks: NidSet::read_from(reader)?,
            semantics_with_checks: NidSet::read_from(reader)?,
            semantics_no_checks: NidSet::read_from(reader)?,
        };
        Ok((database_sequence, sets))
    }
}

/// Bucket sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub concepts_with_checks: usize,
    pub concepts_no_checks: usize,
    pub semantics_with_checks: usize,
    pub semantics_no_checks: usize,
}

impl PendingCounts {
    pub fn total(&self) -> usize {
        self.concepts_with_checks
            + self.concepts_no_checks
            + self.semantics_with_checks
            + self.semantics_no_checks
    }
}

/// Write `commit-manager.data` into `dir` through a temporary file.
pub fn write_commit_manager_file(
    dir: &Path,
    database_sequence: i64,
    sets: &PendingSets,
) -> PendingResult<()> {
    let path = dir.join(COMMIT_MANAGER_FILE);
    let tmp = path.with_extension("tmp");
    let failed = |source| PendingError::WriteFailed {
        path: path.clone(),
        source,
    };

    let file = File::create(&tmp).map_err(failed)?;
    let mut writer = BufWriter::new(file);
    sets.write_to(&mut writer, database_sequence).map_err(failed)?;
    writer.flush().map_err(failed)?;
    writer.get_ref().sync_all().map_err(failed)?;
    fs::rename(&tmp, &path).map_err(failed)?;
    Ok(())
}

/// Read `commit-manager.data` from `dir`. A missing file is an empty state.
pub fn read_commit_manager_file(dir: &Path) -> PendingResult<(i64, PendingSets)> {
    let path = dir.join(COMMIT_MANAGER_FILE);
    if !path.exists() {
        return Ok((0, PendingSets::new()));
    }
    let failed = |source| PendingError::ReadFailed {
        path: path.clone(),
        source,
    };
    let file = File::open(&path).map_err(failed)?;
    PendingSets::read_from(&mut BufReader::new(file)).map_err(failed)
}
