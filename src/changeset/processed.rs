//! Changeset tracking files
//!
//! - `changesetId.txt` names the segment this datastore appends to
//! - `processed-changesets.json` maps segment file names to whether they
//!   have been replayed

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::errors::{ChangesetError, ChangesetResult};

pub const CHANGESET_ID_FILE: &str = "changesetId.txt";
pub const PROCESSED_FILE: &str = "processed-changesets.json";

/// Read this datastore's segment id from `dir`, creating one if absent.
pub fn read_or_create_segment_id(dir: &Path) -> ChangesetResult<String> {
    let path = dir.join(CHANGESET_ID_FILE);
    match fs::read_to_string(&path) {
        Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(ChangesetError::ReadFailed { path, source }),
    }

    let id = Uuid::new_v4().to_string();
    write_atomically(&path, id.as_bytes())?;
    Ok(id)
}

/// Persistent file name -> processed table.
#[derive(Debug)]
pub struct ProcessedSegments {
    path: PathBuf,
    entries: BTreeMap<String, bool>,
}

impl ProcessedSegments {
    /// Load the table from `dir`. A missing file is an empty table.
    pub fn load(dir: &Path) -> ChangesetResult<Self> {
        let path = dir.join(PROCESSED_FILE);
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| ChangesetError::ReadFailed {
                path: path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(ChangesetError::ReadFailed { path, source }),
        };
        Ok(Self { path, entries })
    }

    pub fn is_processed(&self, name: &str) -> bool {
        self.entries.get(name).copied().unwrap_or(false)
    }

    pub fn mark(&mut self, name: impl Into<String>) {
        self.entries.insert(name.into(), true);
    }

    pub fn len(&self) -> usize {
        self.entries.values().filter(|done| **done).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn save(&self) -> ChangesetResult<()> {
        let json = serde_json::to_vec_pretty(&self.entries).map_err(|e| {
            ChangesetError::WriteFailed {
                path: self.path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            }
        })?;
        write_atomically(&self.path, &json)
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> ChangesetResult<()> {
    let write_failed = |source| ChangesetError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp).map_err(write_failed)?;
    file.write_all(contents).map_err(write_failed)?;
    file.sync_all().map_err(write_failed)?;
    fs::rename(&tmp, path).map_err(write_failed)
}
