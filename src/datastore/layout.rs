//! On-disk layout of a datastore
//!
//! ```text
//! <data_dir>/
//!     dataStoreId.txt
//!     commit-manager.data
//!     stamp-alias.map
//!     stamp-comment.map
//!     changesets/
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use super::errors::{DataStoreError, DataStoreResult};
use crate::changeset::CHANGESETS_DIR;
use crate::pending::{
    read_commit_manager_file, write_commit_manager_file, PendingCounts, PendingSets,
    COMMIT_MANAGER_FILE,
};

pub const DATA_STORE_ID_FILE: &str = "dataStoreId.txt";

pub fn changesets_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(CHANGESETS_DIR)
}

/// Create the data and changesets directories.
pub fn ensure_layout(data_dir: &Path) -> DataStoreResult<()> {
    let changesets = changesets_dir(data_dir);
    fs::create_dir_all(&changesets).map_err(|source| DataStoreError::Layout {
        path: changesets,
        source,
    })
}

/// Read the datastore id. `None` if the file does not exist yet.
pub fn read_data_store_id(data_dir: &Path) -> DataStoreResult<Option<Uuid>> {
    let path = data_dir.join(DATA_STORE_ID_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(DataStoreError::Layout { path, source }),
    };
    let value = text.trim();
    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| DataStoreError::InvalidId {
            path,
            value: value.to_string(),
        })
}

/// Read the datastore id, creating `dataStoreId.txt` with a fresh id if it
/// does not exist.
pub fn read_or_create_data_store_id(data_dir: &Path) -> DataStoreResult<Uuid> {
    if let Some(id) = read_data_store_id(data_dir)? {
        return Ok(id);
    }
    let id = Uuid::new_v4();
    let path = data_dir.join(DATA_STORE_ID_FILE);
    let layout_failed = |source| DataStoreError::Layout {
        path: path.clone(),
        source,
    };
    let mut file = fs::File::create(&path).map_err(layout_failed)?;
    writeln!(file, "{}", id).map_err(layout_failed)?;
    file.sync_all().map_err(layout_failed)?;
    Ok(id)
}

/// Create a datastore layout with empty bookkeeping. Returns its id.
///
/// An existing datastore keeps its id and bookkeeping.
pub fn init_data_dir(data_dir: &Path) -> DataStoreResult<Uuid> {
    ensure_layout(data_dir)?;
    let id = read_or_create_data_store_id(data_dir)?;
    if !data_dir.join(COMMIT_MANAGER_FILE).exists() {
        write_commit_manager_file(data_dir, 0, &PendingSets::new())?;
    }
    Ok(id)
}

/// Summary of a datastore's persisted bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct DataStoreInfo {
    pub data_store_id: Uuid,
    pub database_sequence: i64,
    pub pending: PendingCounts,
}

/// Read the persisted bookkeeping of the datastore at `data_dir`.
pub fn inspect_data_dir(data_dir: &Path) -> DataStoreResult<DataStoreInfo> {
    let data_store_id = read_data_store_id(data_dir)?.ok_or_else(|| DataStoreError::Layout {
        path: data_dir.join(DATA_STORE_ID_FILE),
        source: io::Error::new(io::ErrorKind::NotFound, "datastore not initialized"),
    })?;
    let (database_sequence, pending) = read_commit_manager_file(data_dir)?;
    Ok(DataStoreInfo {
        data_store_id,
        database_sequence,
        pending: pending.counts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_layout_and_keeps_id() {
        let dir = TempDir::new().unwrap();
        let first = init_data_dir(dir.path()).unwrap();
        assert!(changesets_dir(dir.path()).is_dir());
        assert!(dir.path().join(COMMIT_MANAGER_FILE).exists());

        let second = init_data_dir(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_inspect_fresh_datastore() {
        let dir = TempDir::new().unwrap();
        let id = init_data_dir(dir.path()).unwrap();
        let info = inspect_data_dir(dir.path()).unwrap();
        assert_eq!(info.data_store_id, id);
        assert_eq!(info.database_sequence, 0);
        assert_eq!(info.pending.total(), 0);
    }

    #[test]
    fn test_garbage_id_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DATA_STORE_ID_FILE), "not-a-uuid").unwrap();
        let err = read_data_store_id(dir.path()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_inspect_uninitialized_fails() {
        let dir = TempDir::new().unwrap();
        assert!(inspect_data_dir(dir.path()).is_err());
    }
}
