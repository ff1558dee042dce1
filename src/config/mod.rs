//! Datastore configuration
//!
//! Loaded from a JSON file. Every field except `data_dir` has a default:
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/chronostamp",
//!   "write_permits": 40,
//!   "changesets_enabled": true,
//!   "replay_changesets_on_startup": true,
//!   "default_checkers": true,
//!   "persist_on_sync": true
//! }
//! ```

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::write::DEFAULT_WRITE_PERMITS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStoreConfig {
    /// Root of all persisted state (required)
    pub data_dir: PathBuf,

    /// Concurrent write tasks before submitters are held back
    #[serde(default = "default_write_permits")]
    pub write_permits: usize,

    /// Mirror every commit to the changeset log
    #[serde(default = "default_true")]
    pub changesets_enabled: bool,

    /// Replay unprocessed changesets when the datastore opens
    #[serde(default = "default_true")]
    pub replay_changesets_on_startup: bool,

    /// Register the two built-in checkers
    #[serde(default = "default_true")]
    pub default_checkers: bool,

    /// Write bookkeeping files on `sync()`
    #[serde(default = "default_true")]
    pub persist_on_sync: bool,
}

fn default_write_permits() -> usize {
    DEFAULT_WRITE_PERMITS
}

fn default_true() -> bool {
    true
}

impl DataStoreConfig {
    /// Default configuration rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_permits: DEFAULT_WRITE_PERMITS,
            changesets_enabled: true,
            replay_changesets_on_startup: true,
            default_checkers: true,
            persist_on_sync: true,
        }
    }

    /// Load and validate configuration from a JSON file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DataStoreConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "data_dir",
                reason: "must not be empty".into(),
            });
        }
        if self.write_permits == 0 {
            return Err(ConfigError::InvalidValue {
                field: "write_permits",
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        &self.data_dir
    }

    pub fn with_write_permits(mut self, permits: usize) -> Self {
        self.write_permits = permits;
        self
    }

    pub fn with_changesets(mut self, enabled: bool) -> Self {
        self.changesets_enabled = enabled;
        self
    }

    pub fn with_replay(mut self, enabled: bool) -> Self {
        self.replay_changesets_on_startup = enabled;
        self
    }
}
