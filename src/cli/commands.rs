//! CLI command implementations
//!
//! Commands are thin: each opens what it needs, prints one JSON response
//! and returns. The async datastore runs on a runtime owned by the command.

use std::path::Path;

use serde_json::json;

use crate::config::DataStoreConfig;
use crate::datastore::{init_data_dir, inspect_data_dir, read_data_store_id, Collaborators, DataStore};
use crate::observability::init_tracing;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Parse arguments, install logging and dispatch.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { data_dir } => init(&data_dir),
        Command::Replay { config } => replay(&config),
        Command::Inspect { data_dir } => inspect(&data_dir),
    }
}

/// Create the datastore layout, `dataStoreId.txt` and an empty
/// `commit-manager.data`. An existing datastore keeps its id.
pub fn init(data_dir: &Path) -> CliResult<()> {
    let id = init_data_dir(data_dir)?;
    write_response(json!({
        "data_store_id": id,
        "data_dir": data_dir.display().to_string(),
    }))
}

/// Open the configured datastore over in-memory collaborators, replay every
/// unprocessed changeset and print the replay statistics.
pub fn replay(config_path: &Path) -> CliResult<()> {
    let config = DataStoreConfig::load(config_path)?.with_replay(true);
    let id = read_data_store_id(config.data_path())?
        .ok_or_else(|| CliError::NotInitialized(config.data_path().display().to_string()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let stats = runtime.block_on(async move {
        let store = DataStore::open(config, Collaborators::in_memory(id)).await?;
        let stats = store.replay_stats();
        store.shutdown().await?;
        Ok::<_, CliError>(stats)
    })?;

    write_response(json!({
        "data_store_id": id,
        "replay": stats,
    }))
}

/// Print the datastore id, database sequence and pending bucket sizes.
pub fn inspect(data_dir: &Path) -> CliResult<()> {
    if read_data_store_id(data_dir)?.is_none() {
        return Err(CliError::NotInitialized(data_dir.display().to_string()));
    }
    let info = inspect_data_dir(data_dir)?;
    write_response(serde_json::to_value(info)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::datastore::{changesets_dir, DATA_STORE_ID_FILE};
    use crate::pending::COMMIT_MANAGER_FILE;

    #[test]
    fn test_init_then_inspect() {
        let dir = TempDir::new().unwrap();
        init(dir.path()).unwrap();
        assert!(dir.path().join(DATA_STORE_ID_FILE).exists());
        assert!(dir.path().join(COMMIT_MANAGER_FILE).exists());
        assert!(changesets_dir(dir.path()).is_dir());

        inspect(dir.path()).unwrap();
    }

    #[test]
    fn test_inspect_uninitialized() {
        let dir = TempDir::new().unwrap();
        let err = inspect(dir.path()).unwrap_err();
        assert_eq!(err.code(), "CHRONO_CLI_NOT_INITIALIZED");
    }

    #[test]
    fn test_replay_requires_initialized_datastore() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("chronostamp.json");
        let data_dir = dir.path().join("data");
        fs::write(
            &config_path,
            serde_json::to_vec(&json!({ "data_dir": data_dir })).unwrap(),
        )
        .unwrap();

        let err = replay(&config_path).unwrap_err();
        assert_eq!(err.code(), "CHRONO_CLI_NOT_INITIALIZED");

        init(&data_dir).unwrap();
        replay(&config_path).unwrap();
    }

    #[test]
    fn test_replay_bad_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("chronostamp.json");
        fs::write(&config_path, b"{").unwrap();
        let err = replay(&config_path).unwrap_err();
        assert_eq!(err.code(), "CHRONO_CONFIG_INVALID_JSON");
    }
}
