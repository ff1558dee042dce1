//! chronostamp - transactional commit and versioning core for a
//! terminology content store
//!
//! Writes land as uncommitted versions stamped with (status, time, author,
//! module, path). Commits finalize those stamps under a monotonic commit
//! clock, run the registered checkers, and mirror every commit into an
//! append-only changeset log that other datastores replay.

pub mod changeset;
pub mod checker;
pub mod chronology;
pub mod cli;
pub mod collaborators;
pub mod commit;
pub mod config;
pub mod datastore;
pub mod errors;
pub mod listener;
pub mod nid;
pub mod observability;
pub mod pending;
pub mod stamp;
pub mod transaction;
pub mod write;

pub use commit::{CommitCoordinator, CommitOutcome, CommitRecord, CommitScope};
pub use config::DataStoreConfig;
pub use datastore::{Collaborators, DataStore, DataStoreError};
