//! Pending-write bookkeeping
//!
//! Outside of transactions, the four buckets are the single source of truth
//! for what is waiting to be committed:
//! - concepts written with checks
//! - concepts written without checks
//! - semantics written with checks
//! - semantics written without checks
//!
//! The buckets are owned by one task ([`PendingBuckets`]) and persisted as
//! `commit-manager.data`.

mod buckets;
mod errors;
mod sets;

pub use buckets::PendingBuckets;
pub use errors::{PendingError, PendingResult};
pub use sets::{
    read_commit_manager_file, write_commit_manager_file, BucketKey, PendingCounts, PendingSets,
    COMMIT_MANAGER_FILE,
};
