//! Changeset durability log
//!
//! This module provides:
//! - Checksummed binary frames and their JSON mirror
//! - A single-threaded segment writer fed by commit notifications
//! - Strict segment reading with corruption detection
//! - Startup replay of other datastores' segments with deduplication
//!
//! # Layout
//!
//! ```text
//! <data_dir>/changesets/
//!     <segment-id>.ibdf
//!     <segment-id>.json
//!     changesetId.txt
//!     processed-changesets.json
//! ```

mod checksum;
mod errors;
mod loader;
mod processed;
mod reader;
mod record;
mod writer;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{ChangesetError, ChangesetResult};
pub use loader::{list_segments, ChangesetLoader, ReplayStats};
pub use processed::{read_or_create_segment_id, ProcessedSegments, CHANGESET_ID_FILE, PROCESSED_FILE};
pub use reader::SegmentReader;
pub use record::{ChangesetFrame, ChronologyEntry, CommitEntry, FrameKind, StampedVersion};
pub use writer::{ChangesetWriter, BINARY_EXTENSION, CHANGESETS_DIR, JSON_EXTENSION};
