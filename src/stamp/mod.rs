//! Stamp model
//!
//! A stamp is the (status, time, author, module, path) coordinate of an edit,
//! interned to an integer sequence. Side tables attach aliases and comments
//! to sequences.
//!
//! # Invariants
//!
//! - Identical tuples intern to the same sequence
//! - A committed stamp never changes
//! - Canceling an uncommitted stamp removes it from the pending set; the
//!   tuple is not rewritten

mod alias;
mod comment;
mod coordinate;
mod errors;
mod store;

pub use alias::StampAliasMap;
pub use comment::StampCommentMap;
pub use coordinate::{Stamp, StampSequence, Status, UNCOMMITTED_TIME};
pub use errors::{StampError, StampResult};
pub use store::{
    Finalized, PendingStamp, StampService, StampStore, STAMP_ALIAS_FILE, STAMP_COMMENT_FILE,
};
