//! Chronologies and their versions
//!
//! A chronology is an identified object (concept or semantic) owning an
//! ordered list of versions. Each version references a stamp sequence and
//! carries a commit state and a payload.

mod object;
mod version;

pub use object::Chronology;
pub use version::{CommitState, DescriptionData, Version, VersionData};
