//! Identifiers for versioned objects
//!
//! A nid is a negative-space `i32` naming a concept or a semantic. Nids are
//! assigned by the identifier service; this module only defines the vocabulary
//! and the concurrent set used to track pending and committed work.

mod nid_set;

pub use nid_set::NidSet;

use serde::{Deserialize, Serialize};

/// Native identifier of a versioned object.
pub type Nid = i32;

/// The two kinds of versioned objects tracked by the commit core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ObjectType {
    Concept = 1,
    Semantic = 2,
}

impl ObjectType {
    /// Convert from u8, returns None for invalid values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ObjectType::Concept),
            2 => Some(ObjectType::Semantic),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
