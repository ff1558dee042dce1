//! Stamp - immutable (status, time, author, module, path) coordinate
//!
//! A stamp whose time is [`UNCOMMITTED_TIME`] denotes a pending edit. Commit
//! replaces the sentinel with the definitive commit time; nothing else about a
//! stamp ever changes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::nid::Nid;

/// Interned handle of a stamp.
pub type StampSequence = i32;

/// Time value marking a stamp as not yet committed.
pub const UNCOMMITTED_TIME: i64 = i64::MAX;

/// Lifecycle status carried by a stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    Primordial = 0,
    Active = 1,
    Inactive = 2,
    Canceled = 3,
    Withdrawn = 4,
}

impl Status {
    /// Convert from u8, returns None for invalid values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Status::Primordial),
            1 => Some(Status::Active),
            2 => Some(Status::Inactive),
            3 => Some(Status::Canceled),
            4 => Some(Status::Withdrawn),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Primordial => "PRIMORDIAL",
            Status::Active => "ACTIVE",
            Status::Inactive => "INACTIVE",
            Status::Canceled => "CANCELED",
            Status::Withdrawn => "WITHDRAWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The versioning coordinate of one edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub status: Status,
    /// Epoch milliseconds, or [`UNCOMMITTED_TIME`].
    pub time: i64,
    pub author: Nid,
    pub module: Nid,
    pub path: Nid,
}

impl Stamp {
    pub fn new(status: Status, time: i64, author: Nid, module: Nid, path: Nid) -> Self {
        Self {
            status,
            time,
            author,
            module,
            path,
        }
    }

    /// A pending stamp for an edit that has not been committed.
    pub fn uncommitted(status: Status, author: Nid, module: Nid, path: Nid) -> Self {
        Self::new(status, UNCOMMITTED_TIME, author, module, path)
    }

    #[inline]
    pub fn is_uncommitted(&self) -> bool {
        self.time == UNCOMMITTED_TIME
    }

    /// Same coordinate at a different time.
    pub fn with_time(&self, time: i64) -> Self {
        Self { time, ..*self }
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_uncommitted() {
            write!(
                f,
                "⦙{} uncommitted a:{} m:{} p:{}⦙",
                self.status, self.author, self.module, self.path
            )
        } else {
            write!(
                f,
                "⦙{} t:{} a:{} m:{} p:{}⦙",
                self.status, self.time, self.author, self.module, self.path
            )
        }
    }
}
