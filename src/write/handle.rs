//! Write handles
//!
//! A write hands back two channels: a oneshot carrying the final result and
//! a watch reporting progress through the stages below.

use std::fmt;

use serde::Serialize;
use tokio::sync::{oneshot, watch};

use super::errors::{WriteError, WriteResult};
use crate::checker::Alert;
use crate::nid::Nid;

/// Progress of one write task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStage {
    /// Permit held, task not yet running
    Queued,
    /// Writing to the object store
    Persisting,
    /// Running ADD_UNCOMMITTED checkers
    Checking,
    /// Updating pending bookkeeping
    Recording,
    Complete,
    Failed,
}

impl WriteStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, WriteStage::Complete | WriteStage::Failed)
    }
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteStage::Queued => "queued",
            WriteStage::Persisting => "persisting",
            WriteStage::Checking => "checking",
            WriteStage::Recording => "recording",
            WriteStage::Complete => "complete",
            WriteStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub nid: Nid,
    /// Database sequence after this write.
    pub write_sequence: i64,
    /// Non-blocking alerts raised while checking.
    pub alerts: Vec<Alert>,
}

/// Caller's view of one in-flight write.
#[derive(Debug)]
pub struct WriteHandle {
    nid: Nid,
    result: oneshot::Receiver<WriteResult<WriteSummary>>,
    progress: watch::Receiver<WriteStage>,
}

impl WriteHandle {
    pub(crate) fn new(
        nid: Nid,
        result: oneshot::Receiver<WriteResult<WriteSummary>>,
        progress: watch::Receiver<WriteStage>,
    ) -> Self {
        Self {
            nid,
            result,
            progress,
        }
    }

    pub fn nid(&self) -> Nid {
        self.nid
    }

    pub fn stage(&self) -> WriteStage {
        *self.progress.borrow()
    }

    /// Progress side channel. Can be cloned and watched independently.
    pub fn progress(&self) -> watch::Receiver<WriteStage> {
        self.progress.clone()
    }

    /// Wait for the write to finish.
    pub async fn wait(self) -> WriteResult<WriteSummary> {
        match self.result.await {
            Ok(result) => result,
            Err(_) => Err(WriteError::Aborted(self.nid)),
        }
    }
}
