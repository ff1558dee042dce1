//! Pending bucket owner task
//!
//! One task owns the four buckets. Writers, commits and cancels send it
//! commands and await the reply, so every mutation is applied in the order
//! the owner receives it and no caller ever holds a lock on the buckets.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::errors::{PendingError, PendingResult};
use super::sets::{BucketKey, PendingSets};
use crate::nid::Nid;

const COMMAND_BUFFER: usize = 256;

enum Command {
    Record {
        nid: Nid,
        key: BucketKey,
        reply: oneshot::Sender<()>,
    },
    Remove {
        nid: Nid,
        reply: oneshot::Sender<Option<BucketKey>>,
    },
    Locate {
        nid: Nid,
        reply: oneshot::Sender<Option<BucketKey>>,
    },
    TakeAll {
        reply: oneshot::Sender<PendingSets>,
    },
    Restore {
        sets: PendingSets,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<PendingSets>,
    },
}

/// Cloneable handle to the bucket owner.
#[derive(Clone)]
pub struct PendingBuckets {
    commands: mpsc::Sender<Command>,
}

impl PendingBuckets {
    /// Start the owner task with `initial` contents.
    pub fn spawn(initial: PendingSets) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(run_owner(initial, rx));
        (Self { commands: tx }, task)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> PendingResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| PendingError::OwnerStopped)?;
        response.await.map_err(|_| PendingError::OwnerStopped)
    }

    /// Put `nid` in the bucket for `key`.
    pub async fn record(&self, nid: Nid, key: BucketKey) -> PendingResult<()> {
        self.request(|reply| Command::Record { nid, key, reply }).await
    }

    /// Remove `nid` from whichever bucket holds it.
    pub async fn remove(&self, nid: Nid) -> PendingResult<Option<BucketKey>> {
        self.request(|reply| Command::Remove { nid, reply }).await
    }

    pub async fn locate(&self, nid: Nid) -> PendingResult<Option<BucketKey>> {
        self.request(|reply| Command::Locate { nid, reply }).await
    }

    /// Swap every bucket for an empty one and return the old contents.
    pub async fn take_all(&self) -> PendingResult<PendingSets> {
        self.request(|reply| Command::TakeAll { reply }).await
    }

    /// Merge `sets` back into the live buckets.
    pub async fn restore(&self, sets: PendingSets) -> PendingResult<()> {
        self.request(|reply| Command::Restore { sets, reply }).await
    }

    /// Point-in-time copy of the buckets.
    pub async fn snapshot(&self) -> PendingResult<PendingSets> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}

async fn run_owner(sets: PendingSets, mut commands: mpsc::Receiver<Command>) {
    while let Some(command) = commands.recv().await {
        // A caller that gave up waiting is not an owner error.
        match command {
            Command::Record { nid, key, reply } => {
                sets.record(nid, key);
                let _ = reply.send(());
            }
            Command::Remove { nid, reply } => {
                let _ = reply.send(sets.remove(nid));
            }
            Command::Locate { nid, reply } => {
                let _ = reply.send(sets.locate(nid));
            }
            Command::TakeAll { reply } => {
                let taken = sets.take();
                if let Err(taken) = reply.send(taken) {
                    sets.merge(&taken);
                }
            }
            Command::Restore { sets: restored, reply } => {
                sets.merge(&restored);
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(sets.clone());
            }
        }
    }
    tracing::debug!("pending bucket owner stopped");
}
