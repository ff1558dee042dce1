//! Write completion drainer
//!
//! Every spawned write task is handed to this task, which awaits it and
//! logs failures and panics. Callers that drop their write handle would
//! otherwise never see those errors. The drainer does not gate correctness.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::errors::WriteResult;
use super::handle::WriteSummary;
use crate::nid::Nid;
use crate::observability::{log_event, Event};

pub(crate) struct Completion {
    pub nid: Nid,
    pub task: JoinHandle<WriteResult<WriteSummary>>,
}

pub(crate) fn spawn_drainer(mut completions: mpsc::UnboundedReceiver<Completion>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(Completion { nid, task }) = completions.recv().await {
            let nid_field = nid.to_string();
            match task.await {
                Ok(Ok(summary)) => {
                    tracing::trace!(nid, write_sequence = summary.write_sequence, "write drained");
                }
                Ok(Err(err)) if err.is_validation() => {
                    log_event(
                        Event::WriteFailed,
                        &[("nid", &nid_field), ("code", err.code()), ("error", &err.to_string())],
                    );
                }
                Ok(Err(err)) => {
                    tracing::error!(nid, code = err.code(), "write task failed: {}", err);
                    log_event(Event::WriteFailed, &[("nid", &nid_field), ("code", err.code())]);
                }
                Err(join) if join.is_panic() => {
                    tracing::error!(nid, "write task panicked");
                }
                Err(_) => {
                    tracing::warn!(nid, "write task cancelled");
                }
            }
        }
        tracing::debug!("write completion drainer stopped");
    })
}
