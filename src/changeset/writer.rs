//! Changeset writer
//!
//! Registered as a changeset listener. On every successful commit it
//! resolves the committed versions of each affected chronology to full
//! stamp tuples and hands the frames to one dedicated writer thread, which
//! appends them to this datastore's segment pair:
//! - `<segment-id>.ibdf`: checksummed binary frames
//! - `<segment-id>.json`: one JSON object per frame per line
//!
//! The single writer serializes segment writes in notification order. Every
//! append is followed by `sync_data`.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};

use super::errors::{ChangesetError, ChangesetResult};
use super::record::{ChangesetFrame, ChronologyEntry, CommitEntry, StampedVersion};
use crate::collaborators::ChronologyStore;
use crate::commit::CommitRecord;
use crate::listener::ChangeSetListener;
use crate::observability::{log_event, Event};
use crate::stamp::StampService;

/// Subdirectory of the data directory holding segments.
pub const CHANGESETS_DIR: &str = "changesets";
pub const BINARY_EXTENSION: &str = "ibdf";
pub const JSON_EXTENSION: &str = "json";

enum WriterCommand {
    Append(Vec<ChangesetFrame>),
    /// Reply once every earlier append is on disk, with the first failure
    /// since the previous flush.
    Flush(oneshot::Sender<ChangesetResult<()>>),
    Stop,
}

pub struct ChangesetWriter {
    segment_id: String,
    binary_path: PathBuf,
    json_path: PathBuf,
    store: Arc<dyn ChronologyStore>,
    stamps: Arc<dyn StampService>,
    commands: mpsc::UnboundedSender<WriterCommand>,
    commits_appended: Arc<AtomicU64>,
}

impl ChangesetWriter {
    /// Open the segment pair for `segment_id` under `dir` and start the
    /// writer thread.
    pub fn start(
        dir: &Path,
        segment_id: impl Into<String>,
        store: Arc<dyn ChronologyStore>,
        stamps: Arc<dyn StampService>,
    ) -> ChangesetResult<Arc<Self>> {
        let segment_id = segment_id.into();
        fs::create_dir_all(dir).map_err(|source| ChangesetError::WriteFailed {
            path: dir.to_path_buf(),
            source,
        })?;

        let binary_path = dir.join(format!("{}.{}", segment_id, BINARY_EXTENSION));
        let json_path = dir.join(format!("{}.{}", segment_id, JSON_EXTENSION));
        let files = SegmentFiles {
            binary: open_append(&binary_path)?,
            json: open_append(&json_path)?,
            binary_path: binary_path.clone(),
            json_path: json_path.clone(),
        };

        let (commands, rx) = mpsc::unbounded_channel();
        let commits_appended = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&commits_appended);
        thread::Builder::new()
            .name("changeset-writer".into())
            .spawn(move || run_writer(files, rx, counter))
            .map_err(|source| ChangesetError::WriteFailed {
                path: binary_path.clone(),
                source,
            })?;

        Ok(Arc::new(Self {
            segment_id,
            binary_path,
            json_path,
            store,
            stamps,
            commands,
            commits_appended,
        }))
    }

    pub fn segment_id(&self) -> &str {
        &self.segment_id
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    /// Commits written to disk so far.
    pub fn commits_appended(&self) -> u64 {
        self.commits_appended.load(Ordering::SeqCst)
    }

    /// Frames for one commit: a COMMIT header, then one CHRONOLOGY frame per
    /// affected chronology holding only the versions this commit finalized.
    pub fn frames_for(&self, record: &CommitRecord) -> ChangesetResult<Vec<ChangesetFrame>> {
        let mut entries = Vec::new();
        for nid in record.affected_nids() {
            let Some(chronology) = self.store.get(nid)? else {
                continue;
            };
            let versions: Vec<StampedVersion> = chronology
                .versions()
                .iter()
                .filter(|v| record.stamps_committed.contains(&v.stamp_sequence))
                .filter_map(|v| {
                    let stamp = self.stamps.stamp(v.stamp_sequence)?;
                    Some(StampedVersion {
                        stamp,
                        commit_state: v.commit_state,
                        data: v.data.clone(),
                    })
                })
                .collect();
            if versions.is_empty() {
                continue;
            }
            entries.push(ChangesetFrame::Chronology(ChronologyEntry {
                uuid: chronology.uuid(),
                nid,
                object_type: chronology.object_type(),
                assemblage: chronology.assemblage(),
                referenced_component: chronology.referenced_component(),
                versions,
            }));
        }

        let mut frames = Vec::with_capacity(entries.len() + 1);
        frames.push(ChangesetFrame::Commit(CommitEntry {
            commit_time: record.commit_time,
            chronology_count: entries.len() as u32,
            comment: record.comment.clone(),
        }));
        frames.extend(entries);
        Ok(frames)
    }

    /// Wait until every commit handed to the writer so far is on disk.
    pub async fn flush(&self) -> ChangesetResult<()> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(WriterCommand::Flush(reply))
            .map_err(|_| ChangesetError::WriterStopped)?;
        done.await.map_err(|_| ChangesetError::WriterStopped)?
    }

    /// Stop the writer thread after the commands already queued.
    pub fn close(&self) {
        let _ = self.commands.send(WriterCommand::Stop);
    }
}

impl ChangeSetListener for ChangesetWriter {
    fn handle_post_commit(&self, record: &CommitRecord) {
        let frames = match self.frames_for(record) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::error!(
                    code = e.code(),
                    commit_time = record.commit_time,
                    "changeset frames not built: {}",
                    e
                );
                return;
            }
        };
        if self.commands.send(WriterCommand::Append(frames)).is_err() {
            tracing::error!(
                commit_time = record.commit_time,
                "changeset writer stopped, commit not logged"
            );
        }
    }
}

struct SegmentFiles {
    binary: File,
    json: File,
    binary_path: PathBuf,
    json_path: PathBuf,
}

impl SegmentFiles {
    fn append(&mut self, frames: &[ChangesetFrame]) -> ChangesetResult<()> {
        let binary_failed = |source| ChangesetError::WriteFailed {
            path: self.binary_path.clone(),
            source,
        };
        let mut bytes = Vec::new();
        for frame in frames {
            bytes.extend(frame.serialize().map_err(binary_failed)?);
        }
        self.binary.write_all(&bytes).map_err(binary_failed)?;
        self.binary.sync_data().map_err(binary_failed)?;

        let json_failed = |source| ChangesetError::WriteFailed {
            path: self.json_path.clone(),
            source,
        };
        let mut lines = String::new();
        for frame in frames {
            let line = serde_json::to_string(frame)
                .map_err(|e| json_failed(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
            lines.push_str(&line);
            lines.push('\n');
        }
        self.json.write_all(lines.as_bytes()).map_err(json_failed)?;
        self.json.sync_data().map_err(json_failed)
    }
}

fn open_append(path: &Path) -> ChangesetResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ChangesetError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })
}

fn run_writer(
    mut files: SegmentFiles,
    mut commands: mpsc::UnboundedReceiver<WriterCommand>,
    commits_appended: Arc<AtomicU64>,
) {
    let mut failure: Option<ChangesetError> = None;
    while let Some(command) = commands.blocking_recv() {
        match command {
            WriterCommand::Append(frames) => match files.append(&frames) {
                Ok(()) => {
                    let total = commits_appended.fetch_add(1, Ordering::SeqCst) + 1;
                    log_event(
                        Event::ChangesetAppend,
                        &[
                            ("frames", &frames.len().to_string()),
                            ("commits", &total.to_string()),
                        ],
                    );
                }
                Err(e) => {
                    tracing::error!(code = e.code(), "changeset append failed: {}", e);
                    failure.get_or_insert(e);
                }
            },
            WriterCommand::Flush(reply) => {
                let _ = reply.send(failure.take().map_or(Ok(()), Err));
            }
            WriterCommand::Stop => break,
        }
    }
    tracing::debug!("changeset writer stopped");
}
