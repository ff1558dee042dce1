//! Changeset replay
//!
//! Replay steps:
//! 1. List `*.ibdf` segments in the changesets directory, in name order
//! 2. Skip this datastore's own segment and segments already processed
//! 3. Import every CHRONOLOGY frame through the no-checks write path,
//!    dropping versions whose stamp tuple and content are already present
//! 4. Raise the commit clock past every replayed commit time
//! 5. Mark the segment processed
//! 6. Re-index and rebuild taxonomy edges for every imported nid
//!
//! Corruption in a segment aborts replay before that segment is marked.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use super::errors::{ChangesetError, ChangesetResult};
use super::processed::ProcessedSegments;
use super::reader::SegmentReader;
use super::record::{ChangesetFrame, ChronologyEntry};
use super::writer::BINARY_EXTENSION;
use crate::chronology::{Chronology, Version};
use crate::collaborators::{IdentifierService, IndexService, TaxonomyService};
use crate::commit::CommitCoordinator;
use crate::nid::{Nid, ObjectType};
use crate::observability::{log_event, Event};
use crate::stamp::Stamp;

/// Counters from one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub segments_seen: usize,
    pub segments_skipped: usize,
    pub segments_replayed: usize,
    pub commits_replayed: usize,
    pub chronologies_imported: usize,
    pub versions_imported: usize,
    pub versions_deduplicated: usize,
}

pub struct ChangesetLoader {
    dir: PathBuf,
    own_segment: Option<String>,
    coordinator: CommitCoordinator,
    identifiers: Arc<dyn IdentifierService>,
    index: Arc<dyn IndexService>,
    taxonomy: Arc<dyn TaxonomyService>,
}

impl ChangesetLoader {
    pub fn new(
        dir: impl Into<PathBuf>,
        coordinator: CommitCoordinator,
        identifiers: Arc<dyn IdentifierService>,
        index: Arc<dyn IndexService>,
        taxonomy: Arc<dyn TaxonomyService>,
    ) -> Self {
        Self {
            dir: dir.into(),
            own_segment: None,
            coordinator,
            identifiers,
            index,
            taxonomy,
        }
    }

    /// Never replay the segment with this id.
    pub fn skip_own_segment(mut self, segment_id: impl Into<String>) -> Self {
        self.own_segment = Some(segment_id.into());
        self
    }

    /// Segment file names in the changesets directory, sorted.
    pub fn segment_names(&self) -> ChangesetResult<Vec<String>> {
        list_segments(&self.dir)
    }

    pub async fn replay(&self) -> ChangesetResult<ReplayStats> {
        let span = tracing::info_span!("replay", dir = %self.dir.display());
        self.replay_inner().instrument(span).await
    }

    async fn replay_inner(&self) -> ChangesetResult<ReplayStats> {
        log_event(Event::ReplayBegin, &[("dir", &self.dir.display().to_string())]);
        let mut stats = ReplayStats::default();
        let mut processed = ProcessedSegments::load(&self.dir)?;
        let own_name = self
            .own_segment
            .as_ref()
            .map(|id| format!("{}.{}", id, BINARY_EXTENSION));
        let mut imported = BTreeSet::new();

        for name in self.segment_names()? {
            stats.segments_seen += 1;
            if own_name.as_deref() == Some(name.as_str()) || processed.is_processed(&name) {
                stats.segments_skipped += 1;
                log_event(Event::ReplaySegmentSkipped, &[("segment", &name)]);
                continue;
            }

            let path = self.dir.join(&name);
            let frames = read_segment(path).await?;
            for frame in frames {
                match frame {
                    ChangesetFrame::Commit(entry) => {
                        stats.commits_replayed += 1;
                        self.coordinator.clock().observe(entry.commit_time);
                    }
                    ChangesetFrame::Chronology(entry) => {
                        if let Some(nid) = self.import_entry(entry, &mut stats).await? {
                            imported.insert(nid);
                        }
                    }
                }
            }

            processed.mark(name);
            processed.save()?;
            stats.segments_replayed += 1;
        }

        log_event(
            Event::ReplayComplete,
            &[
                ("segments", &stats.segments_replayed.to_string()),
                ("commits", &stats.commits_replayed.to_string()),
                ("versions", &stats.versions_imported.to_string()),
                ("deduplicated", &stats.versions_deduplicated.to_string()),
            ],
        );

        self.post_process(&imported).await?;
        Ok(stats)
    }

    /// Import the versions of `entry` not already present. Returns the nid
    /// if anything was written.
    async fn import_entry(
        &self,
        entry: ChronologyEntry,
        stats: &mut ReplayStats,
    ) -> ChangesetResult<Option<Nid>> {
        let nid = self.identifiers.nid_for_uuid(&entry.uuid).unwrap_or(entry.nid);
        let stamps = self.coordinator.stamps();

        let mut present: HashSet<(Stamp, [u8; 32])> = HashSet::new();
        if let Some(existing) = self.coordinator.store().get(nid)? {
            for version in existing.versions() {
                if let Some(stamp) = stamps.stamp(version.stamp_sequence) {
                    present.insert((stamp, version.data.content_digest()));
                }
            }
        }

        let mut chronology = match entry.object_type {
            ObjectType::Concept => Chronology::new_concept(nid, entry.uuid),
            ObjectType::Semantic => {
                let (Some(assemblage), Some(referenced)) =
                    (entry.assemblage, entry.referenced_component)
                else {
                    return Err(ChangesetError::corruption(
                        &self.dir,
                        0,
                        format!("semantic {} without assemblage or referenced component", nid),
                    ));
                };
                Chronology::new_semantic(nid, entry.uuid, assemblage, referenced)
            }
        };

        for version in entry.versions {
            if !present.insert((version.stamp, version.data.content_digest())) {
                stats.versions_deduplicated += 1;
                continue;
            }
            let sequence = stamps.stamp_sequence(version.stamp);
            chronology.add_version(Version {
                stamp_sequence: sequence,
                commit_state: version.commit_state,
                data: version.data,
            });
            stats.versions_imported += 1;
        }

        if chronology.versions().is_empty() {
            return Ok(None);
        }
        self.coordinator.import(chronology).await?.wait().await?;
        stats.chronologies_imported += 1;
        Ok(Some(nid))
    }

    /// Rebuild derived state for every imported nid.
    async fn post_process(&self, imported: &BTreeSet<Nid>) -> ChangesetResult<()> {
        for &nid in imported {
            let Some(chronology) = self.coordinator.store().get(nid)? else {
                continue;
            };
            self.index.index(&chronology).await?;
            self.taxonomy.rebuild_edges(&chronology)?;
        }
        log_event(
            Event::ReplayPostProcessComplete,
            &[("nids", &imported.len().to_string())],
        );
        Ok(())
    }
}

/// `.ibdf` file names directly under `dir`, sorted. A missing directory has
/// no segments.
pub fn list_segments(dir: &Path) -> ChangesetResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ChangesetError::ReadFailed {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ChangesetError::ReadFailed {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(BINARY_EXTENSION) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

async fn read_segment(path: PathBuf) -> ChangesetResult<Vec<ChangesetFrame>> {
    let report = path.clone();
    let result = tokio::task::spawn_blocking(move || SegmentReader::open(&path)?.read_all())
        .await
        .map_err(|e| ChangesetError::ReadFailed {
            path: report.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;
    if let Err(e @ ChangesetError::Corruption { .. }) = &result {
        log_event(
            Event::ChangesetCorruption,
            &[("segment", &report.display().to_string()), ("error", &e.to_string())],
        );
    }
    result
}
