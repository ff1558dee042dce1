//! Datastore lifecycle
//!
//! Open sequence:
//! 1. Create the layout; read or create `dataStoreId.txt`
//! 2. Verify every collaborator reports the same datastore id (fatal
//!    mismatch)
//! 3. Load `commit-manager.data` and the stamp alias and comment tables
//! 4. Start the commit coordinator and the changeset writer
//! 5. Replay unprocessed changesets and post-process the imported nids
//!
//! `shutdown()` syncs, then stops the coordinator and the writer.

mod errors;
mod layout;

pub use errors::{DataStoreError, DataStoreResult};
pub use layout::{
    changesets_dir, ensure_layout, init_data_dir, inspect_data_dir, read_data_store_id,
    read_or_create_data_store_id, DataStoreInfo, DATA_STORE_ID_FILE,
};

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::changeset::{
    read_or_create_segment_id, ChangesetLoader, ChangesetWriter, ReplayStats,
};
use crate::checker::CheckerRegistry;
use crate::collaborators::{
    ChronologyStore, IdentifierService, IndexService, MemoryChronologyStore,
    MemoryIdentifierService, NoopIndexService, NoopTaxonomyService, TaxonomyService,
};
use crate::commit::CommitCoordinator;
use crate::config::DataStoreConfig;
use crate::listener::{ChangeSetListener, Subscription};
use crate::observability::{log_event, Event};
use crate::pending::read_commit_manager_file;
use crate::stamp::{StampService, StampStore};

/// The services a datastore runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ChronologyStore>,
    pub identifiers: Arc<dyn IdentifierService>,
    pub index: Arc<dyn IndexService>,
    pub taxonomy: Arc<dyn TaxonomyService>,
    pub stamps: Arc<dyn StampService>,
}

impl Collaborators {
    /// In-memory collaborators bound to `data_store_id`.
    pub fn in_memory(data_store_id: Uuid) -> Self {
        Self {
            store: Arc::new(MemoryChronologyStore::new(data_store_id)),
            identifiers: Arc::new(MemoryIdentifierService::new(data_store_id)),
            index: Arc::new(NoopIndexService),
            taxonomy: Arc::new(NoopTaxonomyService),
            stamps: Arc::new(StampStore::new()),
        }
    }
}

/// A running datastore.
pub struct DataStore {
    id: Uuid,
    config: DataStoreConfig,
    collaborators: Collaborators,
    coordinator: CommitCoordinator,
    writer: Option<Arc<ChangesetWriter>>,
    subscription: Mutex<Option<Subscription<dyn ChangeSetListener>>>,
    replay_stats: ReplayStats,
}

impl DataStore {
    /// Open the datastore described by `config`. Must be called inside a
    /// tokio runtime.
    pub async fn open(
        config: DataStoreConfig,
        collaborators: Collaborators,
    ) -> DataStoreResult<Self> {
        config.validate()?;
        let data_dir = config.data_path().to_path_buf();
        log_event(
            Event::BootStart,
            &[("data_dir", &data_dir.display().to_string())],
        );

        ensure_layout(&data_dir)?;
        let id = read_or_create_data_store_id(&data_dir)?;
        verify_collaborator("chronology store", id, collaborators.store.data_store_id())?;
        verify_collaborator(
            "identifier service",
            id,
            collaborators.identifiers.data_store_id(),
        )?;

        let (database_sequence, pending) = read_commit_manager_file(&data_dir)?;
        collaborators.stamps.load_side_tables(&data_dir)?;

        let checkers = if config.default_checkers {
            CheckerRegistry::with_defaults()
        } else {
            CheckerRegistry::new()
        };
        let mut builder = CommitCoordinator::builder(
            Arc::clone(&collaborators.store),
            Arc::clone(&collaborators.stamps),
        )
        .checkers(Arc::new(checkers))
        .write_permits(config.write_permits)
        .pending(pending, database_sequence);
        if config.persist_on_sync {
            builder = builder.data_dir(&data_dir);
        }
        let coordinator = builder.start();

        let changesets = changesets_dir(&data_dir);
        let segment_id = read_or_create_segment_id(&changesets)?;
        let (writer, subscription) = if config.changesets_enabled {
            let writer = ChangesetWriter::start(
                &changesets,
                segment_id.clone(),
                Arc::clone(&collaborators.store),
                Arc::clone(&collaborators.stamps),
            )?;
            let listener: Arc<dyn ChangeSetListener> = writer.clone();
            let subscription = coordinator.listeners().changesets.subscribe(listener);
            (Some(writer), Some(subscription))
        } else {
            (None, None)
        };

        let replay_stats = if config.replay_changesets_on_startup {
            ChangesetLoader::new(
                &changesets,
                coordinator.clone(),
                Arc::clone(&collaborators.identifiers),
                Arc::clone(&collaborators.index),
                Arc::clone(&collaborators.taxonomy),
            )
            .skip_own_segment(segment_id)
            .replay()
            .await?
        } else {
            ReplayStats::default()
        };

        log_event(
            Event::BootComplete,
            &[
                ("data_store_id", &id.to_string()),
                ("database_sequence", &coordinator.database_sequence().to_string()),
                ("replayed_segments", &replay_stats.segments_replayed.to_string()),
            ],
        );

        Ok(Self {
            id,
            config,
            collaborators,
            coordinator,
            writer,
            subscription: Mutex::new(subscription),
            replay_stats,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &DataStoreConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn coordinator(&self) -> &CommitCoordinator {
        &self.coordinator
    }

    pub fn changeset_writer(&self) -> Option<&Arc<ChangesetWriter>> {
        self.writer.as_ref()
    }

    /// What startup replay did.
    pub fn replay_stats(&self) -> ReplayStats {
        self.replay_stats
    }

    /// Wait for every submitted write and commit, flush the changeset log
    /// and persist bookkeeping.
    pub async fn sync(&self) -> DataStoreResult<()> {
        log_event(Event::SyncBegin, &[]);
        self.coordinator.sync().await?;
        if let Some(writer) = &self.writer {
            writer.flush().await?;
        }
        log_event(
            Event::SyncComplete,
            &[("database_sequence", &self.coordinator.database_sequence().to_string())],
        );
        Ok(())
    }

    /// Sync, then stop the coordinator and the changeset writer.
    pub async fn shutdown(&self) -> DataStoreResult<()> {
        log_event(Event::ShutdownStart, &[]);
        self.coordinator.shutdown().await?;
        if let Some(writer) = &self.writer {
            writer.flush().await?;
            writer.close();
        }
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(subscription) = subscription {
            self.coordinator.listeners().changesets.unsubscribe(subscription);
        }
        log_event(Event::ShutdownComplete, &[("data_store_id", &self.id.to_string())]);
        Ok(())
    }
}

fn verify_collaborator(collaborator: &'static str, expected: Uuid, found: Uuid) -> DataStoreResult<()> {
    if expected == found {
        return Ok(());
    }
    log_event(
        Event::DataStoreIdMismatch,
        &[
            ("collaborator", collaborator),
            ("expected", &expected.to_string()),
            ("found", &found.to_string()),
        ],
    );
    Err(DataStoreError::IdMismatch {
        collaborator,
        expected,
        found,
    })
}
