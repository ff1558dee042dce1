//! External collaborators of the commit core
//!
//! The commit core does not own object storage, identifier assignment,
//! indexing or taxonomy. It talks to them through the traits below. In-memory
//! implementations are provided so the core runs standalone.
//!
//! Every collaborator that keeps state reports the datastore id it belongs
//! to; startup refuses to proceed unless all of them agree.

mod errors;
mod memory;

pub use errors::{StoreError, StoreResult};
pub use memory::{
    MemoryChronologyStore, MemoryIdentifierService, NoopIndexService, NoopTaxonomyService,
    RecordingIndexService, RecordingTaxonomyService,
};

use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::chronology::Chronology;
use crate::nid::{Nid, ObjectType};

/// Object store holding chronologies.
///
/// A single `put` is atomic for one chronology and merges versions with
/// what is already stored rather than overwriting.
pub trait ChronologyStore: Send + Sync {
    fn data_store_id(&self) -> Uuid;

    fn get(&self, nid: Nid) -> StoreResult<Option<Chronology>>;

    /// Merge `chronology`'s versions into the stored chronology.
    fn put(&self, chronology: &Chronology) -> StoreResult<()>;

    /// Overwrite the stored chronology.
    fn replace(&self, chronology: Chronology) -> StoreResult<()>;

    /// Delete the stored chronology. Returns false if it was absent.
    fn remove(&self, nid: Nid) -> StoreResult<bool>;

    fn nids(&self) -> StoreResult<Vec<Nid>>;
}

/// Nid assignment and lookup.
pub trait IdentifierService: Send + Sync {
    fn data_store_id(&self) -> Uuid;

    fn nid_for_uuid(&self, uuid: &Uuid) -> Option<Nid>;

    fn uuid_for_nid(&self, nid: Nid) -> Option<Uuid>;

    fn object_type(&self, nid: Nid) -> Option<ObjectType>;

    /// Nid for `uuid`, assigning a new one if needed.
    fn assign_nid(&self, uuid: Uuid, object_type: ObjectType) -> Nid;
}

/// Search index maintenance.
pub trait IndexService: Send + Sync {
    fn index(&self, chronology: &Chronology) -> BoxFuture<'static, StoreResult<()>>;
}

/// Derived taxonomy maintenance.
pub trait TaxonomyService: Send + Sync {
    /// Recompute the derived edges touched by `chronology`.
    fn rebuild_edges(&self, chronology: &Chronology) -> StoreResult<()>;
}
