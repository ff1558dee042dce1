//! In-memory collaborators
//!
//! Used by the CLI replay command and by tests. Lock poisoning is recovered:
//! every mutation leaves the maps consistent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, RwLock};

use futures_util::future::{self, BoxFuture, FutureExt};
use uuid::Uuid;

use super::{ChronologyStore, IdentifierService, IndexService, StoreResult, TaxonomyService};
use crate::chronology::Chronology;
use crate::nid::{Nid, ObjectType};

/// Object store backed by a map.
#[derive(Debug)]
pub struct MemoryChronologyStore {
    data_store_id: Uuid,
    chronologies: RwLock<HashMap<Nid, Chronology>>,
}

impl MemoryChronologyStore {
    pub fn new(data_store_id: Uuid) -> Self {
        Self {
            data_store_id,
            chronologies: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.chronologies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChronologyStore for MemoryChronologyStore {
    fn data_store_id(&self) -> Uuid {
        self.data_store_id
    }

    fn get(&self, nid: Nid) -> StoreResult<Option<Chronology>> {
        Ok(self
            .chronologies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&nid)
            .cloned())
    }

    fn put(&self, chronology: &Chronology) -> StoreResult<()> {
        let mut map = self.chronologies.write().unwrap_or_else(|e| e.into_inner());
        match map.get_mut(&chronology.nid()) {
            Some(existing) => existing.merge(chronology),
            None => {
                map.insert(chronology.nid(), chronology.clone());
            }
        }
        Ok(())
    }

    fn replace(&self, chronology: Chronology) -> StoreResult<()> {
        self.chronologies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(chronology.nid(), chronology);
        Ok(())
    }

    fn remove(&self, nid: Nid) -> StoreResult<bool> {
        Ok(self
            .chronologies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&nid)
            .is_some())
    }

    fn nids(&self) -> StoreResult<Vec<Nid>> {
        let mut nids: Vec<Nid> = self
            .chronologies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        nids.sort_unstable();
        Ok(nids)
    }
}

#[derive(Debug, Default)]
struct IdentifierMaps {
    by_uuid: HashMap<Uuid, Nid>,
    by_nid: HashMap<Nid, (Uuid, ObjectType)>,
}

/// Identifier service assigning nids upward from `i32::MIN + 1`.
#[derive(Debug)]
pub struct MemoryIdentifierService {
    data_store_id: Uuid,
    next_nid: AtomicI32,
    maps: RwLock<IdentifierMaps>,
}

impl MemoryIdentifierService {
    pub fn new(data_store_id: Uuid) -> Self {
        Self {
            data_store_id,
            next_nid: AtomicI32::new(i32::MIN + 1),
            maps: RwLock::new(IdentifierMaps::default()),
        }
    }
}

impl IdentifierService for MemoryIdentifierService {
    fn data_store_id(&self) -> Uuid {
        self.data_store_id
    }

    fn nid_for_uuid(&self, uuid: &Uuid) -> Option<Nid> {
        self.maps
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_uuid
            .get(uuid)
            .copied()
    }

    fn uuid_for_nid(&self, nid: Nid) -> Option<Uuid> {
        self.maps
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_nid
            .get(&nid)
            .map(|(uuid, _)| *uuid)
    }

    fn object_type(&self, nid: Nid) -> Option<ObjectType> {
        self.maps
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_nid
            .get(&nid)
            .map(|(_, ty)| *ty)
    }

    fn assign_nid(&self, uuid: Uuid, object_type: ObjectType) -> Nid {
        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());
        if let Some(&nid) = maps.by_uuid.get(&uuid) {
            return nid;
        }
        let nid = self.next_nid.fetch_add(1, Ordering::SeqCst);
        maps.by_uuid.insert(uuid, nid);
        maps.by_nid.insert(nid, (uuid, object_type));
        nid
    }
}

/// Index service that does nothing.
#[derive(Debug, Default)]
pub struct NoopIndexService;

impl IndexService for NoopIndexService {
    fn index(&self, _chronology: &Chronology) -> BoxFuture<'static, StoreResult<()>> {
        future::ready(Ok(())).boxed()
    }
}

/// Index service remembering which nids were indexed, in order.
#[derive(Debug, Default)]
pub struct RecordingIndexService {
    indexed: Mutex<Vec<Nid>>,
}

impl RecordingIndexService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indexed(&self) -> Vec<Nid> {
        self.indexed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl IndexService for RecordingIndexService {
    fn index(&self, chronology: &Chronology) -> BoxFuture<'static, StoreResult<()>> {
        self.indexed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(chronology.nid());
        future::ready(Ok(())).boxed()
    }
}

/// Taxonomy service that does nothing.
#[derive(Debug, Default)]
pub struct NoopTaxonomyService;

impl TaxonomyService for NoopTaxonomyService {
    fn rebuild_edges(&self, _chronology: &Chronology) -> StoreResult<()> {
        Ok(())
    }
}

/// Taxonomy service remembering which nids were rebuilt, in order.
#[derive(Debug, Default)]
pub struct RecordingTaxonomyService {
    rebuilt: Mutex<Vec<Nid>>,
}

impl RecordingTaxonomyService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuilt(&self) -> Vec<Nid> {
        self.rebuilt.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TaxonomyService for RecordingTaxonomyService {
    fn rebuild_edges(&self, chronology: &Chronology) -> StoreResult<()> {
        self.rebuilt
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(chronology.nid());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chronology::{Version, VersionData};

    #[test]
    fn test_put_merges_versions() {
        let store = MemoryChronologyStore::new(Uuid::new_v4());
        let base = Chronology::new_concept(-5, Uuid::new_v4());

        store
            .put(&base.clone().with_version(Version::committed(1, VersionData::Concept)))
            .unwrap();
        store
            .put(&base.with_version(Version::uncommitted(2, VersionData::Concept)))
            .unwrap();

        let stored = store.get(-5).unwrap().unwrap();
        assert_eq!(stored.versions().len(), 2);
    }

    #[test]
    fn test_replace_overwrites() {
        let store = MemoryChronologyStore::new(Uuid::new_v4());
        let base = Chronology::new_concept(-5, Uuid::new_v4());
        store
            .put(&base.clone().with_version(Version::committed(1, VersionData::Concept)))
            .unwrap();
        store.replace(base).unwrap();
        assert!(store.get(-5).unwrap().unwrap().versions().is_empty());
        assert!(store.remove(-5).unwrap());
        assert!(!store.remove(-5).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_nid_is_none() {
        let store = MemoryChronologyStore::new(Uuid::new_v4());
        assert!(store.get(-1).unwrap().is_none());
    }

    #[test]
    fn test_assign_nid_is_stable_and_negative() {
        let ids = MemoryIdentifierService::new(Uuid::new_v4());
        let uuid = Uuid::new_v4();
        let nid = ids.assign_nid(uuid, ObjectType::Concept);
        assert!(nid < 0);
        assert_eq!(ids.assign_nid(uuid, ObjectType::Concept), nid);
        assert_eq!(ids.nid_for_uuid(&uuid), Some(nid));
        assert_eq!(ids.uuid_for_nid(nid), Some(uuid));
        assert_eq!(ids.object_type(nid), Some(ObjectType::Concept));

        let other = ids.assign_nid(Uuid::new_v4(), ObjectType::Semantic);
        assert_ne!(other, nid);
    }

    #[tokio::test]
    async fn test_recording_index() {
        let index = RecordingIndexService::new();
        let c = Chronology::new_concept(-9, Uuid::new_v4());
        index.index(&c).await.unwrap();
        assert_eq!(index.indexed(), vec![-9]);
    }
}
