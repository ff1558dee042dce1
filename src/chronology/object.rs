//! Chronology - an identified object and its ordered versions
//!
//! Versions are keyed by stamp sequence: adding a version whose sequence is
//! already present replaces it, anything else is appended. This is the merge
//! rule the object store applies when two writers put the same chronology.

use std::collections::BTreeSet;

use uuid::Uuid;

use super::version::{CommitState, Version};
use crate::nid::{Nid, ObjectType};
use crate::stamp::StampSequence;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chronology {
    nid: Nid,
    uuid: Uuid,
    object_type: ObjectType,
    /// Assemblage (pattern) a semantic belongs to.
    assemblage: Option<Nid>,
    /// Component a semantic is about.
    referenced_component: Option<Nid>,
    versions: Vec<Version>,
}

impl Chronology {
    pub fn new_concept(nid: Nid, uuid: Uuid) -> Self {
        Self {
            nid,
            uuid,
            object_type: ObjectType::Concept,
            assemblage: None,
            referenced_component: None,
            versions: Vec::new(),
        }
    }

    pub fn new_semantic(nid: Nid, uuid: Uuid, assemblage: Nid, referenced_component: Nid) -> Self {
        Self {
            nid,
            uuid,
            object_type: ObjectType::Semantic,
            assemblage: Some(assemblage),
            referenced_component: Some(referenced_component),
            versions: Vec::new(),
        }
    }

    /// Same identity, no versions.
    pub fn empty_copy(&self) -> Self {
        Self {
            versions: Vec::new(),
            ..self.clone()
        }
    }

    #[inline]
    pub fn nid(&self) -> Nid {
        self.nid
    }

    #[inline]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[inline]
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn assemblage(&self) -> Option<Nid> {
        self.assemblage
    }

    pub fn referenced_component(&self) -> Option<Nid> {
        self.referenced_component
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn version_for_stamp(&self, stamp_sequence: StampSequence) -> Option<&Version> {
        self.versions
            .iter()
            .find(|v| v.stamp_sequence == stamp_sequence)
    }

    /// Builder form of [`Chronology::add_version`].
    pub fn with_version(mut self, version: Version) -> Self {
        self.add_version(version);
        self
    }

    /// Add a version, replacing one with the same stamp sequence.
    pub fn add_version(&mut self, version: Version) {
        match self
            .versions
            .iter_mut()
            .find(|v| v.stamp_sequence == version.stamp_sequence)
        {
            Some(existing) => *existing = version,
            None => self.versions.push(version),
        }
    }

    /// Merge every version of `other` into `self`.
    pub fn merge(&mut self, other: &Chronology) {
        for version in &other.versions {
            self.add_version(version.clone());
        }
    }

    pub fn has_uncommitted(&self) -> bool {
        self.versions.iter().any(Version::is_uncommitted)
    }

    pub fn uncommitted_versions(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter().filter(|v| v.is_uncommitted())
    }

    /// Keep only versions matching `keep`. Returns the number removed.
    pub fn retain_versions<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Version) -> bool,
    {
        let before = self.versions.len();
        self.versions.retain(|v| keep(v));
        before - self.versions.len()
    }

    /// Set the commit state of versions whose stamp is in `stamps`.
    /// Returns the number of versions changed.
    pub fn set_commit_state(&mut self, stamps: &BTreeSet<StampSequence>, state: CommitState) -> usize {
        let mut changed = 0;
        for version in &mut self.versions {
            if stamps.contains(&version.stamp_sequence) && version.commit_state != state {
                version.commit_state = state;
                changed += 1;
            }
        }
        changed
    }
}
