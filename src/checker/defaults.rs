//! Mandatory checkers
//!
//! - At most one uncommitted version per author per chronology (warning)
//! - Description versions must have their required fields set (error)

use std::collections::BTreeMap;

use super::alert::{Alert, CheckPhase};
use super::registry::{ChangeChecker, CheckContext};
use crate::chronology::{Chronology, VersionData};
use crate::nid::Nid;

/// Warns when one author has more than one uncommitted version on the same
/// chronology: committing would keep only one of them in most editors' view.
#[derive(Debug, Default)]
pub struct SingleUncommittedVersionChecker;

impl ChangeChecker for SingleUncommittedVersionChecker {
    fn name(&self) -> &str {
        "single-uncommitted-version"
    }

    fn check(
        &self,
        chronology: &Chronology,
        _phase: CheckPhase,
        context: &CheckContext<'_>,
    ) -> Option<Alert> {
        let mut per_author: BTreeMap<Nid, usize> = BTreeMap::new();
        for version in chronology.uncommitted_versions() {
            if let Some(stamp) = context.stamps.stamp(version.stamp_sequence) {
                *per_author.entry(stamp.author).or_default() += 1;
            }
        }

        let (author, count) = per_author.into_iter().find(|(_, count)| *count > 1)?;
        Some(Alert::warning(
            self.name(),
            chronology.nid(),
            format!(
                "possible data loss: author {} has {} uncommitted versions",
                author, count
            ),
        ))
    }
}

/// Blocks commit of description versions with unset required fields.
#[derive(Debug, Default)]
pub struct DescriptionVersionChecker;

impl ChangeChecker for DescriptionVersionChecker {
    fn name(&self) -> &str {
        "well-formed-description"
    }

    fn check(
        &self,
        chronology: &Chronology,
        _phase: CheckPhase,
        _context: &CheckContext<'_>,
    ) -> Option<Alert> {
        chronology.uncommitted_versions().find_map(|version| {
            let VersionData::Description(description) = &version.data else {
                return None;
            };
            let missing = description.missing_fields();
            (!missing.is_empty()).then(|| {
                Alert::error(
                    self.name(),
                    chronology.nid(),
                    format!(
                        "description version with stamp {} is missing: {}",
                        version.stamp_sequence,
                        missing.join(", ")
                    ),
                )
            })
        })
    }
}
