use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::change::ChangeSet;
use crate::error::{FlexError, Result};

/// Identifier of a version, unique within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub u64);

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle stage of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionType {
    Active,
    Draft,
    Inactive,
}

/// A named, activatable snapshot of a reference's change set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: VersionId,
    pub reference: String,
    pub version_type: VersionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub change_set: ChangeSet,
}

#[derive(Debug, Default)]
struct VersionTable {
    versions: BTreeMap<VersionId, Version>,
    next_id: u64,
}

impl VersionTable {
    fn find(&self, reference: &str, version_type: VersionType) -> Option<&Version> {
        self.versions
            .values()
            .find(|version| version.reference == reference && version.version_type == version_type)
    }

    fn find_id(&self, reference: &str, version_type: VersionType) -> Option<VersionId> {
        self.find(reference, version_type).map(|version| version.id)
    }
}

/// Versions of change sets, grouped by reference.
///
/// Each reference has at most one draft and at most one active version.
/// All mutations happen under a single write lock, so activation is atomic
/// for readers of the same store.
#[derive(Debug, Default)]
pub struct VersionStore {
    table: RwLock<VersionTable>,
}

impl VersionStore {
    /// Creates a new empty version store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a draft version of a change set.
    ///
    /// An existing draft of the same reference is replaced.
    ///
    /// # Returns
    /// The id of the new draft.
    pub fn create_version(
        &self,
        reference: &str,
        change_set: ChangeSet,
        title: Option<String>,
    ) -> Result<VersionId> {
        let mut table = self.table.write().map_err(|_| FlexError::LockPoisoned)?;

        if let Some(previous) = table.find_id(reference, VersionType::Draft) {
            table.versions.remove(&previous);
            tracing::debug!("Draft {} of '{}' replaced", previous, reference);
        }

        table.next_id += 1;
        let id = VersionId(table.next_id);
        table.versions.insert(
            id,
            Version {
                id,
                reference: reference.to_string(),
                version_type: VersionType::Draft,
                title,
                change_set,
            },
        );
        Ok(id)
    }

    /// Activates a version, demoting the previously active version of the
    /// same reference to inactive.
    ///
    /// # Returns
    /// The id of the previously active version, if any.
    pub fn activate(&self, id: VersionId) -> Result<Option<VersionId>> {
        let mut table = self.table.write().map_err(|_| FlexError::LockPoisoned)?;

        let reference = table
            .versions
            .get(&id)
            .map(|version| version.reference.clone())
            .ok_or(FlexError::VersionNotFound { version_id: id.0 })?;

        let previous = table.find_id(&reference, VersionType::Active);
        if previous == Some(id) {
            return Ok(None);
        }
        if let Some(previous) = previous {
            if let Some(version) = table.versions.get_mut(&previous) {
                version.version_type = VersionType::Inactive;
            }
        }
        if let Some(version) = table.versions.get_mut(&id) {
            version.version_type = VersionType::Active;
        }

        tracing::info!("Version {} of '{}' activated", id, reference);
        Ok(previous)
    }

    /// Returns the active version of a reference.
    pub fn get_active(&self, reference: &str) -> Result<Version> {
        let table = self.table.read().map_err(|_| FlexError::LockPoisoned)?;
        table
            .find(reference, VersionType::Active)
            .cloned()
            .ok_or_else(|| FlexError::NoActiveVersion {
                reference: reference.to_string(),
            })
    }

    pub fn get(&self, id: VersionId) -> Result<Version> {
        let table = self.table.read().map_err(|_| FlexError::LockPoisoned)?;
        table
            .versions
            .get(&id)
            .cloned()
            .ok_or(FlexError::VersionNotFound { version_id: id.0 })
    }

    pub fn draft(&self, reference: &str) -> Result<Option<Version>> {
        let table = self.table.read().map_err(|_| FlexError::LockPoisoned)?;
        Ok(table.find(reference, VersionType::Draft).cloned())
    }

    /// Discards the draft of a reference.
    ///
    /// # Returns
    /// The id of the discarded draft, `None` if there was none.
    pub fn discard_draft(&self, reference: &str) -> Result<Option<VersionId>> {
        let mut table = self.table.write().map_err(|_| FlexError::LockPoisoned)?;
        let draft = table.find_id(reference, VersionType::Draft);
        if let Some(id) = draft {
            table.versions.remove(&id);
        }
        Ok(draft)
    }

    /// Lists the versions of a reference, newest first.
    pub fn list(&self, reference: &str) -> Result<Vec<Version>> {
        let table = self.table.read().map_err(|_| FlexError::LockPoisoned)?;
        Ok(table
            .versions
            .values()
            .rev()
            .filter(|version| version.reference == reference)
            .cloned()
            .collect())
    }

    /// Replaces the versions of a reference with loaded records.
    ///
    /// Rejects record sets holding more than one active or draft version,
    /// ids owned by another reference, or records of another reference.
    pub fn import(&self, reference: &str, versions: Vec<Version>) -> Result<()> {
        let count = |version_type: VersionType| {
            versions
                .iter()
                .filter(|version| version.version_type == version_type)
                .count()
        };
        if count(VersionType::Active) > 1 || count(VersionType::Draft) > 1 {
            return Err(FlexError::DataCorruption(format!(
                "reference '{}' has more than one active or draft version",
                reference
            )));
        }
        if let Some(stray) = versions.iter().find(|version| version.reference != reference) {
            return Err(FlexError::DataCorruption(format!(
                "version {} belongs to '{}', not '{}'",
                stray.id, stray.reference, reference
            )));
        }

        let mut table = self.table.write().map_err(|_| FlexError::LockPoisoned)?;
        if let Some(taken) = versions.iter().find(|version| {
            table
                .versions
                .get(&version.id)
                .is_some_and(|existing| existing.reference != reference)
        }) {
            return Err(FlexError::DataCorruption(format!(
                "version id {} is already used by another reference",
                taken.id
            )));
        }

        table.versions.retain(|_, version| version.reference != reference);
        for version in versions {
            table.next_id = table.next_id.max(version.id.0);
            table.versions.insert(version.id, version);
        }
        Ok(())
    }
}
