use std::collections::HashMap;
use std::sync::RwLock;

use crate::change::ChangeSet;
use crate::error::{FlexError, Result};
use crate::version::Version;

use super::ChangeStore;

/// In-process store keeping change sets and versions in maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    changes: RwLock<HashMap<String, ChangeSet>>,
    versions: RwLock<HashMap<String, Vec<Version>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored references, sorted.
    pub fn references(&self) -> Vec<String> {
        let mut references: Vec<String> = match self.changes.read() {
            Ok(changes) => changes.keys().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        references.sort();
        references
    }
}

impl ChangeStore for MemoryStore {
    fn load(&self, reference: &str) -> Result<ChangeSet> {
        let changes = self.changes.read().map_err(|_| FlexError::LockPoisoned)?;
        Ok(changes.get(reference).cloned().unwrap_or_default())
    }

    fn save(&self, reference: &str, change_set: &ChangeSet) -> Result<()> {
        let mut changes = self.changes.write().map_err(|_| FlexError::LockPoisoned)?;
        changes.insert(reference.to_string(), change_set.without_revert_data());
        Ok(())
    }

    fn load_versions(&self, reference: &str) -> Result<Vec<Version>> {
        let versions = self.versions.read().map_err(|_| FlexError::LockPoisoned)?;
        Ok(versions.get(reference).cloned().unwrap_or_default())
    }

    fn save_versions(&self, reference: &str, records: &[Version]) -> Result<()> {
        let mut versions = self.versions.write().map_err(|_| FlexError::LockPoisoned)?;
        versions.insert(reference.to_string(), records.to_vec());
        Ok(())
    }
}
