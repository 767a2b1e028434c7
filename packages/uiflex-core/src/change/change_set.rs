use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{FlexError, Result};

use super::change::{Change, ChangeId};
use super::layer::Layer;

/// Ordered sequence of changes, unique by id.
///
/// Insertion order is application order within a layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Change>", into = "Vec<Change>")]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a change set, rejecting duplicate ids.
    pub fn from_changes(changes: Vec<Change>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(changes.len());
        for change in &changes {
            if !seen.insert(change.id.clone()) {
                return Err(FlexError::DuplicateChange(change.id.to_string()));
            }
        }
        Ok(Self { changes })
    }

    /// Wraps changes already known to be unique by id.
    pub(crate) fn from_unique(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    /// Appends a change.
    pub fn push(&mut self, change: Change) -> Result<()> {
        if self.contains(&change.id) {
            return Err(FlexError::DuplicateChange(change.id.to_string()));
        }
        self.changes.push(change);
        Ok(())
    }

    /// Removes a change by id, preserving the order of the rest.
    pub fn remove(&mut self, id: &ChangeId) -> Result<Change> {
        let index = self
            .position(id)
            .ok_or_else(|| FlexError::ChangeNotFound(id.to_string()))?;
        Ok(self.changes.remove(index))
    }

    pub fn get(&self, id: &ChangeId) -> Option<&Change> {
        self.changes.iter().find(|change| &change.id == id)
    }

    pub fn get_mut(&mut self, id: &ChangeId) -> Option<&mut Change> {
        self.changes.iter_mut().find(|change| &change.id == id)
    }

    pub fn contains(&self, id: &ChangeId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &ChangeId) -> Option<usize> {
        self.changes.iter().position(|change| &change.id == id)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Change> {
        self.changes.iter_mut()
    }

    pub fn as_slice(&self) -> &[Change] {
        &self.changes
    }

    pub fn ids(&self) -> Vec<ChangeId> {
        self.changes.iter().map(|change| change.id.clone()).collect()
    }

    /// Returns the changes addressing the given selector, in order.
    pub fn by_selector(&self, selector: &str) -> Vec<&Change> {
        self.changes
            .iter()
            .filter(|change| change.target_selector == selector)
            .collect()
    }

    /// Returns the changes of a single layer, in order.
    pub fn by_layer(&self, layer: Layer) -> Vec<&Change> {
        self.changes
            .iter()
            .filter(|change| change.layer == layer)
            .collect()
    }

    /// Replaces every change of `layer` with `changes`.
    ///
    /// The replacements are inserted where the first change of the layer
    /// was, or appended when the layer had none. Every replacement must
    /// belong to `layer`.
    pub fn replace_layer(&mut self, layer: Layer, changes: Vec<Change>) -> Result<()> {
        if let Some(stray) = changes.iter().find(|change| change.layer != layer) {
            return Err(FlexError::InvalidContent {
                change_id: stray.id.to_string(),
                reason: format!("expected layer {}, got {}", layer, stray.layer),
            });
        }

        let insert_at = self
            .changes
            .iter()
            .position(|change| change.layer == layer)
            .unwrap_or(self.changes.len());
        let mut merged = Vec::with_capacity(self.changes.len() + changes.len());
        merged.extend(self.changes[..insert_at].iter().cloned());
        merged.extend(changes);
        merged.extend(
            self.changes[insert_at..]
                .iter()
                .filter(|change| change.layer != layer)
                .cloned(),
        );
        *self = ChangeSet::from_changes(merged)?;
        Ok(())
    }

    /// Indices of the changes at or below `max_layer`, in application order.
    ///
    /// Lower layers come first; order within a layer is insertion order.
    pub fn apply_order(&self, max_layer: Layer) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.changes.len())
            .filter(|&index| self.changes[index].layer <= max_layer)
            .collect();
        order.sort_by_key(|&index| self.changes[index].layer);
        order
    }

    /// Returns the changes at or below `max_layer`, in application order.
    pub fn effective(&self, max_layer: Layer) -> ChangeSet {
        let changes = self
            .apply_order(max_layer)
            .into_iter()
            .map(|index| self.changes[index].clone())
            .collect();
        ChangeSet { changes }
    }

    /// Returns a copy with all runtime revert data dropped, as persisted.
    pub fn without_revert_data(&self) -> ChangeSet {
        let mut set = self.clone();
        for change in &mut set.changes {
            change.take_revert_data();
        }
        set
    }

    pub(crate) fn get_index_mut(&mut self, index: usize) -> Option<&mut Change> {
        self.changes.get_mut(index)
    }

    pub fn into_vec(self) -> Vec<Change> {
        self.changes
    }
}

impl TryFrom<Vec<Change>> for ChangeSet {
    type Error = FlexError;

    fn try_from(changes: Vec<Change>) -> Result<Self> {
        ChangeSet::from_changes(changes)
    }
}

impl From<ChangeSet> for Vec<Change> {
    fn from(set: ChangeSet) -> Self {
        set.changes
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
