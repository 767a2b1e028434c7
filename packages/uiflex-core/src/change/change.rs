use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kind::ChangeKind;
use super::layer::Layer;

/// Identifier of a change, unique within a change set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChangeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChangeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Condenser verdict attached to a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CondenserState {
    /// Not yet condensed
    #[default]
    None,
    /// Survived condensing
    Select,
    /// Dropped by condensing
    Delete,
}

/// A single declarative mutation targeting a node of a UI tree.
///
/// Revert data is runtime state: it is present exactly while the change is
/// applied to a tree, and is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub id: ChangeId,
    pub change_type: ChangeKind,
    pub target_selector: String,
    #[serde(default)]
    pub content: Value,
    pub layer: Layer,
    #[serde(skip)]
    revert_data: Option<Value>,
    #[serde(default)]
    pub condenser_state: CondenserState,
}

impl Change {
    /// Creates an unapplied change.
    pub fn new(
        id: impl Into<ChangeId>,
        change_type: ChangeKind,
        target_selector: impl Into<String>,
        content: Value,
        layer: Layer,
    ) -> Self {
        Self {
            id: id.into(),
            change_type,
            target_selector: target_selector.into(),
            content,
            layer,
            revert_data: None,
            condenser_state: CondenserState::None,
        }
    }

    /// Returns the revert data captured when the change was applied.
    pub fn revert_data(&self) -> Option<&Value> {
        self.revert_data.as_ref()
    }

    /// Returns whether the change is currently applied.
    pub fn is_applied(&self) -> bool {
        self.revert_data.is_some()
    }

    pub(crate) fn set_revert_data(&mut self, data: Value) {
        self.revert_data = Some(data);
    }

    pub(crate) fn take_revert_data(&mut self) -> Option<Value> {
        self.revert_data.take()
    }
}
