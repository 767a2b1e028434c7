use serde_json::Value;

use crate::change::Change;
use crate::error::Result;
use crate::tree::UiTree;

/// How the condenser folds changes sharing a unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Only the most recent change survives
    LastOneWins,
    /// Toggling pairs cancel out; only a state-determining change survives
    Reverse,
    /// Adds an element; cancels against a later `Destroy` of the same element
    Create,
    /// Removes an element
    Destroy,
    /// Repositions an element; the chain collapses to its last move
    Move,
    /// Object contents are merged into the most recent change
    Update,
}

/// Condenser metadata for a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondenserInfo {
    pub classification: Classification,
    /// Grouping key; changes with equal keys are folded together
    pub unique_key: String,
    /// Selector of the element whose state the change determines
    pub affected_element: String,
    /// State the change establishes, in the shape of its revert data.
    ///
    /// Lets `Reverse` chains compare their outcome with the state recorded
    /// before the chain.
    pub target_state: Option<Value>,
}

/// Behavior attached to a change kind.
pub trait ChangeHandler: Send + Sync {
    /// Applies the change and returns the data needed to revert it.
    fn apply_change(&self, change: &Change, tree: &mut dyn UiTree) -> Result<Value>;

    /// Undoes a previously applied change using its revert data.
    fn revert_change(&self, change: &Change, revert_data: &Value, tree: &mut dyn UiTree)
        -> Result<()>;

    /// Validates a freshly created change and fills in content defaults.
    fn complete_change_content(&self, _change: &mut Change) -> Result<()> {
        Ok(())
    }

    /// Condenser metadata, `None` when the change must be kept as-is.
    fn condenser_info(&self, _change: &Change) -> Option<CondenserInfo> {
        None
    }

    /// Whether an applied change may be applied again without reverting.
    ///
    /// Re-application keeps the revert data of the first application.
    fn reapplicable(&self) -> bool {
        false
    }
}
