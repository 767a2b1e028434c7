//! UI tree boundary.
//!
//! The engine never inspects a tree directly; handlers go through
//! [`UiTree`], which the host framework implements. [`NodeTree`] is an
//! in-memory implementation.

mod node_tree;

pub use node_tree::{Node, NodeTree};

use serde_json::{Map, Value};

use crate::error::Result;

/// Addressable UI tree. Nodes are reached by selector (node id).
pub trait UiTree {
    /// Identifier of the tree, used to serialize apply cycles per tree.
    fn tree_id(&self) -> &str;

    fn contains(&self, selector: &str) -> bool;

    fn is_visible(&self, selector: &str) -> Result<bool>;

    fn set_visible(&mut self, selector: &str, visible: bool) -> Result<()>;

    fn property(&self, selector: &str, name: &str) -> Result<Option<Value>>;

    fn set_property(&mut self, selector: &str, name: &str, value: Value) -> Result<()>;

    /// Removes a property, returning its previous value.
    fn remove_property(&mut self, selector: &str, name: &str) -> Result<Option<Value>>;

    fn children(&self, selector: &str) -> Result<Vec<String>>;

    /// Returns the parent selector and the index within it, `None` for the root.
    fn parent_of(&self, selector: &str) -> Result<Option<(String, usize)>>;

    /// Creates a new leaf node under `parent` at `index`.
    fn create_node(
        &mut self,
        parent: &str,
        index: usize,
        id: &str,
        properties: Map<String, Value>,
    ) -> Result<()>;

    /// Detaches a subtree, returning an opaque snapshot accepted by [`UiTree::attach`].
    fn detach(&mut self, selector: &str) -> Result<Value>;

    /// Re-attaches a subtree snapshot under `parent` at `index`.
    fn attach(&mut self, parent: &str, index: usize, snapshot: Value) -> Result<()>;

    /// Moves a node to `index` under `parent`.
    fn move_node(&mut self, selector: &str, parent: &str, index: usize) -> Result<()>;
}
