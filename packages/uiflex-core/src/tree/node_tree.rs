use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FlexError, Result};

use super::UiTree;

/// A node of a [`NodeTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub visible: bool,
    pub properties: BTreeMap<String, Value>,
    pub children: Vec<String>,
    parent: Option<String>,
}

impl Node {
    fn new(id: &str, parent: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            visible: true,
            properties: BTreeMap::new(),
            children: Vec::new(),
            parent,
        }
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

/// In-memory UI tree keyed by node id.
///
/// Equality is observational: two trees are equal when every node has the
/// same visibility, properties and child order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTree {
    id: String,
    root: String,
    nodes: HashMap<String, Node>,
}

impl NodeTree {
    /// Creates a tree holding only a root node.
    pub fn new(id: impl Into<String>, root: &str) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(root.to_string(), Node::new(root, None));
        Self {
            id: id.into(),
            root: root.to_string(),
            nodes,
        }
    }

    /// Appends a new node under `parent`.
    pub fn add_node(&mut self, parent: &str, id: &str) -> Result<()> {
        let index = self.node(parent).map(|node| node.children.len()).unwrap_or(0);
        self.create_node(parent, index, id, Map::new())
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_or_err(&self, selector: &str) -> Result<&Node> {
        self.nodes
            .get(selector)
            .ok_or_else(|| FlexError::SelectorNotFound {
                selector: selector.to_string(),
            })
    }

    fn node_mut_or_err(&mut self, selector: &str) -> Result<&mut Node> {
        self.nodes
            .get_mut(selector)
            .ok_or_else(|| FlexError::SelectorNotFound {
                selector: selector.to_string(),
            })
    }

    /// Collects a subtree in pre-order.
    fn subtree(&self, selector: &str) -> Vec<String> {
        let mut ids = Vec::new();
        let mut stack = vec![selector.to_string()];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().cloned());
                ids.push(id);
            }
        }
        ids
    }

    fn is_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        let mut current = Some(candidate.to_string());
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|node| node.parent.clone());
        }
        false
    }

    fn insert_into_parent(&mut self, parent: &str, index: usize, child: &str) -> Result<()> {
        let parent_node = self.node_mut_or_err(parent)?;
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, child.to_string());
        Ok(())
    }

    fn unlink_from_parent(&mut self, selector: &str) -> Result<(String, usize)> {
        let parent = self
            .node_or_err(selector)?
            .parent
            .clone()
            .ok_or_else(|| FlexError::InvalidContent {
                change_id: selector.to_string(),
                reason: "the root node cannot be detached".to_string(),
            })?;
        let parent_node = self.node_mut_or_err(&parent)?;
        let index = parent_node
            .children
            .iter()
            .position(|child| child == selector)
            .ok_or_else(|| {
                FlexError::DataCorruption(format!(
                    "node '{}' missing from children of '{}'",
                    selector, parent
                ))
            })?;
        parent_node.children.remove(index);
        Ok((parent, index))
    }
}

impl UiTree for NodeTree {
    fn tree_id(&self) -> &str {
        &self.id
    }

    fn contains(&self, selector: &str) -> bool {
        self.nodes.contains_key(selector)
    }

    fn is_visible(&self, selector: &str) -> Result<bool> {
        Ok(self.node_or_err(selector)?.visible)
    }

    fn set_visible(&mut self, selector: &str, visible: bool) -> Result<()> {
        self.node_mut_or_err(selector)?.visible = visible;
        Ok(())
    }

    fn property(&self, selector: &str, name: &str) -> Result<Option<Value>> {
        Ok(self.node_or_err(selector)?.properties.get(name).cloned())
    }

    fn set_property(&mut self, selector: &str, name: &str, value: Value) -> Result<()> {
        self.node_mut_or_err(selector)?
            .properties
            .insert(name.to_string(), value);
        Ok(())
    }

    fn remove_property(&mut self, selector: &str, name: &str) -> Result<Option<Value>> {
        Ok(self.node_mut_or_err(selector)?.properties.remove(name))
    }

    fn children(&self, selector: &str) -> Result<Vec<String>> {
        Ok(self.node_or_err(selector)?.children.clone())
    }

    fn parent_of(&self, selector: &str) -> Result<Option<(String, usize)>> {
        let node = self.node_or_err(selector)?;
        let Some(parent) = node.parent.as_deref() else {
            return Ok(None);
        };
        let index = self
            .node_or_err(parent)?
            .children
            .iter()
            .position(|child| child == selector)
            .ok_or_else(|| {
                FlexError::DataCorruption(format!(
                    "node '{}' missing from children of '{}'",
                    selector, parent
                ))
            })?;
        Ok(Some((parent.to_string(), index)))
    }

    fn create_node(
        &mut self,
        parent: &str,
        index: usize,
        id: &str,
        properties: Map<String, Value>,
    ) -> Result<()> {
        if self.nodes.contains_key(id) {
            return Err(FlexError::InvalidContent {
                change_id: id.to_string(),
                reason: format!("node '{}' already exists", id),
            });
        }
        self.insert_into_parent(parent, index, id)?;

        let mut node = Node::new(id, Some(parent.to_string()));
        node.properties = properties.into_iter().collect();
        self.nodes.insert(id.to_string(), node);
        Ok(())
    }

    fn detach(&mut self, selector: &str) -> Result<Value> {
        self.unlink_from_parent(selector)?;

        let removed: Vec<Node> = self
            .subtree(selector)
            .iter()
            .filter_map(|id| self.nodes.remove(id))
            .collect();
        serde_json::to_value(removed).map_err(|e| FlexError::SerializationError(e.to_string()))
    }

    fn attach(&mut self, parent: &str, index: usize, snapshot: Value) -> Result<()> {
        let mut removed: Vec<Node> = serde_json::from_value(snapshot)
            .map_err(|e| FlexError::SerializationError(format!("invalid subtree snapshot: {}", e)))?;
        if let Some(existing) = removed.iter().find(|node| self.nodes.contains_key(&node.id)) {
            return Err(FlexError::InvalidContent {
                change_id: existing.id.clone(),
                reason: format!("node '{}' already exists", existing.id),
            });
        }
        let top = removed.first_mut().ok_or_else(|| {
            FlexError::SerializationError("empty subtree snapshot".to_string())
        })?;

        let top_id = top.id.clone();
        top.parent = Some(parent.to_string());
        self.insert_into_parent(parent, index, &top_id)?;
        for node in removed {
            self.nodes.insert(node.id.clone(), node);
        }
        Ok(())
    }

    fn move_node(&mut self, selector: &str, parent: &str, index: usize) -> Result<()> {
        self.node_or_err(parent)?;
        if self.is_descendant(parent, selector) {
            return Err(FlexError::InvalidContent {
                change_id: selector.to_string(),
                reason: format!("cannot move '{}' into its own subtree", selector),
            });
        }

        self.unlink_from_parent(selector)?;
        self.insert_into_parent(parent, index, selector)?;
        self.node_mut_or_err(selector)?.parent = Some(parent.to_string());
        Ok(())
    }
}
