//! Handlers for the built-in change kinds.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::change::{Change, ChangeKind};
use crate::error::{FlexError, Result};
use crate::tree::UiTree;

use super::change_registry::ChangeRegistry;
use super::handler::{ChangeHandler, Classification, CondenserInfo};

/// Registers handlers for every built-in change kind.
pub fn register_builtin_handlers(registry: &ChangeRegistry) -> Result<()> {
    registry.register(ChangeKind::Hide, Arc::new(VisibilityHandler { visible: false }))?;
    registry.register(ChangeKind::Unhide, Arc::new(VisibilityHandler { visible: true }))?;
    registry.register(ChangeKind::AddChild, Arc::new(AddChildHandler))?;
    registry.register(ChangeKind::RemoveChild, Arc::new(RemoveChildHandler))?;
    registry.register(ChangeKind::Move, Arc::new(MoveHandler))?;
    registry.register(ChangeKind::SetProperty, Arc::new(SetPropertyHandler))?;
    registry.register(ChangeKind::Rename, Arc::new(RenameHandler))?;
    Ok(())
}

fn invalid_content(change: &Change, reason: impl Into<String>) -> FlexError {
    FlexError::InvalidContent {
        change_id: change.id.to_string(),
        reason: reason.into(),
    }
}

fn content_str<'a>(change: &'a Change, field: &str) -> Result<&'a str> {
    change
        .content
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_content(change, format!("missing string field '{}'", field)))
}

fn content_index(change: &Change, field: &str) -> Result<Option<usize>> {
    match change.content.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|index| usize::try_from(index).ok())
            .map(Some)
            .ok_or_else(|| invalid_content(change, format!("'{}' must be an unsigned integer", field))),
    }
}

fn revert_str<'a>(change: &Change, data: &'a Value, field: &str) -> Result<&'a str> {
    data.get(field).and_then(Value::as_str).ok_or_else(|| {
        FlexError::HandlerRevertFailure {
            change_id: change.id.to_string(),
            reason: format!("revert data lacks '{}'", field),
        }
    })
}

fn revert_index(change: &Change, data: &Value, field: &str) -> Result<usize> {
    data.get(field)
        .and_then(Value::as_u64)
        .and_then(|index| usize::try_from(index).ok())
        .ok_or_else(|| FlexError::HandlerRevertFailure {
            change_id: change.id.to_string(),
            reason: format!("revert data lacks '{}'", field),
        })
}

/// `hide` / `unhide`: toggles node visibility.
struct VisibilityHandler {
    visible: bool,
}

impl ChangeHandler for VisibilityHandler {
    fn apply_change(&self, change: &Change, tree: &mut dyn UiTree) -> Result<Value> {
        let previous = tree.is_visible(&change.target_selector)?;
        tree.set_visible(&change.target_selector, self.visible)?;
        Ok(json!({ "visible": previous }))
    }

    fn revert_change(&self, change: &Change, revert_data: &Value, tree: &mut dyn UiTree) -> Result<()> {
        let previous = revert_data
            .get("visible")
            .and_then(Value::as_bool)
            .ok_or_else(|| FlexError::HandlerRevertFailure {
                change_id: change.id.to_string(),
                reason: "revert data lacks 'visible'".to_string(),
            })?;
        tree.set_visible(&change.target_selector, previous)
    }

    fn condenser_info(&self, change: &Change) -> Option<CondenserInfo> {
        Some(CondenserInfo {
            classification: Classification::Reverse,
            unique_key: format!("visible:{}", change.target_selector),
            affected_element: change.target_selector.clone(),
            target_state: Some(json!({ "visible": self.visible })),
        })
    }

    fn reapplicable(&self) -> bool {
        true
    }
}

/// `addChild`: creates node `content.id` under the target at `content.index`.
struct AddChildHandler;

impl ChangeHandler for AddChildHandler {
    fn apply_change(&self, change: &Change, tree: &mut dyn UiTree) -> Result<Value> {
        let id = content_str(change, "id")?;
        let index = match content_index(change, "index")? {
            Some(index) => index,
            None => tree.children(&change.target_selector)?.len(),
        };
        let properties = match change.content.get("properties") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };

        tree.create_node(&change.target_selector, index, id, properties)?;
        Ok(json!({ "id": id }))
    }

    fn revert_change(&self, change: &Change, revert_data: &Value, tree: &mut dyn UiTree) -> Result<()> {
        let id = revert_str(change, revert_data, "id")?;
        tree.detach(id)?;
        Ok(())
    }

    fn complete_change_content(&self, change: &mut Change) -> Result<()> {
        content_str(change, "id")?;
        content_index(change, "index")?;

        let needs_default = match change.content.get("properties") {
            None | Some(Value::Null) => true,
            Some(Value::Object(_)) => false,
            Some(_) => return Err(invalid_content(change, "'properties' must be an object")),
        };
        if needs_default {
            if let Value::Object(content) = &mut change.content {
                content.insert("properties".to_string(), Value::Object(Map::new()));
            }
        }
        Ok(())
    }

    fn condenser_info(&self, change: &Change) -> Option<CondenserInfo> {
        let id = change.content.get("id").and_then(Value::as_str)?;
        Some(CondenserInfo {
            classification: Classification::Create,
            unique_key: format!("element:{}", id),
            affected_element: id.to_string(),
            target_state: None,
        })
    }
}

/// `removeChild`: detaches child `content.id` from the target.
struct RemoveChildHandler;

impl ChangeHandler for RemoveChildHandler {
    fn apply_change(&self, change: &Change, tree: &mut dyn UiTree) -> Result<Value> {
        let id = content_str(change, "id")?;
        let (parent, index) = tree
            .parent_of(id)?
            .filter(|(parent, _)| parent == &change.target_selector)
            .ok_or_else(|| {
                invalid_content(
                    change,
                    format!("'{}' is not a child of '{}'", id, change.target_selector),
                )
            })?;

        let snapshot = tree.detach(id)?;
        Ok(json!({ "parent": parent, "index": index, "snapshot": snapshot }))
    }

    fn revert_change(&self, change: &Change, revert_data: &Value, tree: &mut dyn UiTree) -> Result<()> {
        let parent = revert_str(change, revert_data, "parent")?;
        let index = revert_index(change, revert_data, "index")?;
        let snapshot = revert_data
            .get("snapshot")
            .cloned()
            .ok_or_else(|| FlexError::HandlerRevertFailure {
                change_id: change.id.to_string(),
                reason: "revert data lacks 'snapshot'".to_string(),
            })?;
        tree.attach(parent, index, snapshot)
    }

    fn complete_change_content(&self, change: &mut Change) -> Result<()> {
        content_str(change, "id").map(|_| ())
    }

    fn condenser_info(&self, change: &Change) -> Option<CondenserInfo> {
        let id = change.content.get("id").and_then(Value::as_str)?;
        Some(CondenserInfo {
            classification: Classification::Destroy,
            unique_key: format!("element:{}", id),
            affected_element: id.to_string(),
            target_state: None,
        })
    }
}

/// `move`: moves the target to `content.index` under `content.parent`.
///
/// Content and revert data share the `{parent, index}` shape.
struct MoveHandler;

impl ChangeHandler for MoveHandler {
    fn apply_change(&self, change: &Change, tree: &mut dyn UiTree) -> Result<Value> {
        let parent = content_str(change, "parent")?;
        let index = content_index(change, "index")?
            .ok_or_else(|| invalid_content(change, "missing field 'index'"))?;
        let (origin_parent, origin_index) = tree
            .parent_of(&change.target_selector)?
            .ok_or_else(|| invalid_content(change, "the root node cannot be moved"))?;

        tree.move_node(&change.target_selector, parent, index)?;
        Ok(json!({ "parent": origin_parent, "index": origin_index }))
    }

    fn revert_change(&self, change: &Change, revert_data: &Value, tree: &mut dyn UiTree) -> Result<()> {
        let parent = revert_str(change, revert_data, "parent")?;
        let index = revert_index(change, revert_data, "index")?;
        tree.move_node(&change.target_selector, parent, index)
    }

    fn complete_change_content(&self, change: &mut Change) -> Result<()> {
        content_str(change, "parent")?;
        content_index(change, "index")?
            .map(|_| ())
            .ok_or_else(|| invalid_content(change, "missing field 'index'"))
    }

    fn condenser_info(&self, change: &Change) -> Option<CondenserInfo> {
        Some(CondenserInfo {
            classification: Classification::Move,
            unique_key: format!("move:{}", change.target_selector),
            affected_element: change.target_selector.clone(),
            target_state: None,
        })
    }
}

/// `setProperty`: sets `content.property` to `content.value`.
struct SetPropertyHandler;

fn set_property_with_revert(tree: &mut dyn UiTree, selector: &str, name: &str, value: Value) -> Result<Value> {
    let previous = tree.property(selector, name)?;
    tree.set_property(selector, name, value)?;
    Ok(json!({
        "property": name,
        "existed": previous.is_some(),
        "previous": previous.unwrap_or(Value::Null),
    }))
}

fn revert_property(change: &Change, revert_data: &Value, tree: &mut dyn UiTree) -> Result<()> {
    let name = revert_str(change, revert_data, "property")?;
    let existed = revert_data
        .get("existed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if existed {
        let previous = revert_data.get("previous").cloned().unwrap_or(Value::Null);
        tree.set_property(&change.target_selector, name, previous)
    } else {
        tree.remove_property(&change.target_selector, name).map(|_| ())
    }
}

impl ChangeHandler for SetPropertyHandler {
    fn apply_change(&self, change: &Change, tree: &mut dyn UiTree) -> Result<Value> {
        let name = content_str(change, "property")?;
        let value = change.content.get("value").cloned().unwrap_or(Value::Null);
        set_property_with_revert(tree, &change.target_selector, name, value)
    }

    fn revert_change(&self, change: &Change, revert_data: &Value, tree: &mut dyn UiTree) -> Result<()> {
        revert_property(change, revert_data, tree)
    }

    fn complete_change_content(&self, change: &mut Change) -> Result<()> {
        content_str(change, "property").map(|_| ())
    }

    fn condenser_info(&self, change: &Change) -> Option<CondenserInfo> {
        let name = change.content.get("property").and_then(Value::as_str)?;
        Some(CondenserInfo {
            classification: Classification::LastOneWins,
            unique_key: format!("property:{}:{}", change.target_selector, name),
            affected_element: change.target_selector.clone(),
            target_state: None,
        })
    }

    fn reapplicable(&self) -> bool {
        true
    }
}

/// `rename`: sets the `text` property to `content.text`.
struct RenameHandler;

impl ChangeHandler for RenameHandler {
    fn apply_change(&self, change: &Change, tree: &mut dyn UiTree) -> Result<Value> {
        let text = content_str(change, "text")?;
        set_property_with_revert(tree, &change.target_selector, "text", Value::from(text))
    }

    fn revert_change(&self, change: &Change, revert_data: &Value, tree: &mut dyn UiTree) -> Result<()> {
        revert_property(change, revert_data, tree)
    }

    fn complete_change_content(&self, change: &mut Change) -> Result<()> {
        content_str(change, "text").map(|_| ())
    }

    fn condenser_info(&self, change: &Change) -> Option<CondenserInfo> {
        Some(CondenserInfo {
            classification: Classification::LastOneWins,
            unique_key: format!("property:{}:text", change.target_selector),
            affected_element: change.target_selector.clone(),
            target_state: None,
        })
    }

    fn reapplicable(&self) -> bool {
        true
    }
}
