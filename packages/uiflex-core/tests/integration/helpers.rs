//! Shared fixtures for integration tests.

use std::sync::Arc;

use serde_json::{json, Value};

use uiflex_core::change::{Change, ChangeKind, Layer};
use uiflex_core::registry::ChangeRegistry;
use uiflex_core::tree::NodeTree;

/// Page with a header, a toolbar and a two-row table.
pub fn sample_page() -> NodeTree {
    let mut tree = NodeTree::new("orders-page", "page");
    tree.add_node("page", "header").unwrap();
    tree.add_node("header", "title").unwrap();
    tree.add_node("page", "toolbar").unwrap();
    tree.add_node("toolbar", "save").unwrap();
    tree.add_node("toolbar", "cancel").unwrap();
    tree.add_node("page", "table").unwrap();
    tree.add_node("table", "row-1").unwrap();
    tree.add_node("table", "row-2").unwrap();
    tree
}

pub fn builtin_registry() -> Arc<ChangeRegistry> {
    Arc::new(ChangeRegistry::with_builtin_handlers().unwrap())
}

/// Builds a user-layer change through the registry so content is completed.
pub fn change(
    registry: &ChangeRegistry,
    id: &str,
    kind: ChangeKind,
    selector: &str,
    content: Value,
) -> Change {
    registry
        .create_change(id, kind, selector, content, Layer::User)
        .unwrap()
}

pub fn set_property(registry: &ChangeRegistry, id: &str, selector: &str, name: &str, value: &str) -> Change {
    change(
        registry,
        id,
        ChangeKind::SetProperty,
        selector,
        json!({ "property": name, "value": value }),
    )
}
