//! End-to-end workflows: build a change log, apply it, revert it, version it.

use std::sync::Arc;

use ntest::timeout;
use serde_json::json;

use uiflex_core::applier::{ApplyState, ChangeApplier};
use uiflex_core::change::{ChangeId, ChangeKind, ChangeSet, Layer};
use uiflex_core::condenser::CondenserClassifier;
use uiflex_core::tree::UiTree;
use uiflex_core::version::{VersionStore, VersionType};
use uiflex_core::FlexError;

use super::helpers::{builtin_registry, change, sample_page, set_property};

fn mixed_change_set(registry: &uiflex_core::registry::ChangeRegistry) -> ChangeSet {
    ChangeSet::from_changes(vec![
        change(registry, "c1", ChangeKind::Hide, "cancel", json!({})),
        change(
            registry,
            "c2",
            ChangeKind::AddChild,
            "table",
            json!({ "id": "row-3", "properties": { "status": "new" } }),
        ),
        change(
            registry,
            "c3",
            ChangeKind::Move,
            "save",
            json!({ "parent": "header", "index": 0 }),
        ),
        change(registry, "c4", ChangeKind::RemoveChild, "table", json!({ "id": "row-1" })),
        set_property(registry, "c5", "title", "width", "200px"),
        change(registry, "c6", ChangeKind::Rename, "title", json!({ "text": "Orders" })),
    ])
    .unwrap()
}

#[timeout(2000)]
#[test]
fn test_apply_then_revert_restores_tree() {
    let registry = builtin_registry();
    let applier = ChangeApplier::new(registry.clone());
    let original = sample_page();
    let mut tree = original.clone();
    let mut change_set = mixed_change_set(&registry);

    let report = applier.apply(&mut tree, &mut change_set).unwrap();
    assert!(report.is_success(), "failures: {:?}", report.failures);
    assert_eq!(report.applied.len(), 6);
    assert_eq!(
        report.history,
        vec![ApplyState::Initial, ApplyState::Applying, ApplyState::ApplySuccessful]
    );

    assert!(!tree.is_visible("cancel").unwrap());
    assert_eq!(tree.children("table").unwrap(), vec!["row-2", "row-3"]);
    assert_eq!(tree.parent_of("save").unwrap(), Some(("header".to_string(), 0)));
    assert_eq!(tree.property("title", "text").unwrap(), Some(json!("Orders")));
    assert!(change_set.iter().all(|c| c.is_applied()));

    let revert = applier.revert(&mut tree, &mut change_set).unwrap();
    assert!(revert.is_clean());
    assert_eq!(revert.state, ApplyState::RevertFinished);
    assert_eq!(revert.reverted.first().map(|id| id.as_str()), Some("c6"));

    assert_eq!(tree, original);
    assert!(change_set.iter().all(|c| !c.is_applied()));
}

#[timeout(2000)]
#[test]
fn test_failed_change_does_not_block_others() {
    let registry = builtin_registry();
    let applier = ChangeApplier::new(registry.clone());
    let mut tree = sample_page();
    let mut change_set = ChangeSet::from_changes(vec![
        change(&registry, "c1", ChangeKind::Hide, "missing-node", json!({})),
        set_property(&registry, "c2", "save", "enabled", "false"),
    ])
    .unwrap();

    let report = applier.apply(&mut tree, &mut change_set).unwrap();
    assert_eq!(report.state, ApplyState::ApplyFailed);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].change_id.as_str(), "c1");
    assert_eq!(tree.property("save", "enabled").unwrap(), Some(json!("false")));

    let revert = applier.revert(&mut tree, &mut change_set).unwrap();
    assert_eq!(revert.reverted.len(), 1);
    assert_eq!(revert.warnings.len(), 1);
    assert_eq!(tree.property("save", "enabled").unwrap(), None);
}

#[timeout(2000)]
#[test]
fn test_layers_apply_in_order() {
    let registry = builtin_registry();
    let applier = ChangeApplier::new(registry.clone());
    let mut tree = sample_page();

    let vendor = registry
        .create_change(
            "v1",
            ChangeKind::SetProperty,
            "title",
            json!({ "property": "width", "value": "100px" }),
            Layer::Vendor,
        )
        .unwrap();
    // The user change is listed first but must be applied last.
    let user = set_property(&registry, "u1", "title", "width", "300px");
    let mut change_set = ChangeSet::from_changes(vec![user, vendor]).unwrap();

    applier.apply(&mut tree, &mut change_set).unwrap();
    assert_eq!(tree.property("title", "width").unwrap(), Some(json!("300px")));
}

#[timeout(2000)]
#[test]
fn test_condense_save_activate_flow() {
    let registry = builtin_registry();
    let condenser = CondenserClassifier::new(registry.clone());
    let versions = VersionStore::new();

    let log = ChangeSet::from_changes(vec![
        change(&registry, "c1", ChangeKind::Hide, "cancel", json!({})),
        change(&registry, "c2", ChangeKind::Unhide, "cancel", json!({})),
        set_property(&registry, "c3", "title", "width", "10px"),
        set_property(&registry, "c4", "title", "width", "20px"),
        change(&registry, "c5", ChangeKind::AddChild, "table", json!({ "id": "row-9" })),
        change(&registry, "c6", ChangeKind::RemoveChild, "table", json!({ "id": "row-9" })),
    ])
    .unwrap();

    let condensed = condenser.condense(&log);
    assert_eq!(condensed.kept.ids(), vec![ChangeId::from("c4")]);
    assert_eq!(condensed.deleted.len(), 5);

    let draft = versions
        .create_version("orders", condensed.kept.clone(), Some("width tweak".to_string()))
        .unwrap();
    assert!(matches!(
        versions.get_active("orders"),
        Err(FlexError::NoActiveVersion { .. })
    ));

    assert_eq!(versions.activate(draft).unwrap(), None);
    let active = versions.get_active("orders").unwrap();
    assert_eq!(active.id, draft);
    assert_eq!(active.version_type, VersionType::Active);

    let next = versions
        .create_version("orders", log, None)
        .unwrap();
    assert_eq!(versions.activate(next).unwrap(), Some(draft));
    assert_eq!(versions.get(draft).unwrap().version_type, VersionType::Inactive);

    let mut tree = sample_page();
    let mut active_changes = versions.get_active("orders").unwrap().change_set;
    let applier = ChangeApplier::new(Arc::clone(&registry));
    let report = applier.apply(&mut tree, &mut active_changes).unwrap();
    assert!(report.is_success());
    assert_eq!(tree.children("table").unwrap(), vec!["row-1", "row-2"]);
}
