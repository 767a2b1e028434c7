//! Condenser tests over generated change logs.

use std::collections::VecDeque;
use std::sync::Arc;

use ntest::timeout;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use uiflex_core::applier::ChangeApplier;
use uiflex_core::change::{Change, ChangeId, ChangeKind, ChangeSet, Layer};
use uiflex_core::condenser::CondenserClassifier;
use uiflex_core::registry::ChangeRegistry;
use uiflex_core::tree::{NodeTree, UiTree};

use super::helpers::{builtin_registry, change, sample_page, set_property};

const SELECTORS: [&str; 4] = ["title", "save", "cancel", "row-1"];
const POOL: [&str; 3] = ["x1", "x2", "x3"];

/// Property-only log in the user layer.
fn random_property_log(registry: &ChangeRegistry, rng: &mut StdRng, len: usize) -> ChangeSet {
    let mut changes: Vec<Change> = Vec::with_capacity(len);
    for i in 0..len {
        let id = format!("c{}", i);
        let selector = SELECTORS[rng.gen_range(0..SELECTORS.len())];
        let next = if rng.gen_bool(0.5) {
            let property = if rng.gen_bool(0.5) { "width" } else { "color" };
            let value = format!("v{}", rng.gen_range(0..10));
            set_property(registry, &id, selector, property, &value)
        } else {
            change(
                registry,
                &id,
                ChangeKind::Rename,
                selector,
                json!({ "text": format!("label {}", i) }),
            )
        };
        changes.push(next);
    }
    ChangeSet::from_changes(changes).unwrap()
}

/// Node ids of `tree` in depth-first order, root first.
fn node_ids(tree: &NodeTree) -> Vec<String> {
    let mut ids = Vec::new();
    let mut stack = vec![tree.root().to_string()];
    while let Some(id) = stack.pop() {
        let children = tree.children(&id).unwrap();
        stack.extend(children.into_iter().rev());
        ids.push(id);
    }
    ids
}

fn pick<'a>(rng: &mut StdRng, ids: &'a [String]) -> Option<&'a str> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[rng.gen_range(0..ids.len())].as_str())
    }
}

/// Draws one change that makes sense for the current state of `tree`.
fn random_change(
    registry: &ChangeRegistry,
    rng: &mut StdRng,
    tree: &NodeTree,
    id: &str,
    layer: Layer,
) -> Option<Change> {
    let ids = node_ids(tree);
    let nodes = &ids[1..];
    let (kind, selector, content) = match rng.gen_range(0..7) {
        0 | 1 => {
            let visible = rng.gen_bool(0.5);
            let candidates: Vec<String> = nodes
                .iter()
                .filter(|node| tree.is_visible(node).unwrap() == visible)
                .cloned()
                .collect();
            let kind = if visible { ChangeKind::Hide } else { ChangeKind::Unhide };
            (kind, pick(rng, &candidates)?.to_string(), json!({}))
        }
        2 => {
            let property = if rng.gen_bool(0.5) { "width" } else { "color" };
            let value = format!("v{}", rng.gen_range(0..10));
            (
                ChangeKind::SetProperty,
                pick(rng, nodes)?.to_string(),
                json!({ "property": property, "value": value }),
            )
        }
        3 => (
            ChangeKind::Rename,
            pick(rng, nodes)?.to_string(),
            json!({ "text": format!("label {}", id) }),
        ),
        4 => {
            let free: Vec<String> = POOL
                .iter()
                .filter(|pooled| !tree.contains(pooled))
                .map(|pooled| pooled.to_string())
                .collect();
            let new_id = pick(rng, &free)?.to_string();
            let mut content = json!({ "id": new_id });
            if rng.gen_bool(0.5) {
                content["index"] = json!(rng.gen_range(0..3));
            }
            (ChangeKind::AddChild, pick(rng, &ids)?.to_string(), content)
        }
        5 => {
            let pooled: Vec<String> = nodes
                .iter()
                .filter(|node| POOL.contains(&node.as_str()))
                .cloned()
                .collect();
            let victim = if !pooled.is_empty() && rng.gen_bool(0.8) {
                pick(rng, &pooled)?
            } else {
                pick(rng, nodes)?
            };
            let (parent, _) = tree.parent_of(victim).unwrap()?;
            (ChangeKind::RemoveChild, parent, json!({ "id": victim }))
        }
        _ => {
            let target = pick(rng, nodes)?.to_string();
            let parent = pick(rng, &ids)?;
            (
                ChangeKind::Move,
                target,
                json!({ "parent": parent, "index": rng.gen_range(0..3) }),
            )
        }
    };
    registry.create_change(id, kind, selector, content, layer).ok()
}

/// Generates a log that applies cleanly to [`sample_page`].
///
/// Layers are generated in precedence order against a running tree, then
/// shuffled together while each layer keeps its own order, so the applier's
/// layer ordering replays the generation order.
fn random_log(registry: &Arc<ChangeRegistry>, rng: &mut StdRng, len: usize) -> ChangeSet {
    let applier = ChangeApplier::new(registry.clone());
    let mut tree = sample_page();
    let mut per_layer: Vec<VecDeque<Change>> = Vec::new();
    let mut next_id = 0;

    for layer in Layer::ALL {
        let mut changes = VecDeque::new();
        for _ in 0..rng.gen_range(0..=len / 2) {
            let id = format!("c{}", next_id);
            next_id += 1;
            let Some(candidate) = random_change(registry, rng, &tree, &id, layer) else {
                continue;
            };
            let mut trial_tree = tree.clone();
            let mut single = ChangeSet::from_changes(vec![candidate.clone()]).unwrap();
            if applier.apply(&mut trial_tree, &mut single).unwrap().is_success() {
                tree = trial_tree;
                changes.push_back(candidate);
            }
        }
        per_layer.push(changes);
    }

    let mut changes = Vec::new();
    loop {
        let pending: Vec<usize> = (0..per_layer.len())
            .filter(|&layer| !per_layer[layer].is_empty())
            .collect();
        if pending.is_empty() {
            break;
        }
        let layer = pending[rng.gen_range(0..pending.len())];
        changes.extend(per_layer[layer].pop_front());
    }
    ChangeSet::from_changes(changes).unwrap()
}

fn applied_to_sample(applier: &ChangeApplier, log: &ChangeSet) -> (NodeTree, ChangeSet) {
    let mut tree = sample_page();
    let mut log = log.clone();
    let report = applier.apply(&mut tree, &mut log).unwrap();
    assert!(report.is_success(), "{:?}", report);
    (tree, log)
}

#[timeout(5000)]
#[test]
fn test_condense_is_idempotent() {
    let registry = builtin_registry();
    let condenser = CondenserClassifier::new(registry.clone());
    let applier = ChangeApplier::new(registry.clone());
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..50 {
        let len = rng.gen_range(0..40);
        let log = random_log(&registry, &mut rng, len);

        let first = condenser.condense(&log);
        assert_eq!(first.kept.len() + first.deleted.len(), log.len());
        let second = condenser.condense(&first.kept);
        assert!(second.deleted.is_empty());
        assert_eq!(second.kept.ids(), first.kept.ids());

        let (_, applied) = applied_to_sample(&applier, &log);
        let first = condenser.condense(&applied);
        let second = condenser.condense(&first.kept);
        assert!(second.deleted.is_empty());
        assert_eq!(second.kept, first.kept);
    }
}

#[timeout(5000)]
#[test]
fn test_property_log_condenses_to_same_effect() {
    let registry = builtin_registry();
    let condenser = CondenserClassifier::new(registry.clone());
    let applier = ChangeApplier::new(registry.clone());
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..30 {
        let len = rng.gen_range(1..30);
        let log = random_property_log(&registry, &mut rng, len);
        let condensed = condenser.condense(&log).kept;

        let (full_tree, _) = applied_to_sample(&applier, &log);
        let (condensed_tree, _) = applied_to_sample(&applier, &condensed);
        assert_eq!(full_tree, condensed_tree);
    }
}

#[timeout(10000)]
#[test]
fn test_condensed_log_has_same_effect() {
    let registry = builtin_registry();
    let condenser = CondenserClassifier::new(registry.clone());
    let applier = ChangeApplier::new(registry.clone());
    let mut rng = StdRng::seed_from_u64(42);

    for round in 0..200 {
        let len = rng.gen_range(1..40);
        let log = random_log(&registry, &mut rng, len);
        let (full_tree, _) = applied_to_sample(&applier, &log);

        let condensed = condenser.condense(&log).kept;
        let (condensed_tree, _) = applied_to_sample(&applier, &condensed);
        assert_eq!(full_tree, condensed_tree, "round {}: {:?}", round, log);
    }
}

#[timeout(10000)]
#[test]
fn test_condensed_applied_log_replays_to_same_tree() {
    let registry = builtin_registry();
    let condenser = CondenserClassifier::new(registry.clone());
    let applier = ChangeApplier::new(registry.clone());
    let mut rng = StdRng::seed_from_u64(7);

    for round in 0..200 {
        let len = rng.gen_range(1..40);
        let log = random_log(&registry, &mut rng, len);
        let (full_tree, applied) = applied_to_sample(&applier, &log);

        let condensed = condenser.condense(&applied).kept.without_revert_data();
        let (replayed_tree, _) = applied_to_sample(&applier, &condensed);
        assert_eq!(full_tree, replayed_tree, "round {}: {:?}", round, log);
    }
}

#[timeout(2000)]
#[test]
fn test_layers_condense_independently() {
    let registry = builtin_registry();
    let condenser = CondenserClassifier::new(registry.clone());
    let applier = ChangeApplier::new(registry.clone());

    let user = set_property(&registry, "u1", "title", "width", "300px");
    let vendor = registry
        .create_change(
            "v1",
            ChangeKind::SetProperty,
            "title",
            json!({ "property": "width", "value": "100px" }),
            Layer::Vendor,
        )
        .unwrap();
    let log = ChangeSet::from_changes(vec![user, vendor]).unwrap();

    let result = condenser.condense(&log);
    assert_eq!(result.kept.ids(), vec![ChangeId::from("u1"), ChangeId::from("v1")]);

    let (tree, _) = applied_to_sample(&applier, &result.kept);
    assert_eq!(tree.property("title", "width").unwrap(), Some(json!("300px")));
}

#[timeout(2000)]
#[test]
fn test_applied_toggles_keep_final_visibility() {
    let registry = builtin_registry();
    let condenser = CondenserClassifier::new(registry.clone());
    let applier = ChangeApplier::new(registry.clone());

    // The tree is prepared so "save" is hidden when the log starts.
    let mut tree = sample_page();
    tree.set_visible("save", false).unwrap();
    let mut log = ChangeSet::from_changes(vec![
        change(&registry, "1", ChangeKind::Unhide, "save", json!({})),
        change(&registry, "2", ChangeKind::Hide, "save", json!({})),
    ])
    .unwrap();
    assert!(applier.apply(&mut tree, &mut log).unwrap().is_success());

    let result = condenser.condense(&log);
    assert!(result.kept.is_empty());

    // Visible before the log: the hide must survive.
    let (tree, applied) = applied_to_sample(&applier, &log.without_revert_data());
    assert!(!tree.is_visible("save").unwrap());
    let result = condenser.condense(&applied);
    assert_eq!(result.kept.ids(), vec![ChangeId::from("2")]);

    let (replayed, _) = applied_to_sample(&applier, &result.kept.without_revert_data());
    assert_eq!(replayed, tree);
}

#[timeout(2000)]
#[test]
fn test_created_container_with_moved_children_survives() {
    let registry = builtin_registry();
    let condenser = CondenserClassifier::new(registry.clone());
    let applier = ChangeApplier::new(registry.clone());

    let log = ChangeSet::from_changes(vec![
        change(&registry, "1", ChangeKind::AddChild, "page", json!({ "id": "x" })),
        change(&registry, "2", ChangeKind::Move, "save", json!({ "parent": "x", "index": 0 })),
        change(&registry, "3", ChangeKind::RemoveChild, "page", json!({ "id": "x" })),
    ])
    .unwrap();
    let (full_tree, _) = applied_to_sample(&applier, &log);
    assert!(!full_tree.contains("save"));

    let result = condenser.condense(&log);
    assert_eq!(result.kept.len(), 3);
    let (condensed_tree, _) = applied_to_sample(&applier, &result.kept);
    assert_eq!(condensed_tree, full_tree);
}

#[timeout(2000)]
#[test]
fn test_condense_preserves_relative_order() {
    let registry = builtin_registry();
    let condenser = CondenserClassifier::new(registry.clone());

    let log = ChangeSet::from_changes(vec![
        set_property(&registry, "a", "title", "width", "1"),
        set_property(&registry, "b", "save", "width", "1"),
        set_property(&registry, "c", "title", "width", "2"),
        set_property(&registry, "d", "cancel", "width", "1"),
    ])
    .unwrap();

    let result = condenser.condense(&log);
    assert_eq!(result.kept.ids(), vec![ChangeId::from("b"), ChangeId::from("c"), ChangeId::from("d")]);
    assert_eq!(result.deleted_ids(), vec![ChangeId::from("a")]);
}
