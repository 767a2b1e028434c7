//! Change-log condensing.
//!
//! Changes are folded in application order. Changes of one layer are
//! grouped by the unique key their handler reports and each group is folded
//! according to its classification; survivors keep their original relative
//! order. Changes without condenser metadata are always kept.
//!
//! A fold only drops changes whose removal cannot be observed by the rest of
//! the log:
//! - chains are split where their element is created and wherever a node
//!   is destroyed;
//! - move chains and create/destroy pairs stay intact when another
//!   structural change (create, destroy, move, or a change without
//!   metadata) runs between their ends.
//!
//! Folding repeats until nothing more is dropped.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::change::{Change, ChangeId, ChangeSet, CondenserState, Layer};
use crate::registry::{ChangeRegistry, Classification, CondenserInfo};

/// Result of condensing a change set.
#[derive(Debug, Clone, PartialEq)]
pub struct CondenseResult {
    /// Surviving changes, marked `Select`
    pub kept: ChangeSet,
    /// Dropped changes, marked `Delete`, in original order
    pub deleted: Vec<Change>,
}

impl CondenseResult {
    pub fn deleted_ids(&self) -> Vec<ChangeId> {
        self.deleted.iter().map(|change| change.id.clone()).collect()
    }
}

/// Reduces redundant and contradictory changes before persistence.
#[derive(Debug, Clone)]
pub struct CondenserClassifier {
    registry: Arc<ChangeRegistry>,
}

impl CondenserClassifier {
    pub fn new(registry: Arc<ChangeRegistry>) -> Self {
        Self { registry }
    }

    /// Condenses a change set.
    ///
    /// Condensing is idempotent: condensing `kept` again yields the same set.
    pub fn condense(&self, change_set: &ChangeSet) -> CondenseResult {
        let changes = change_set.as_slice();
        let infos: Vec<Option<CondenserInfo>> = changes.iter().map(|change| self.info(change)).collect();
        let order = change_set.apply_order(Layer::User);

        let mut fold = Fold {
            changes,
            infos: &infos,
            deleted: HashSet::new(),
            merged: HashMap::new(),
            reverts: HashMap::new(),
        };
        loop {
            let before = fold.deleted.len();
            fold.pass(&order);
            if fold.deleted.len() == before {
                break;
            }
        }
        let Fold {
            deleted,
            mut merged,
            mut reverts,
            ..
        } = fold;

        let mut kept = Vec::with_capacity(changes.len() - deleted.len());
        let mut dropped = Vec::with_capacity(deleted.len());
        for (index, change) in changes.iter().enumerate() {
            let mut change = change.clone();
            if deleted.contains(&index) {
                change.condenser_state = CondenserState::Delete;
                dropped.push(change);
            } else {
                if let Some(content) = merged.remove(&index) {
                    change.content = content;
                }
                if let Some(revert_data) = reverts.remove(&index) {
                    change.set_revert_data(revert_data);
                }
                change.condenser_state = CondenserState::Select;
                kept.push(change);
            }
        }

        tracing::debug!(
            "Condensed {} changes to {} ({} deleted)",
            changes.len(),
            kept.len(),
            dropped.len()
        );

        CondenseResult {
            kept: ChangeSet::from_unique(kept),
            deleted: dropped,
        }
    }

    fn info(&self, change: &Change) -> Option<CondenserInfo> {
        match self.registry.get_handler(&change.change_type) {
            Ok(handler) => handler.condenser_info(change),
            Err(err) => {
                tracing::debug!("Change '{}' kept as-is: {}", change.id, err);
                None
            }
        }
    }
}

/// Changes that add, remove or reposition nodes, or whose effect is unknown.
fn is_structural(info: Option<&CondenserInfo>) -> bool {
    match info {
        None => true,
        Some(info) => matches!(
            info.classification,
            Classification::Create | Classification::Destroy | Classification::Move
        ),
    }
}

/// Fold state shared by all passes.
struct Fold<'a> {
    changes: &'a [Change],
    infos: &'a [Option<CondenserInfo>],
    deleted: HashSet<usize>,
    /// Merged contents of `Update` survivors
    merged: HashMap<usize, Value>,
    /// Revert data a survivor takes over from the first change of its chain
    reverts: HashMap<usize, Value>,
}

impl<'a> Fold<'a> {
    fn info(&self, index: usize) -> Option<&'a CondenserInfo> {
        self.infos[index].as_ref()
    }

    fn classification(&self, index: usize) -> Option<Classification> {
        self.info(index).map(|info| info.classification)
    }

    fn revert_data(&self, index: usize) -> Option<&Value> {
        self.reverts
            .get(&index)
            .or_else(|| self.changes[index].revert_data())
    }

    fn content(&self, index: usize) -> &Value {
        self.merged
            .get(&index)
            .unwrap_or(&self.changes[index].content)
    }

    /// One fold over the surviving changes in application order.
    fn pass(&mut self, order: &[usize]) {
        let live: Vec<usize> = order
            .iter()
            .copied()
            .filter(|index| !self.deleted.contains(index))
            .collect();
        let position: HashMap<usize, usize> = live
            .iter()
            .enumerate()
            .map(|(position, &index)| (index, position))
            .collect();

        // BTreeMap keeps the fold deterministic.
        let mut groups: BTreeMap<(Layer, &'a str), Vec<usize>> = BTreeMap::new();
        for &index in &live {
            if let Some(info) = self.info(index) {
                let key = (self.changes[index].layer, info.unique_key.as_str());
                groups.entry(key).or_default().push(index);
            }
        }

        for members in groups.values() {
            self.fold_create_destroy(&live, &position, members);
        }

        for members in groups.values() {
            let members: Vec<usize> = members
                .iter()
                .copied()
                .filter(|index| !self.deleted.contains(index))
                .collect();
            let Some(&first) = members.first() else {
                continue;
            };
            let Some(info) = self.info(first) else {
                continue;
            };
            if matches!(
                info.classification,
                Classification::Create | Classification::Destroy
            ) {
                continue;
            }

            for segment in self.segments(&live, &position, &members, &info.affected_element) {
                match info.classification {
                    Classification::LastOneWins => self.keep_last(&segment),
                    Classification::Reverse => self.fold_reverse(&segment),
                    Classification::Move => self.fold_move(&live, &position, &segment),
                    Classification::Update => self.fold_update(&segment),
                    Classification::Create | Classification::Destroy => {}
                }
            }
        }
    }

    /// Surviving changes strictly between two positions of `live`.
    fn between(&self, live: &[usize], from: usize, to: usize) -> Vec<usize> {
        if from + 1 >= to {
            return Vec::new();
        }
        live[from + 1..to]
            .iter()
            .copied()
            .filter(|index| !self.deleted.contains(index))
            .collect()
    }

    /// Splits a group where its element may be created or destroyed.
    ///
    /// Removing any node may take the element down with it as a descendant.
    fn segments(
        &self,
        live: &[usize],
        position: &HashMap<usize, usize>,
        members: &[usize],
        element: &str,
    ) -> Vec<Vec<usize>> {
        let mut segments: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut previous: Option<usize> = None;

        for &index in members {
            let at = position[&index];
            if let Some(prev) = previous {
                let split = self.between(live, prev, at).into_iter().any(|other| {
                    matches!(
                        self.info(other),
                        Some(info) if info.classification == Classification::Destroy
                            || (info.classification == Classification::Create
                                && info.affected_element == element)
                    )
                });
                if split && !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            current.push(index);
            previous = Some(at);
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }

    /// Cancels each `Create` against the next `Destroy` of the same element.
    ///
    /// The pair and the changes addressing the element in between are
    /// dropped. The pair stays when a structural change runs in between.
    fn fold_create_destroy(
        &mut self,
        live: &[usize],
        position: &HashMap<usize, usize>,
        members: &[usize],
    ) {
        let mut pending_create: Option<usize> = None;
        for &index in members {
            if self.deleted.contains(&index) {
                continue;
            }
            match self.classification(index) {
                Some(Classification::Create) => pending_create = Some(index),
                Some(Classification::Destroy) => {
                    let Some(create) = pending_create.take() else {
                        continue;
                    };
                    let Some(element) = self.info(create).map(|info| info.affected_element.as_str()) else {
                        continue;
                    };
                    let between = self.between(live, position[&create], position[&index]);
                    if between.iter().any(|&other| is_structural(self.info(other))) {
                        continue;
                    }
                    let addressing: Vec<usize> = between
                        .into_iter()
                        .filter(|&other| self.changes[other].target_selector == element)
                        .collect();
                    self.deleted.insert(create);
                    self.deleted.insert(index);
                    self.deleted.extend(addressing);
                }
                _ => {}
            }
        }
    }

    /// Drops all but the last change of a chain.
    ///
    /// When the chain was applied, the survivor takes over the revert data of
    /// the first change so reverting it restores the state before the chain.
    fn keep_last(&mut self, segment: &[usize]) {
        let Some((&last, earlier)) = segment.split_last() else {
            return;
        };
        let Some(&first) = earlier.first() else {
            return;
        };
        if let Some(prior) = self.revert_data(first).cloned() {
            self.reverts.insert(last, prior);
        }
        self.deleted.extend(earlier.iter().copied());
    }

    /// Toggle chains vanish when the last change restores the state found
    /// before the first one, otherwise only the last change is kept.
    ///
    /// The prior state is the first change's revert data when it has been
    /// applied; otherwise it is taken to be the inverse of the first change.
    fn fold_reverse(&mut self, segment: &[usize]) {
        let (Some(&first), Some(&last)) = (segment.first(), segment.last()) else {
            return;
        };
        let target = self.info(last).and_then(|info| info.target_state.as_ref());
        let no_op = match (self.revert_data(first), target) {
            (Some(prior), Some(target)) => prior == target,
            _ => segment.len() > 1 && self.changes[first].change_type != self.changes[last].change_type,
        };
        if no_op {
            self.deleted.extend(segment.iter().copied());
        } else {
            self.keep_last(segment);
        }
    }

    /// Move chains collapse to the last move, or vanish when the element
    /// ends where the first move found it.
    fn fold_move(&mut self, live: &[usize], position: &HashMap<usize, usize>, segment: &[usize]) {
        let (Some(&first), Some(&last)) = (segment.first(), segment.last()) else {
            return;
        };
        let interleaved = self
            .between(live, position[&first], position[&last])
            .into_iter()
            .any(|other| !segment.contains(&other) && is_structural(self.info(other)));
        if interleaved {
            return;
        }

        let returns_to_origin = self
            .revert_data(first)
            .is_some_and(|origin| same_position(origin, &self.changes[last].content));
        if returns_to_origin {
            self.deleted.extend(segment.iter().copied());
        } else {
            self.keep_last(segment);
        }
    }

    /// Object contents are merged in order into the last change.
    fn fold_update(&mut self, segment: &[usize]) {
        let Some(&last) = segment.last() else {
            return;
        };
        if segment.len() > 1 {
            let mut content = serde_json::Map::new();
            for &index in segment {
                match self.content(index) {
                    Value::Object(fields) => {
                        content.extend(fields.iter().map(|(key, value)| (key.clone(), value.clone())));
                    }
                    _ => content.clear(),
                }
            }
            let content = match self.content(last) {
                Value::Object(_) => Value::Object(content),
                other => other.clone(),
            };
            self.merged.insert(last, content);
        }
        self.keep_last(segment);
    }
}

fn same_position(a: &Value, b: &Value) -> bool {
    a.get("parent").is_some()
        && a.get("index").is_some()
        && a.get("parent") == b.get("parent")
        && a.get("index") == b.get("index")
}
