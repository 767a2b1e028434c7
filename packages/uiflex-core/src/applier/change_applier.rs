use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::change::{ChangeSet, Layer};
use crate::config::FlexConfig;
use crate::error::{FlexError, Result};
use crate::registry::ChangeRegistry;
use crate::tree::UiTree;

use super::apply_state::{ApplyCycle, ApplyState};
use super::report::{ApplyOptions, ApplyReport, ChangeFailure, RevertReport};

/// Applies and reverts change sets against UI trees.
///
/// Changes run strictly in order. A failing change is recorded and the pass
/// continues with the next one. At most one pass may be in flight per tree.
#[derive(Debug)]
pub struct ChangeApplier {
    registry: Arc<ChangeRegistry>,
    max_layer: Layer,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks a tree busy for the duration of a pass.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    tree_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut trees) = self.in_flight.lock() {
            trees.remove(&self.tree_id);
        }
    }
}

impl ChangeApplier {
    /// Creates an applier that applies every layer.
    pub fn new(registry: Arc<ChangeRegistry>) -> Self {
        Self {
            registry,
            max_layer: Layer::User,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Creates an applier honoring the configured max layer.
    pub fn with_config(registry: Arc<ChangeRegistry>, config: &FlexConfig) -> Self {
        Self {
            max_layer: config.max_layer,
            ..Self::new(registry)
        }
    }

    pub fn registry(&self) -> &Arc<ChangeRegistry> {
        &self.registry
    }

    pub fn max_layer(&self) -> Layer {
        self.max_layer
    }

    /// Returns whether a pass is running against the tree.
    pub fn is_in_flight(&self, tree_id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|trees| trees.contains(tree_id))
            .unwrap_or(false)
    }

    fn begin(&self, tree_id: &str) -> Result<InFlightGuard<'_>> {
        let mut trees = self.in_flight.lock().map_err(|_| FlexError::LockPoisoned)?;
        if !trees.insert(tree_id.to_string()) {
            return Err(FlexError::ConcurrentApplyViolation {
                tree: tree_id.to_string(),
                reason: "another apply or revert pass is in flight".to_string(),
            });
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            tree_id: tree_id.to_string(),
        })
    }

    /// Applies a change set to a tree.
    ///
    /// # Arguments
    /// * `tree` - Target tree
    /// * `change_set` - Changes to apply; revert data is recorded on each applied change
    ///
    /// # Returns
    /// `Ok(ApplyReport)` with per-change failures, or `Err` when the pass could not start.
    pub fn apply(&self, tree: &mut dyn UiTree, change_set: &mut ChangeSet) -> Result<ApplyReport> {
        self.apply_with(tree, change_set, &ApplyOptions::default())
    }

    /// Applies a change set with explicit options.
    pub fn apply_with(
        &self,
        tree: &mut dyn UiTree,
        change_set: &mut ChangeSet,
        options: &ApplyOptions,
    ) -> Result<ApplyReport> {
        let tree_id = tree.tree_id().to_string();
        let _guard = self.begin(&tree_id)?;
        let order = change_set.apply_order(self.max_layer);
        if order.len() < change_set.len() {
            tracing::debug!(
                "Skipping {} changes above layer {} on tree '{}'",
                change_set.len() - order.len(),
                self.max_layer,
                tree_id
            );
        }

        // Reject double application before touching the tree.
        for &index in &order {
            let change = &change_set.as_slice()[index];
            if !change.is_applied() {
                continue;
            }
            let reapplicable = self
                .registry
                .get_handler(&change.change_type)
                .map(|handler| handler.reapplicable())
                .unwrap_or(false);
            if !reapplicable {
                return Err(FlexError::ConcurrentApplyViolation {
                    tree: tree_id,
                    reason: format!(
                        "change '{}' ({}) is already applied",
                        change.id, change.change_type
                    ),
                });
            }
        }

        let mut cycle = ApplyCycle::new();
        cycle.advance(ApplyState::Applying)?;

        let mut applied = Vec::new();
        let mut failures = Vec::new();
        let mut skipped = Vec::new();
        let mut cancelled = false;

        for (position, &index) in order.iter().enumerate() {
            if options.is_cancelled() {
                cancelled = true;
                skipped.extend(
                    order[position..]
                        .iter()
                        .map(|&rest| change_set.as_slice()[rest].id.clone()),
                );
                break;
            }

            let Some(change) = change_set.get_index_mut(index) else {
                continue;
            };

            let handler = match self.registry.get_handler(&change.change_type) {
                Ok(handler) => handler,
                Err(err) => {
                    tracing::warn!("Change '{}' skipped: {}", change.id, err);
                    failures.push(ChangeFailure {
                        change_id: change.id.clone(),
                        error: err,
                    });
                    continue;
                }
            };

            match handler.apply_change(change, tree) {
                Ok(revert_data) => {
                    if !change.is_applied() {
                        change.set_revert_data(revert_data);
                    }
                    tracing::debug!("Applied change '{}' ({})", change.id, change.change_type);
                    applied.push(change.id.clone());
                }
                Err(err) => {
                    tracing::warn!("Change '{}' failed to apply: {}", change.id, err);
                    failures.push(ChangeFailure {
                        change_id: change.id.clone(),
                        error: FlexError::HandlerApplyFailure {
                            change_id: change.id.to_string(),
                            reason: err.to_string(),
                        },
                    });
                }
            }
        }

        if cancelled {
            tracing::info!(
                "Apply pass on tree '{}' cancelled, {} changes not scheduled",
                tree_id,
                skipped.len()
            );
        }

        let outcome = if failures.is_empty() && !cancelled {
            ApplyState::ApplySuccessful
        } else {
            ApplyState::ApplyFailed
        };
        cycle.advance(outcome)?;

        Ok(ApplyReport {
            state: cycle.state(),
            history: cycle.into_history(),
            applied,
            failures,
            skipped,
            cancelled,
        })
    }

    /// Reverts the applied changes of a change set in reverse application order.
    ///
    /// Changes without revert data are reported as warnings. A change whose
    /// handler fails to revert keeps its revert data.
    pub fn revert(&self, tree: &mut dyn UiTree, change_set: &mut ChangeSet) -> Result<RevertReport> {
        let tree_id = tree.tree_id().to_string();
        let _guard = self.begin(&tree_id)?;

        let mut cycle = ApplyCycle::new();
        cycle.advance(ApplyState::Reverting)?;

        let mut reverted = Vec::new();
        let mut warnings = Vec::new();
        let mut failures = Vec::new();

        for index in change_set.apply_order(self.max_layer).into_iter().rev() {
            let Some(change) = change_set.get_index_mut(index) else {
                continue;
            };

            let Some(revert_data) = change.take_revert_data() else {
                let warning = FlexError::RevertDataMissing {
                    change_id: change.id.to_string(),
                };
                tracing::warn!("{}", warning);
                warnings.push(ChangeFailure {
                    change_id: change.id.clone(),
                    error: warning,
                });
                continue;
            };

            let result = self
                .registry
                .get_handler(&change.change_type)
                .and_then(|handler| handler.revert_change(change, &revert_data, tree));

            match result {
                Ok(()) => {
                    tracing::debug!("Reverted change '{}' ({})", change.id, change.change_type);
                    reverted.push(change.id.clone());
                }
                Err(err) => {
                    tracing::warn!("Change '{}' failed to revert: {}", change.id, err);
                    let error = match err {
                        FlexError::HandlerRevertFailure { .. } | FlexError::UnknownChangeType { .. } => err,
                        other => FlexError::HandlerRevertFailure {
                            change_id: change.id.to_string(),
                            reason: other.to_string(),
                        },
                    };
                    change.set_revert_data(revert_data);
                    failures.push(ChangeFailure {
                        change_id: change.id.clone(),
                        error,
                    });
                }
            }
        }

        cycle.advance(ApplyState::RevertFinished)?;

        Ok(RevertReport {
            state: cycle.state(),
            history: cycle.into_history(),
            reverted,
            warnings,
            failures,
        })
    }
}
