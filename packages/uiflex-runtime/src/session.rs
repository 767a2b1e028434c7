use std::sync::Arc;

use parking_lot::Mutex;
use uiflex_core::applier::{ApplyOptions, ApplyReport, CancelToken, ChangeApplier, RevertReport};
use uiflex_core::change::{ChangeId, ChangeSet};
use uiflex_core::condenser::CondenserClassifier;
use uiflex_core::config::FlexConfig;
use uiflex_core::persistence::ChangeStore;
use uiflex_core::registry::ChangeRegistry;
use uiflex_core::tree::UiTree;
use uiflex_core::version::{VersionId, VersionStore};
use uiflex_core::{FlexError, Result};

/// Outcome of saving a change set as a new draft.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// Draft created for the saved changes
    pub version_id: VersionId,
    /// Number of changes written
    pub saved: usize,
    /// Changes dropped by condensing
    pub condensed: Vec<ChangeId>,
}

/// Tree together with the changes currently applied to it.
struct Workspace<T> {
    tree: T,
    applied: ChangeSet,
}

/// Owns one tree and drives the change engine against it.
///
/// Apply and revert passes run on the blocking pool while holding the tree.
/// A pass started while another one holds the tree fails with
/// `ConcurrentApplyViolation` instead of waiting.
pub struct FlexSession<T, S> {
    config: FlexConfig,
    tree_id: String,
    applier: Arc<ChangeApplier>,
    condenser: CondenserClassifier,
    store: Arc<S>,
    versions: Arc<VersionStore>,
    workspace: Arc<tokio::sync::Mutex<Workspace<T>>>,
    cancel: Mutex<CancelToken>,
}

impl<T, S> FlexSession<T, S>
where
    T: UiTree + Send + 'static,
    S: ChangeStore + 'static,
{
    /// Creates a session over `tree` with an empty version store.
    pub fn new(config: FlexConfig, registry: Arc<ChangeRegistry>, store: S, tree: T) -> Self {
        Self {
            tree_id: tree.tree_id().to_string(),
            applier: Arc::new(ChangeApplier::with_config(registry.clone(), &config)),
            condenser: CondenserClassifier::new(registry),
            store: Arc::new(store),
            versions: Arc::new(VersionStore::new()),
            workspace: Arc::new(tokio::sync::Mutex::new(Workspace {
                tree,
                applied: ChangeSet::new(),
            })),
            cancel: Mutex::new(CancelToken::new()),
            config,
        }
    }

    pub fn config(&self) -> &FlexConfig {
        &self.config
    }

    pub fn tree_id(&self) -> &str {
        &self.tree_id
    }

    pub fn registry(&self) -> &Arc<ChangeRegistry> {
        self.applier.registry()
    }

    pub fn versions(&self) -> &Arc<VersionStore> {
        &self.versions
    }

    /// Loads the stored change set of a reference.
    pub async fn load(&self, reference: &str) -> Result<ChangeSet> {
        let store = Arc::clone(&self.store);
        let reference = reference.to_string();
        run_blocking(move || store.load(&reference)).await
    }

    /// Replaces the in-memory versions of a reference with the stored ones.
    ///
    /// # Returns
    /// Number of versions restored.
    pub async fn restore_versions(&self, reference: &str) -> Result<usize> {
        let store = Arc::clone(&self.store);
        let owned = reference.to_string();
        let versions = run_blocking(move || store.load_versions(&owned)).await?;

        let count = versions.len();
        self.versions.import(reference, versions)?;
        tracing::info!("Restored {} versions of '{}'", count, reference);
        Ok(count)
    }

    /// Applies a change set to the session tree.
    ///
    /// The session keeps the applied changes until [`FlexSession::revert`]
    /// runs; applying again before that is rejected.
    pub async fn apply(&self, change_set: ChangeSet) -> Result<ApplyReport> {
        let mut workspace = self.try_acquire()?;
        if workspace.applied.iter().any(|change| change.is_applied()) {
            return Err(FlexError::ConcurrentApplyViolation {
                tree: self.tree_id.clone(),
                reason: "changes are still applied; revert them first".to_string(),
            });
        }

        let cancel = CancelToken::new();
        *self.cancel.lock() = cancel.clone();

        let applier = Arc::clone(&self.applier);
        let mut change_set = change_set;
        run_blocking(move || {
            let workspace = &mut *workspace;
            let report =
                applier.apply_with(&mut workspace.tree, &mut change_set, &ApplyOptions::with_cancel(cancel))?;
            workspace.applied = change_set;
            Ok(report)
        })
        .await
    }

    /// Reverts the changes applied by the last apply pass.
    ///
    /// Changes whose revert fails stay applied and are retried by the next
    /// revert.
    pub async fn revert(&self) -> Result<RevertReport> {
        let mut workspace = self.try_acquire()?;
        let applier = Arc::clone(&self.applier);

        run_blocking(move || {
            let workspace = &mut *workspace;
            let report = applier.revert(&mut workspace.tree, &mut workspace.applied)?;
            let remaining = workspace
                .applied
                .iter()
                .filter(|change| change.is_applied())
                .cloned()
                .collect();
            workspace.applied = ChangeSet::from_changes(remaining)?;
            Ok(report)
        })
        .await
    }

    /// Cancels the running apply pass, if any.
    ///
    /// The change in progress finishes; the remaining ones are skipped.
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    /// Returns the changes currently applied to the tree.
    pub async fn applied_changes(&self) -> ChangeSet {
        self.workspace.lock().await.applied.clone()
    }

    /// Runs `f` with read access to the tree, waiting for a running pass.
    pub async fn with_tree<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let workspace = self.workspace.lock().await;
        f(&workspace.tree)
    }

    /// Persists a change set and records it as the new draft of `reference`.
    ///
    /// The set is condensed first when `condense_on_save` is set.
    pub async fn save(
        &self,
        reference: &str,
        change_set: &ChangeSet,
        title: Option<String>,
    ) -> Result<SaveOutcome> {
        let (to_save, condensed) = if self.config.condense_on_save {
            let result = self.condenser.condense(change_set);
            let condensed = result.deleted_ids();
            (result.kept.without_revert_data(), condensed)
        } else {
            (change_set.without_revert_data(), Vec::new())
        };

        let store = Arc::clone(&self.store);
        let owned = reference.to_string();
        let record = to_save.clone();
        run_blocking(move || store.save(&owned, &record)).await?;

        let saved = to_save.len();
        let version_id = self.versions.create_version(reference, to_save, title)?;
        self.persist_versions(reference).await?;

        tracing::info!(
            "Saved {} changes of '{}' as draft {} ({} condensed)",
            saved,
            reference,
            version_id,
            condensed.len()
        );
        Ok(SaveOutcome {
            version_id,
            saved,
            condensed,
        })
    }

    /// Activates a version and persists the versions of its reference.
    ///
    /// # Returns
    /// The previously active version, if any.
    pub async fn activate(&self, id: VersionId) -> Result<Option<VersionId>> {
        let reference = self.versions.get(id)?.reference;
        let previous = self.versions.activate(id)?;
        self.persist_versions(&reference).await?;
        Ok(previous)
    }

    /// Returns the change set of the active version of `reference`.
    pub fn active_changes(&self, reference: &str) -> Result<ChangeSet> {
        Ok(self.versions.get_active(reference)?.change_set)
    }

    async fn persist_versions(&self, reference: &str) -> Result<()> {
        let records = self.versions.list(reference)?;
        let store = Arc::clone(&self.store);
        let owned = reference.to_string();
        run_blocking(move || store.save_versions(&owned, &records)).await
    }

    fn try_acquire(&self) -> Result<tokio::sync::OwnedMutexGuard<Workspace<T>>> {
        Arc::clone(&self.workspace)
            .try_lock_owned()
            .map_err(|_| FlexError::ConcurrentApplyViolation {
                tree: self.tree_id.clone(),
                reason: "another apply or revert pass holds the tree".to_string(),
            })
    }
}

async fn run_blocking<R, F>(operation: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|e| FlexError::IoError(format!("Blocking task failed: {}", e)))?
}
