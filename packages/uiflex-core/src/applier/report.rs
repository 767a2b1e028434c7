use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::change::ChangeId;
use crate::error::FlexError;

use super::apply_state::ApplyState;

/// A per-change failure collected during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFailure {
    pub change_id: ChangeId,
    pub error: FlexError,
}

/// Outcome of an apply pass.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    /// Terminal state of the pass
    pub state: ApplyState,
    /// States the pass went through
    pub history: Vec<ApplyState>,
    /// Changes applied in this pass, in application order
    pub applied: Vec<ChangeId>,
    /// Changes whose handler failed or was missing
    pub failures: Vec<ChangeFailure>,
    /// Changes not scheduled because the pass was cancelled
    pub skipped: Vec<ChangeId>,
    pub cancelled: bool,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.state == ApplyState::ApplySuccessful
    }
}

/// Outcome of a revert pass.
#[derive(Debug, Clone)]
pub struct RevertReport {
    pub state: ApplyState,
    pub history: Vec<ApplyState>,
    /// Changes reverted, in revert order
    pub reverted: Vec<ChangeId>,
    /// Changes skipped because they held no revert data
    pub warnings: Vec<ChangeFailure>,
    /// Changes whose handler failed to revert; they stay applied
    pub failures: Vec<ChangeFailure>,
}

impl RevertReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.failures.is_empty()
    }
}

/// Cooperative cancellation flag for an apply pass.
///
/// Checked between changes: the change in progress finishes, the next one
/// is not scheduled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Options for an apply pass.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub cancel: Option<CancelToken>,
}

impl ApplyOptions {
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}
