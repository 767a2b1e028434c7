use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FlexError, Result};

/// Lifecycle of a single apply or revert pass.
///
/// ```text
/// Initial -> Applying -> ApplySuccessful | ApplyFailed
/// Initial -> Reverting -> RevertFinished
/// ```
///
/// Terminal states have no outgoing transitions; a retry is a new pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyState {
    Initial,
    Applying,
    ApplySuccessful,
    ApplyFailed,
    Reverting,
    RevertFinished,
}

impl ApplyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyState::Initial => "initial",
            ApplyState::Applying => "applying",
            ApplyState::ApplySuccessful => "apply_successful",
            ApplyState::ApplyFailed => "apply_failed",
            ApplyState::Reverting => "reverting",
            ApplyState::RevertFinished => "revert_finished",
        }
    }

    pub fn can_transition_to(self, next: ApplyState) -> bool {
        matches!(
            (self, next),
            (ApplyState::Initial, ApplyState::Applying)
                | (ApplyState::Applying, ApplyState::ApplySuccessful)
                | (ApplyState::Applying, ApplyState::ApplyFailed)
                | (ApplyState::Initial, ApplyState::Reverting)
                | (ApplyState::Reverting, ApplyState::RevertFinished)
        )
    }

    pub fn transition(self, next: ApplyState) -> Result<ApplyState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(FlexError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplyState::ApplySuccessful | ApplyState::ApplyFailed | ApplyState::RevertFinished
        )
    }
}

impl fmt::Display for ApplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one pass together with the states it went through.
#[derive(Debug, Clone)]
pub struct ApplyCycle {
    state: ApplyState,
    history: Vec<ApplyState>,
}

impl ApplyCycle {
    pub fn new() -> Self {
        Self {
            state: ApplyState::Initial,
            history: vec![ApplyState::Initial],
        }
    }

    pub fn state(&self) -> ApplyState {
        self.state
    }

    pub fn history(&self) -> &[ApplyState] {
        &self.history
    }

    pub fn advance(&mut self, next: ApplyState) -> Result<()> {
        self.state = self.state.transition(next)?;
        self.history.push(next);
        Ok(())
    }

    pub fn into_history(self) -> Vec<ApplyState> {
        self.history
    }
}

impl Default for ApplyCycle {
    fn default() -> Self {
        Self::new()
    }
}
