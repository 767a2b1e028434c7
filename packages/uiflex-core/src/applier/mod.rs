//! Sequential change application, reversion, and the apply state machine.

mod apply_state;
mod change_applier;
mod report;

pub use apply_state::{ApplyCycle, ApplyState};
pub use change_applier::ChangeApplier;
pub use report::{ApplyOptions, ApplyReport, CancelToken, ChangeFailure, RevertReport};
