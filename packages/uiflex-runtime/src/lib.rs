//! Async session driving load, apply, condense, save and activate cycles
//! over the change engine.

mod session;

pub use session::{FlexSession, SaveOutcome};
pub use uiflex_core::{FlexError, Result};
