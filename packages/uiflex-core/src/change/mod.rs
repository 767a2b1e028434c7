//! Change records, change kinds, layers, and ordered change sets.

#[allow(clippy::module_inception)]
mod change;
mod change_set;
mod kind;
mod layer;

pub use change::{Change, ChangeId, CondenserState};
pub use change_set::ChangeSet;
pub use kind::ChangeKind;
pub use layer::Layer;
