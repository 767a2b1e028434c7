//! Change handler registry and built-in handlers.

mod builtin_handlers;
mod change_registry;
mod handler;

pub use builtin_handlers::register_builtin_handlers;
pub use change_registry::ChangeRegistry;
pub use handler::{ChangeHandler, Classification, CondenserInfo};
