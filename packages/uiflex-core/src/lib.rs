//! Declarative UI change engine.
//!
//! Provides a handler registry keyed by change kind, sequential change
//! application with revert data, change-log condensing, layered change sets,
//! named versions, and persistence of change and version records.

pub mod applier;
pub mod change;
pub mod condenser;
pub mod config;
pub mod error;
pub mod persistence;
pub mod registry;
pub mod tree;
pub mod version;

pub use error::{FlexError, Result};
