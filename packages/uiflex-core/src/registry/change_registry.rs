use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::change::{Change, ChangeId, ChangeKind, Layer};
use crate::error::{FlexError, Result};

use super::handler::ChangeHandler;

type HandlerMap = HashMap<ChangeKind, Arc<dyn ChangeHandler>>;

/// Registry of change handlers keyed by change kind.
///
/// Lookups read a snapshot without locking; registrations swap in a new map.
/// The last registration for a kind wins.
pub struct ChangeRegistry {
    handlers: ArcSwap<HandlerMap>,
}

impl ChangeRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Creates a registry with all built-in handlers registered.
    pub fn with_builtin_handlers() -> Result<Self> {
        let registry = Self::new();
        super::builtin_handlers::register_builtin_handlers(&registry)?;
        Ok(registry)
    }

    /// Registers a handler, replacing any previous handler for the kind.
    ///
    /// # Arguments
    /// * `kind` - Change kind the handler serves
    /// * `handler` - Handler implementation
    ///
    /// # Returns
    /// `Ok(())` if registered, `Err(FlexError::InvalidChangeType)` if a custom tag is malformed.
    pub fn register(&self, kind: ChangeKind, handler: Arc<dyn ChangeHandler>) -> Result<()> {
        validate_kind(&kind)?;

        let previous = self.handlers.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(kind.clone(), handler.clone());
            next
        });

        if previous.contains_key(&kind) {
            tracing::debug!("Handler for change type '{}' overridden", kind);
        }
        Ok(())
    }

    /// Retrieves the handler for a change kind.
    pub fn get_handler(&self, kind: &ChangeKind) -> Result<Arc<dyn ChangeHandler>> {
        self.handlers
            .load()
            .get(kind)
            .cloned()
            .ok_or_else(|| FlexError::UnknownChangeType {
                change_type: kind.to_string(),
            })
    }

    /// Retrieves the handler for a string tag.
    pub fn get_handler_by_tag(&self, tag: &str) -> Result<Arc<dyn ChangeHandler>> {
        self.get_handler(&ChangeKind::from_tag(tag))
    }

    pub fn contains(&self, kind: &ChangeKind) -> bool {
        self.handlers.load().contains_key(kind)
    }

    /// Returns all registered kinds, sorted.
    pub fn kinds(&self) -> Vec<ChangeKind> {
        let mut kinds: Vec<ChangeKind> = self.handlers.load().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Removes a registration.
    ///
    /// # Returns
    /// `true` if a handler was removed, `false` if none was registered.
    pub fn unregister(&self, kind: &ChangeKind) -> bool {
        let previous = self.handlers.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(kind);
            next
        });
        previous.contains_key(kind)
    }

    /// Creates a change and lets its handler complete the content.
    ///
    /// # Returns
    /// The completed change, or the handler's validation error.
    pub fn create_change(
        &self,
        id: impl Into<ChangeId>,
        kind: ChangeKind,
        target_selector: impl Into<String>,
        content: Value,
        layer: Layer,
    ) -> Result<Change> {
        let handler = self.get_handler(&kind)?;
        let mut change = Change::new(id, kind, target_selector, content, layer);
        handler.complete_change_content(&mut change)?;
        Ok(change)
    }
}

impl Default for ChangeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

fn validate_kind(kind: &ChangeKind) -> Result<()> {
    let ChangeKind::Custom(tag) = kind else {
        return Ok(());
    };

    let reason = if tag.is_empty() {
        Some("tag is empty".to_string())
    } else if tag.chars().any(char::is_whitespace) {
        Some("tag contains whitespace".to_string())
    } else if ChangeKind::from_tag(tag).is_builtin() {
        Some(format!("'{}' is a built-in change type", tag))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(FlexError::InvalidChangeType {
            change_type: tag.clone(),
            reason,
        }),
        None => Ok(()),
    }
}
