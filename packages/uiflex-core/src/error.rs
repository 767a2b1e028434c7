//! Change engine error types.

use thiserror::Error;

/// Change engine errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlexError {
    /// No handler registered for the change type
    #[error("Unknown change type '{change_type}'")]
    UnknownChangeType { change_type: String },

    /// Change type rejected at registration time
    #[error("Invalid change type '{change_type}': {reason}")]
    InvalidChangeType { change_type: String, reason: String },

    /// Handler failed while applying a single change
    #[error("Change '{change_id}' failed to apply: {reason}")]
    HandlerApplyFailure { change_id: String, reason: String },

    /// Handler failed while reverting a single change
    #[error("Change '{change_id}' failed to revert: {reason}")]
    HandlerRevertFailure { change_id: String, reason: String },

    /// Revert requested for a change that holds no revert data
    #[error("Change '{change_id}' has no revert data")]
    RevertDataMissing { change_id: String },

    /// Version id unknown to the store
    #[error("Version {version_id} not found")]
    VersionNotFound { version_id: u64 },

    /// Reference has no active version
    #[error("No active version for reference '{reference}'")]
    NoActiveVersion { reference: String },

    /// A second apply/revert cycle was started against a busy tree,
    /// or a non-reapplicable change was applied twice
    #[error("Concurrent apply violation on tree '{tree}': {reason}")]
    ConcurrentApplyViolation { tree: String, reason: String },

    /// Apply state machine rejected a transition
    #[error("Invalid apply state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Change id already present in a change set
    #[error("Change '{0}' already exists in change set")]
    DuplicateChange(String),

    /// Change id not present in a change set
    #[error("Change '{0}' not found")]
    ChangeNotFound(String),

    /// Selector does not address a node in the tree
    #[error("Selector '{selector}' not found in tree")]
    SelectorNotFound { selector: String },

    /// Change content is malformed for its change type
    #[error("Invalid content for change '{change_id}': {reason}")]
    InvalidContent { change_id: String, reason: String },

    /// Reference name cannot be used as a storage key
    #[error("Invalid reference '{0}'")]
    InvalidReference(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error during persistence
    #[error("I/O error: {0}")]
    IoError(String),

    /// Transient I/O error that may succeed on retry
    #[error("Transient I/O error: {0}")]
    TransientIoError(String),

    /// Stored record failed verification
    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    /// Lock poisoned (RwLock or Mutex poisoned)
    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result alias used throughout the change engine.
pub type Result<T> = std::result::Result<T, FlexError>;
