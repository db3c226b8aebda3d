//! Error types for the permission engine

use thiserror::Error;

/// Result type alias for permission engine operations
pub type Result<T> = std::result::Result<T, PermsError>;

/// Errors surfaced at the engine's public boundary
///
/// Missing results are not errors: an unmatched permission resolves to
/// [`Tristate::Undefined`](crate::calculator::Tristate) and a group without
/// weight resolves to `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermsError {
    /// Permission checks require a non-empty permission string
    #[error("permission string cannot be empty")]
    EmptyPermission,

    /// A node key could not be parsed into its typed form
    #[error("invalid node key '{key}': {reason}")]
    InvalidNodeKey { key: String, reason: String },

    /// A regex permission failed to compile
    #[error("invalid regex permission '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// Unknown element in a meta stack definition
    #[error("invalid meta stack element '{element}'")]
    InvalidStackElement { element: String },

    /// A holder referenced by id is not loaded
    #[error("holder '{holder}' not found")]
    HolderNotFound { holder: String },

    /// Engine configuration could not be parsed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background recompute task panicked or was cancelled
    #[error("background task failed: {0}")]
    TaskFailed(String),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for PermsError {
    fn from(err: serde_json::Error) -> Self {
        PermsError::InvalidConfig(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PermsError {
    fn from(err: tokio::task::JoinError) -> Self {
        PermsError::TaskFailed(err.to_string())
    }
}
