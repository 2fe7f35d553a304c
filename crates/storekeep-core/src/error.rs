//! Storage error types

use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
///
/// Engine failures are forwarded as-is; the client never retries or
/// translates them beyond picking the matching variant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Operation attempted on a connection that is not open
    #[error("invalid state: {0}")]
    State(String),

    /// Open, upgrade or delete request blocked by another open session
    #[error("connection blocked: {0}")]
    Blocked(String),

    /// Requested version is invalid or lower than the stored one
    #[error("version error: {0}")]
    Version(String),

    /// Engine rejected or aborted a schema upgrade
    #[error("upgrade rejected: {0}")]
    Upgrade(String),

    /// Storage engine is not available in this environment
    #[error("storage not available: {0}")]
    NotAvailable(String),

    /// Write violates the store's key constraints
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Named store (or other engine object) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Record could not be converted to or from the engine representation
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other engine error
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Coarse classification callers use to decide policy on a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    State,
    Connection,
    Constraint,
    NotFound,
    Engine,
}

impl StoreError {
    /// The error used when a connection-bound operation runs before `open`.
    pub fn not_open() -> Self {
        StoreError::State("database not open".into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::State(_) => ErrorKind::State,
            StoreError::Blocked(_)
            | StoreError::Version(_)
            | StoreError::Upgrade(_)
            | StoreError::NotAvailable(_) => ErrorKind::Connection,
            StoreError::Constraint(_) => ErrorKind::Constraint,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Serialization(_) | StoreError::Backend(_) => ErrorKind::Engine,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
