//! Error types for the IndexedDB engine

use storekeep_core::StoreError;
use thiserror::Error;
use wasm_bindgen::JsValue;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Name given to the error a blocked open/delete request rejects with.
pub(crate) const BLOCKED_ERROR: &str = "BlockedError";

/// Errors that can occur during IndexedDB operations
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// A request or transaction failed with a DOMException
    #[error("IndexedDB {name}: {message}")]
    Dom { name: String, message: String },

    /// Open or delete request blocked by another connection
    #[error("IndexedDB request blocked: {0}")]
    Blocked(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),
}

impl From<JsValue> for IndexedDbError {
    fn from(val: JsValue) -> Self {
        let name = js_sys::Reflect::get(&val, &"name".into())
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default();
        let message = js_sys::Reflect::get(&val, &"message".into())
            .ok()
            .and_then(|v| v.as_string())
            .or_else(|| val.as_string())
            .unwrap_or_else(|| format!("{:?}", val));

        if name == BLOCKED_ERROR {
            IndexedDbError::Blocked(message)
        } else {
            IndexedDbError::Dom { name, message }
        }
    }
}

/// Map DOMException names onto the storage error taxonomy
impl From<IndexedDbError> for StoreError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::NotAvailable(msg) => StoreError::NotAvailable(msg),
            IndexedDbError::Blocked(msg) => StoreError::Blocked(msg),
            IndexedDbError::Json(e) => StoreError::Serialization(e.to_string()),
            IndexedDbError::JsValue(msg) => StoreError::Serialization(msg),
            IndexedDbError::Dom { name, message } => match name.as_str() {
                "ConstraintError" | "DataError" => StoreError::Constraint(message),
                "NotFoundError" => StoreError::NotFound(message),
                "InvalidStateError" | "TransactionInactiveError" => StoreError::State(message),
                "VersionError" => StoreError::Version(message),
                "AbortError" => StoreError::Upgrade(message),
                "UnknownError" | "QuotaExceededError" | "" => StoreError::Backend(message),
                other => StoreError::Backend(format!("{}: {}", other, message)),
            },
        }
    }
}
