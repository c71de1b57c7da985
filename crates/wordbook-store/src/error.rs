//! Store error types.

use thiserror::Error;

/// Error reported by a [`CollectionStore`](crate::CollectionStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Rules rejected the read or write.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The child to update does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport unavailable (offline, timed out, reset).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// `connect()` has not been called, or the store was disposed.
    #[error("store is not connected")]
    NotConnected,

    /// A value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an Unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether retrying later could succeed without any rule change.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::NotConnected)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;
