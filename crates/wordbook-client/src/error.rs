//! Client error types.
//!
//! One enum per concern. Validation and auth failures are ordinary results
//! for the caller to show; only remote failures are logged as warnings.

use thiserror::Error;
use wordbook_store::{AuthError, StoreError};
use wordbook_types::{EntryId, ValidationError};

/// Errors from the write actor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// Input rejected before any remote call.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Anonymous sessions may not write under the current policy.
    #[error("sign in to add or change words")]
    AnonymousWriteDenied,

    /// The account is waiting for an admin to verify it.
    #[error("account is waiting for verification")]
    UnverifiedWriter,

    /// The entry to update does not exist (rejected by the store).
    #[error("entry {0} not found")]
    NotFound(EntryId),

    /// The store rejected or could not take the write.
    #[error("remote error: {0}")]
    Remote(StoreError),

    /// The write actor is gone.
    #[error("writer shut down")]
    Shutdown,
}

/// Errors opening the live subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("subscribe failed: {0}")]
    Subscribe(#[source] StoreError),
}

/// Errors from account bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("remote error: {0}")]
    Remote(#[from] StoreError),

    /// A stored record could not be decoded.
    #[error("account {uid} is corrupt: {reason}")]
    Corrupt { uid: String, reason: String },
}

/// Errors from admin-only operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// The acting principal is not an admin (or not signed in).
    #[error("admin privileges required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("remote error: {0}")]
    Remote(#[from] StoreError),
}

/// Errors submitting feedback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedbackError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("remote error: {0}")]
    Remote(#[from] StoreError),
}

/// Errors loading or printing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON encode error: {0}")]
    Encode(#[from] ron::Error),
}

/// Errors from session storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the session facade.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The session has been shut down.
    #[error("session closed")]
    Closed,
}
