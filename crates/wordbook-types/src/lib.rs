//! Shared record and identity types for wordbook.
//!
//! This crate is the leaf of the workspace: typed keys, actors, dictionary
//! entries, accounts and feedback. It has **no internal wordbook
//! dependencies**; the store and client crates build on it.
//!
//! # Entity Overview
//!
//! ```text
//! Actor (ActorId) ← account uid or anonymous session id
//!     └── authors Entry (createdBy, preserved across edits)
//!     └── modifies Entry (lastModifiedBy, overwritten per edit)
//!
//! Account (AccountId) ← one per authenticated principal, users/{uid}
//!     └── isAdmin fixed at creation by a trusted path
//!
//! Entry (EntryId) ← one word record, words/{id}
//! Feedback (FeedbackId) ← one message to the admins, feedback/{id}
//! ```
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`ActorId`]       | Who wrote (account or anonymous session)     |
//! | [`Entry`]         | A word record as read back from the store    |
//! | [`EntryDraft`]    | User input for create/update, pre-validation |
//! | [`Account`]       | User record under `users/{uid}`              |
//! | [`Feedback`]      | Feedback message under `feedback/{id}`       |
//! | [`EntryId`]       | Store-allocated key of an entry              |
//! |-------------------|----------------------------------------------|

pub mod account;
pub mod actor;
pub mod entry;
pub mod error;
pub mod feedback;
pub mod ids;

// Re-export primary types at crate root for convenience.
pub use account::{Account, DEFAULT_DISPLAY_NAME, sanitize_display_name};
pub use actor::{ActorId, ActorKind, ANONYMOUS_PREFIX};
pub use entry::{Entry, EntryDraft, NormalizedDraft, fields as entry_fields};
pub use error::ValidationError;
pub use feedback::Feedback;
pub use ids::{AccountId, EntryId, FeedbackId, generate_key};

/// Current time as Unix milliseconds. Used by constructors throughout the workspace.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
