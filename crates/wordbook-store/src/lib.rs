//! External collaborators of the wordbook client, by interface.
//!
//! The client talks to two services it does not own:
//!
//! - a **collection store**: keyed JSON documents at `collection/key`, with
//!   point writes, partial updates, point deletes, ordered range reads and
//!   two flavours of live subscription (full value, child added)
//! - an **authentication provider**: sign-up, sign-in, sign-out, and a
//!   watchable principal state
//!
//! Both are traits so that a hosted backend and the in-memory backends here
//! are interchangeable. Handles are constructed and injected; there is no
//! process-wide database or auth singleton.
//!
//! # Subscription Semantics
//!
//! - **Value**: first item is the current value, then one item carrying the
//!   complete child set per mutation. Last snapshot wins.
//! - **Child added**: existing children replayed once, then one item per new
//!   key. Never fires for updates or removals.
//! - Errors are delivered in-band as `Err` items; the stream stays open.

mod auth;
mod error;
mod memory;
mod memory_auth;
mod query;
mod store;

pub use auth::{
    AuthError, AuthProvider, AuthState, MIN_PASSWORD_LEN, Principal, SharedAuth,
    validate_credentials,
};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use memory_auth::{AuthDirectory, MAX_FAILED_SIGN_INS, MemoryAuth};
pub use query::{PREFIX_END, Query, compare_values};
pub use store::{
    Child, ChildEvent, CollectionStore, SharedStore, Snapshot, Subscription, ValueEvent,
};
