//! Wordbook client core.
//!
//! A shared, collaboratively edited dictionary: every connected client sees
//! the same live list of entries, may add, edit, favorite or delete them,
//! and is told when *someone else* adds a word.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         DictionarySession                            │
//! │                                                                      │
//! │  SyncEngine ─── snapshots (watch) ──▶ ViewBuilder ◀── Debouncer      │
//! │      │                                                               │
//! │      └──── insertions (broadcast) ──▶ NotificationGate ──▶ Sink      │
//! │                                                                      │
//! │  IdentityResolver ──▶ Author ──▶ WriteHandle ──mpsc──▶ WriteActor     │
//! │                                                                      │
//! │  AccountService · FeedbackService · AdminService                     │
//! └──────────────────────────────┬───────────────────────────────────────┘
//!                                │ SharedStore / SharedAuth
//!                                ▼
//!                      wordbook-store backends
//! ```
//!
//! Nothing here is a process-wide singleton: store, auth provider, session
//! storage and notification sink are all injected into
//! [`DictionarySession::start`].

pub mod accounts;
pub mod admin;
pub mod collate;
pub mod config;
pub mod constants;
pub mod debounce;
pub mod error;
pub mod feedback;
pub mod identity;
pub mod notify;
pub mod session;
pub mod sync;
pub mod view;
pub mod writes;

pub use accounts::{AccountFilter, AccountService};
pub use admin::{AdminService, AdminStats, SortOrder};
pub use config::ClientConfig;
pub use debounce::Debouncer;
pub use error::{
    AccountError, AdminError, ConfigError, FeedbackError, SessionError, StorageError, SyncError,
    WriteError,
};
pub use feedback::FeedbackService;
pub use identity::{
    Author, FileSessionStorage, IdentityResolver, MemorySessionStorage, SessionStorage,
};
pub use notify::{ChannelSink, Notification, NotificationGate, NotificationSink, TracingSink};
pub use session::DictionarySession;
pub use sync::{EntryList, InsertionEvent, SyncEngine, SyncFailure, SyncState};
pub use view::ViewBuilder;
pub use writes::{WriteHandle, WritePolicy};
