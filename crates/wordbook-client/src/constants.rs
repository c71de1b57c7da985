//! Client-wide defaults.
//!
//! Timing values are the defaults for [`ClientConfig`](crate::ClientConfig);
//! the session reads the configured values, never these directly.

use std::time::Duration;

/// Collection holding word entries.
pub const WORDS_COLLECTION: &str = "words";

/// Collection holding account records.
pub const USERS_COLLECTION: &str = "users";

/// Collection holding feedback messages.
pub const FEEDBACK_COLLECTION: &str = "feedback";

/// Field the live query orders by.
pub const DEFAULT_ORDER_KEY: &str = "textLower";

/// Quiet period before a search term settles.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Insertions observed this soon after subscribing are the initial replay.
pub const INITIAL_LOAD_WINDOW: Duration = Duration::from_millis(1000);

/// How many recent entries the admin dashboard shows.
pub const RECENT_WORDS_LIMIT: usize = 5;

/// Session-storage key of the anonymous session id.
pub const SESSION_ID_KEY: &str = "wordbook.session_id";

/// Random base36 characters after the anonymous prefix.
pub const ANONYMOUS_ID_LEN: usize = 9;

/// Display name stamped on entries written by anonymous sessions.
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous";

/// Capacity of the insertion and error broadcast channels.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
