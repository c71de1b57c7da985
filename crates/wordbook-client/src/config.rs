//! Client configuration.
//!
//! Loaded from RON; every field has a default, so an empty file (or no file
//! at all) gives a working client.
//!
//! ```ron
//! (
//!     search_debounce_ms: 250,
//!     allow_anonymous_writes: true,
//!     admin_emails: ["admin@example.com"],
//! )
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{
    DEFAULT_ORDER_KEY, FEEDBACK_COLLECTION, INITIAL_LOAD_WINDOW, RECENT_WORDS_LIMIT,
    SEARCH_DEBOUNCE, USERS_COLLECTION, WORDS_COLLECTION,
};
use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub words_collection: String,
    pub users_collection: String,
    pub feedback_collection: String,
    /// Entry field the live query orders by.
    pub order_key: String,
    pub search_debounce_ms: u64,
    pub initial_load_window_ms: u64,
    /// Let sessions without an account author entries.
    pub allow_anonymous_writes: bool,
    /// Only verified accounts (and admins) may write. Off by default: new
    /// accounts can write as soon as they sign up.
    pub require_verified_writers: bool,
    /// Emails that become admins when their account record is first created.
    pub admin_emails: Vec<String>,
    pub recent_words_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            words_collection: WORDS_COLLECTION.to_string(),
            users_collection: USERS_COLLECTION.to_string(),
            feedback_collection: FEEDBACK_COLLECTION.to_string(),
            order_key: DEFAULT_ORDER_KEY.to_string(),
            search_debounce_ms: SEARCH_DEBOUNCE.as_millis() as u64,
            initial_load_window_ms: INITIAL_LOAD_WINDOW.as_millis() as u64,
            allow_anonymous_writes: false,
            require_verified_writers: false,
            admin_emails: Vec::new(),
            recent_words_limit: RECENT_WORDS_LIMIT,
        }
    }
}

impl ClientConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&text)?;
        info!(path = %path.display(), "loaded client config");
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/wordbook/client.ron` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("wordbook").join("client.ron"))
    }

    /// Load from [`default_path`](Self::default_path), falling back to
    /// defaults when there is no file. A file that exists but fails to
    /// parse is still an error.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("no client config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn initial_load_window(&self) -> Duration {
        Duration::from_millis(self.initial_load_window_ms)
    }

    /// Case-insensitive membership in `admin_emails`.
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim();
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email))
    }
}
