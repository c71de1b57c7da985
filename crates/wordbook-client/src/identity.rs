//! Who is acting.
//!
//! [`IdentityResolver`] turns the auth provider's state into an
//! [`ActorId`]: the account uid when signed in, otherwise an anonymous
//! session id that is generated once per session-storage lifetime and then
//! reused until storage is cleared.
//!
//! [`Author`] is the resolved actor plus what writes need to stamp and
//! authorize them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, warn};
use wordbook_store::AuthState;
use wordbook_types::{ANONYMOUS_PREFIX, Account, ActorId};

use crate::constants::{ANONYMOUS_DISPLAY_NAME, ANONYMOUS_ID_LEN, SESSION_ID_KEY};
use crate::error::StorageError;

// ============================================================================
// Session storage
// ============================================================================

/// Ephemeral key-value storage scoped to one client session.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// Storage that lives as long as the process.
#[derive(Default)]
pub struct MemorySessionStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.values.lock().clear();
        Ok(())
    }
}

/// Storage persisted as a JSON object in one file.
///
/// The whole file is rewritten on every change. A missing file reads as
/// empty; an unreadable one is logged and also reads as empty.
pub struct FileSessionStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(map)?)?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        f(&mut map);
        self.write_map(&map)
    }
}

impl SessionStorage for FileSessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock();
        match self.read_map() {
            Ok(mut map) => map.remove(key),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable session storage");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.modify(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.modify(|map| {
            map.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Identity resolver
// ============================================================================

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A fresh anonymous id: `temp-` plus nine random base36 characters.
pub fn generate_anonymous_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ANONYMOUS_ID_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{ANONYMOUS_PREFIX}{suffix}")
}

/// Maps auth state to a stable actor id.
pub struct IdentityResolver {
    storage: Arc<dyn SessionStorage>,
    cached: Mutex<Option<String>>,
}

impl IdentityResolver {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            cached: Mutex::new(None),
        }
    }

    /// Account uid when signed in, otherwise the anonymous session id.
    pub fn resolve(&self, state: &AuthState) -> ActorId {
        match state.principal() {
            Some(principal) => ActorId::Account(principal.uid.clone()),
            None => ActorId::Anonymous(self.anonymous_id()),
        }
    }

    /// The anonymous id for this storage lifetime, created on first use.
    ///
    /// Written to storage at most once. If the write fails the id is still
    /// used for the rest of the process.
    pub fn anonymous_id(&self) -> String {
        let mut cached = self.cached.lock();
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let id = match self.storage.get(SESSION_ID_KEY) {
            Some(stored) if stored.starts_with(ANONYMOUS_PREFIX) => stored,
            _ => {
                let id = generate_anonymous_id();
                if let Err(e) = self.storage.set(SESSION_ID_KEY, &id) {
                    warn!(error = %e, "could not persist anonymous session id");
                }
                debug!(session_id = %id, "new anonymous session");
                id
            }
        };
        *cached = Some(id.clone());
        id
    }

    /// Forget the cached id (after the storage itself was cleared).
    pub fn reset(&self) {
        *self.cached.lock() = None;
    }
}

// ============================================================================
// Author
// ============================================================================

/// The acting identity as writes see it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub actor: ActorId,
    /// Stamped into `createdByDisplayName` / `lastModifiedByDisplayName`.
    pub display_name: String,
    pub verified: bool,
    pub admin: bool,
}

impl Author {
    pub fn anonymous(session_id: impl Into<String>) -> Self {
        Self {
            actor: ActorId::Anonymous(session_id.into()),
            display_name: ANONYMOUS_DISPLAY_NAME.to_string(),
            verified: false,
            admin: false,
        }
    }

    pub fn from_account(account: &Account) -> Self {
        Self {
            actor: ActorId::Account(account.uid.clone()),
            display_name: account.display_name.clone(),
            verified: account.is_verified,
            admin: account.is_admin,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
