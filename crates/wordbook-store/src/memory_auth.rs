//! In-memory authentication provider.
//!
//! Registered credentials live in an [`AuthDirectory`] that several
//! [`MemoryAuth`] instances may share, one per client, the way separate
//! browsers share one hosted user pool. Each `MemoryAuth` tracks its own
//! signed-in state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::debug;
use wordbook_types::AccountId;

use crate::auth::{AuthError, AuthProvider, AuthState, Principal, validate_credentials};

/// Consecutive failed sign-ins after which an email is locked out.
pub const MAX_FAILED_SIGN_INS: u32 = 5;

struct Credential {
    uid: AccountId,
    email: String,
    display_name: Option<String>,
    salt: String,
    digest: String,
    failed_sign_ins: u32,
}

impl Credential {
    fn principal(&self) -> Principal {
        Principal {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            email_verified: false,
        }
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registered credentials, keyed by normalized email.
#[derive(Default)]
pub struct AuthDirectory {
    credentials: Mutex<HashMap<String, Credential>>,
}

impl AuthDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of registered principals.
    pub fn len(&self) -> usize {
        self.credentials.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.lock().is_empty()
    }

    fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Principal, AuthError> {
        validate_credentials(email, password)?;
        let key = normalize_email(email);

        let mut creds = self.credentials.lock();
        if creds.contains_key(&key) {
            return Err(AuthError::EmailInUse);
        }

        let salt = uuid::Uuid::new_v4().simple().to_string();
        let credential = Credential {
            uid: AccountId::new(uuid::Uuid::new_v4().simple().to_string()),
            email: email.trim().to_string(),
            display_name: display_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            digest: digest(&salt, password),
            salt,
            failed_sign_ins: 0,
        };
        let principal = credential.principal();
        creds.insert(key, credential);
        Ok(principal)
    }

    fn verify(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let mut creds = self.credentials.lock();
        let credential = creds
            .get_mut(&normalize_email(email))
            .ok_or(AuthError::InvalidCredential)?;

        if credential.failed_sign_ins >= MAX_FAILED_SIGN_INS {
            return Err(AuthError::TooManyRequests);
        }
        if digest(&credential.salt, password) != credential.digest {
            credential.failed_sign_ins += 1;
            return Err(AuthError::InvalidCredential);
        }
        credential.failed_sign_ins = 0;
        Ok(credential.principal())
    }
}

/// One client's view of an [`AuthDirectory`].
pub struct MemoryAuth {
    directory: Arc<AuthDirectory>,
    state: watch::Sender<AuthState>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuth {
    /// A provider with its own private directory.
    pub fn new() -> Self {
        Self::with_directory(AuthDirectory::new())
    }

    /// A provider sharing `directory` with other clients.
    pub fn with_directory(directory: Arc<AuthDirectory>) -> Self {
        let (state, _) = watch::channel(AuthState::SignedOut);
        Self { directory, state }
    }

    pub fn directory(&self) -> &Arc<AuthDirectory> {
        &self.directory
    }

    fn publish(&self, state: AuthState) {
        self.state.send_replace(state);
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Principal, AuthError> {
        let principal = self.directory.register(email, password, display_name)?;
        debug!(uid = %principal.uid, "signed up");
        self.publish(AuthState::SignedIn(principal.clone()));
        Ok(principal)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let principal = self.directory.verify(email, password)?;
        debug!(uid = %principal.uid, "signed in");
        self.publish(AuthState::SignedIn(principal.clone()));
        Ok(principal)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.state.borrow().is_signed_in() {
            debug!("signed out");
            self.publish(AuthState::SignedOut);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
