//! Authentication provider trait.
//!
//! The client never stores credentials itself. It watches an
//! [`AuthProvider`] for principal changes and turns the current
//! [`AuthState`] into an actor id.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tokio::sync::watch;
use wordbook_types::{AccountId, ValidationError};

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("static email pattern"));

/// An authenticated principal as reported by the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub uid: AccountId,
    pub email: String,
    /// Name given at sign-up, if any.
    pub display_name: Option<String>,
    pub email_verified: bool,
}

/// Current authentication state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn(Principal),
}

impl AuthState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthState::SignedIn(p) => Some(p),
            AuthState::SignedOut => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthState::SignedIn(_))
    }
}

/// Credential-level failures. Always reported to the caller, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredential,

    #[error("email is already registered")]
    EmailInUse,

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("email address is malformed")]
    InvalidEmail,

    #[error("too many failed attempts, try again later")]
    TooManyRequests,

    #[error("auth error: {0}")]
    Other(String),
}

impl From<ValidationError> for AuthError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::InvalidEmail => AuthError::InvalidEmail,
            ValidationError::WeakPassword { min } => AuthError::WeakPassword { min },
            other => AuthError::Other(other.to_string()),
        }
    }
}

/// Check the shape of sign-up credentials before any provider call.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email.trim()) {
        return Err(ValidationError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Shared provider handle.
pub type SharedAuth = Arc<dyn AuthProvider>;

/// Source of principal changes plus the credential operations.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The state right now.
    fn current(&self) -> AuthState;

    /// A receiver that observes every state change.
    fn watch(&self) -> watch::Receiver<AuthState>;

    /// Register and sign in.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Principal, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    /// Sign out. Signing out while signed out is a no-op.
    async fn sign_out(&self) -> Result<(), AuthError>;
}
