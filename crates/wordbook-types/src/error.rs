//! Input validation errors.
//!
//! Raised locally before any remote call; never reaches the store.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is empty after trimming.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// The email address does not look like `local@domain.tld`.
    #[error("invalid email address")]
    InvalidEmail,

    /// The password is shorter than the provider minimum.
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
}

impl ValidationError {
    /// Name of the offending field, for form-level reporting.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyField(field) => field,
            ValidationError::InvalidEmail => "email",
            ValidationError::WeakPassword { .. } => "password",
        }
    }
}
