//! Account records.
//!
//! One `Account` per authenticated principal, stored under `users/{uid}`.
//! `is_admin` is written once, when the record is created by the trusted
//! account path; readers never recompute it from the email.

use serde::{Deserialize, Serialize};

use crate::ids::AccountId;

/// Display name used when neither the provider nor the store has one.
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// A user record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Account {
    pub uid: AccountId,
    pub display_name: String,
    pub email: String,
    /// Set by an admin; gates the "waiting for verification" state.
    pub is_verified: bool,
    pub is_admin: bool,
    /// Unix millis.
    pub created_at: u64,
    /// Unix millis of the most recent authentication.
    pub last_login: u64,
}

impl Account {
    /// A fresh record for a first-time principal.
    ///
    /// Admins start verified; everyone else waits for an admin.
    pub fn new(
        uid: AccountId,
        display_name: impl Into<String>,
        email: impl Into<String>,
        is_admin: bool,
        now: u64,
    ) -> Self {
        Self {
            uid,
            display_name: display_name.into(),
            email: email.into(),
            is_verified: is_admin,
            is_admin,
            created_at: now,
            last_login: now,
        }
    }

    /// Whether this account may author entries when verification is required.
    pub fn may_write(&self) -> bool {
        self.is_admin || self.is_verified
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Clean a display name for storage: trim, and never store an email address.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_display_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let name = match trimmed.split_once('@') {
        Some((local, _)) => local.trim(),
        None => trimmed,
    };
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_admin_is_verified() {
        let admin = Account::new(AccountId::new("a"), "Admin", "admin@x.io", true, 10);
        assert!(admin.is_verified);
        assert!(admin.may_write());

        let user = Account::new(AccountId::new("u"), "Ana", "ana@x.io", false, 10);
        assert!(!user.is_verified);
        assert!(!user.may_write());
        assert_eq!(user.created_at, user.last_login);
    }

    #[test]
    fn test_sanitize_display_name() {
        assert_eq!(sanitize_display_name("  Ana  ").as_deref(), Some("Ana"));
        assert_eq!(sanitize_display_name("ana@mail.com").as_deref(), Some("ana"));
        assert_eq!(sanitize_display_name("@mail.com"), None);
        assert_eq!(sanitize_display_name("   "), None);
    }

    #[test]
    fn test_serde_camel_case() {
        let acct = Account::new(AccountId::new("u"), "Ana", "ana@x.io", false, 5);
        let value = serde_json::to_value(&acct).unwrap();
        assert_eq!(value["displayName"], "Ana");
        assert_eq!(value["isVerified"], false);
        assert_eq!(value["lastLogin"], 5);
        assert_eq!(Account::from_value(value).unwrap(), acct);
    }

    #[test]
    fn test_from_value_tolerates_missing_fields() {
        let acct = Account::from_value(serde_json::json!({"uid": "u9"})).unwrap();
        assert_eq!(acct.uid.as_str(), "u9");
        assert!(!acct.is_admin);
    }
}
