//! Typed keys for entries, accounts and feedback.
//!
//! Keys are opaque strings on the wire: the store allocates entry and feedback
//! keys (UUIDv7 simple hex, so lexical order is creation order), and account
//! ids are whatever uid the authentication provider hands out. The `short()`
//! form is for human-facing output only, never used as a lookup key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Key of a word entry under `words/{id}`.
#[derive(Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

/// Uid of an authenticated account under `users/{uid}`.
#[derive(Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

/// Key of a feedback message under `feedback/{id}`.
#[derive(Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackId(String);

/// Allocate a fresh, time-ordered key (UUIDv7 as 32 hex chars).
///
/// Two calls never return the same key.
pub fn generate_key() -> String {
    uuid::Uuid::now_v7().as_simple().to_string()
}

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_string_key {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Wrap an existing key.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Allocate a fresh time-ordered key.
            pub fn generate() -> Self {
                Self(generate_key())
            }

            /// The raw key as stored.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First 8 characters, for human display only, not lookup.
            pub fn short(&self) -> &str {
                match self.0.char_indices().nth(8) {
                    Some((idx, _)) => &self.0[..idx],
                    None => &self.0,
                }
            }

            /// Whether the key is empty (never valid in the store).
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consume into the raw key.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_string_key!(EntryId, "EntryId");
impl_string_key!(AccountId, "AccountId");
impl_string_key!(FeedbackId, "FeedbackId");

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        let a = EntryId::generate();
        let b = EntryId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_key_is_32_hex_chars() {
        let key = generate_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_keys_sort_by_creation() {
        let keys: Vec<String> = (0..10).map(|_| generate_key()).collect();
        for i in 1..keys.len() {
            assert!(keys[i] >= keys[i - 1]);
        }
    }

    #[test]
    fn test_short_is_prefix() {
        let id = EntryId::new("abcdef0123456789");
        assert_eq!(id.short(), "abcdef01");
        assert_eq!(AccountId::new("uid").short(), "uid");
    }

    #[test]
    fn test_short_respects_char_boundaries() {
        let id = AccountId::new("ñandú-ñandú");
        assert_eq!(id.short(), "ñandú-ña");
    }

    #[test]
    fn test_display_is_full_key() {
        let id = FeedbackId::new("k1");
        assert_eq!(id.to_string(), "k1");
        assert_eq!(format!("{id:?}"), "FeedbackId(k1)");
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = EntryId::new("xyz");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"xyz\"");
        let parsed: EntryId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
