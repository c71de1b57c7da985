//! Actor identity.
//!
//! An `ActorId` is whoever a write or a subscription is attributed to: an
//! authenticated account, or an anonymous session that has not signed in.
//! Entries store the actor as a plain string (`createdBy`, `lastModifiedBy`),
//! so the two kinds share one string space: anonymous ids always carry the
//! [`ANONYMOUS_PREFIX`], account uids never do.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::AccountId;

/// Prefix of every anonymous session id.
pub const ANONYMOUS_PREFIX: &str = "temp-";

/// Which kind of actor an [`ActorId`] names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActorKind {
    Account,
    Anonymous,
}

/// A stable per-actor identifier.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ActorId {
    /// An authenticated account.
    Account(AccountId),
    /// A locally generated session id (always starts with `temp-`).
    Anonymous(String),
}

impl ActorId {
    /// Which kind of actor this is.
    pub fn kind(&self) -> ActorKind {
        match self {
            ActorId::Account(_) => ActorKind::Account,
            ActorId::Anonymous(_) => ActorKind::Anonymous,
        }
    }

    /// The id as written into `createdBy` / `lastModifiedBy`.
    pub fn as_str(&self) -> &str {
        match self {
            ActorId::Account(uid) => uid.as_str(),
            ActorId::Anonymous(id) => id,
        }
    }

    /// Reconstruct an actor from a stored author string.
    pub fn from_stored(s: &str) -> Self {
        if s.starts_with(ANONYMOUS_PREFIX) {
            ActorId::Anonymous(s.to_string())
        } else {
            ActorId::Account(AccountId::new(s))
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, ActorId::Anonymous(_))
    }

    /// The account uid, if authenticated.
    pub fn account_id(&self) -> Option<&AccountId> {
        match self {
            ActorId::Account(uid) => Some(uid),
            ActorId::Anonymous(_) => None,
        }
    }

    /// Whether a stored author string names this actor.
    ///
    /// A missing author never matches.
    pub fn authored(&self, stored: Option<&str>) -> bool {
        stored.is_some_and(|s| s == self.as_str())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId::{}({})", self.kind(), self.as_str())
    }
}

impl From<AccountId> for ActorId {
    fn from(uid: AccountId) -> Self {
        ActorId::Account(uid)
    }
}

// ============================================================================
// Tests
// ============================================================================
