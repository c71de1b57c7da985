//! Account records.
//!
//! Every authenticated principal gets exactly one record under
//! `users/{uid}`, created lazily on first sign-in. `isAdmin` is decided
//! here, once, from the configured admin emails; nothing else ever derives
//! admin status from an email address.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use wordbook_store::{Principal, Query, SharedStore};
use wordbook_types::{
    Account, AccountId, DEFAULT_DISPLAY_NAME, now_millis, sanitize_display_name,
};

use crate::config::ClientConfig;
use crate::error::{AccountError, AdminError};

/// Which accounts an admin listing shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AccountFilter {
    #[default]
    All,
    Verified,
    Unverified,
}

impl AccountFilter {
    fn accepts(self, account: &Account) -> bool {
        match self {
            AccountFilter::All => true,
            AccountFilter::Verified => account.is_verified,
            AccountFilter::Unverified => !account.is_verified,
        }
    }
}

/// Pick the name to store: provider name, else stored name, else the
/// email's local part, else [`DEFAULT_DISPLAY_NAME`].
pub fn resolve_display_name(provider: Option<&str>, stored: Option<&str>, email: &str) -> String {
    provider
        .and_then(sanitize_display_name)
        .or_else(|| stored.and_then(sanitize_display_name))
        .or_else(|| sanitize_display_name(email))
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string())
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Reads and maintains `users/{uid}` records.
#[derive(Clone)]
pub struct AccountService {
    store: SharedStore,
    collection: String,
    admin_emails: Arc<Vec<String>>,
}

impl AccountService {
    pub fn new(store: SharedStore, config: &ClientConfig) -> Self {
        Self {
            store,
            collection: config.users_collection.clone(),
            admin_emails: Arc::new(
                config
                    .admin_emails
                    .iter()
                    .map(|e| e.trim().to_lowercase())
                    .collect(),
            ),
        }
    }

    fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }

    fn decode(uid: &AccountId, value: Value) -> Result<Account, AccountError> {
        let mut account = Account::from_value(value).map_err(|e| AccountError::Corrupt {
            uid: uid.to_string(),
            reason: e.to_string(),
        })?;
        if account.uid.is_empty() {
            account.uid = uid.clone();
        }
        Ok(account)
    }

    pub async fn get(&self, uid: &AccountId) -> Result<Option<Account>, AccountError> {
        match self.store.get(&self.collection, uid.as_str()).await? {
            Some(value) => Ok(Some(Self::decode(uid, value)?)),
            None => Ok(None),
        }
    }

    /// Create the record on first authentication; refresh name, email and
    /// last login on every later one.
    pub async fn ensure_account(&self, principal: &Principal) -> Result<Account, AccountError> {
        let now = now_millis();
        match self.get(&principal.uid).await? {
            None => {
                let name =
                    resolve_display_name(principal.display_name.as_deref(), None, &principal.email);
                let account = Account::new(
                    principal.uid.clone(),
                    name,
                    principal.email.clone(),
                    self.is_admin_email(&principal.email),
                    now,
                );
                let value = serde_json::to_value(&account).map_err(wordbook_store::StoreError::from)?;
                self.store
                    .set(&self.collection, principal.uid.as_str(), value)
                    .await?;
                info!(uid = %account.uid, admin = account.is_admin, "account created");
                Ok(account)
            }
            Some(mut account) => {
                account.display_name = resolve_display_name(
                    principal.display_name.as_deref(),
                    Some(&account.display_name),
                    &principal.email,
                );
                account.email = principal.email.clone();
                account.last_login = now;

                let mut changes = Map::new();
                changes.insert("displayName".into(), Value::from(account.display_name.as_str()));
                changes.insert("email".into(), Value::from(account.email.as_str()));
                changes.insert("lastLogin".into(), Value::from(now));
                self.store
                    .update(&self.collection, principal.uid.as_str(), changes)
                    .await?;
                debug!(uid = %account.uid, "account login recorded");
                Ok(account)
            }
        }
    }

    // ── Admin ───────────────────────────────────────────────────────────

    /// Load the acting account and require it to be an admin.
    pub async fn require_admin(&self, acting: Option<&AccountId>) -> Result<Account, AdminError> {
        let uid = acting.ok_or(AdminError::Forbidden)?;
        match self.get(uid).await {
            Ok(Some(account)) if account.is_admin => Ok(account),
            Ok(_) => Err(AdminError::Forbidden),
            Err(AccountError::Remote(e)) => Err(AdminError::Remote(e)),
            Err(AccountError::Corrupt { .. }) => Err(AdminError::Forbidden),
        }
    }

    /// All decodable accounts; corrupt records are logged and skipped.
    pub(crate) async fn all(&self) -> Result<Vec<Account>, AdminError> {
        let children = self.store.list(&Query::collection(&self.collection)).await?;
        Ok(children
            .into_iter()
            .filter_map(|(key, value)| {
                match Self::decode(&AccountId::new(key.clone()), value) {
                    Ok(account) => Some(account),
                    Err(e) => {
                        warn!(uid = %key, error = %e, "skipping account");
                        None
                    }
                }
            })
            .collect())
    }

    /// Accounts matching `filter` and `search` (name or email), newest first.
    pub async fn list_accounts(
        &self,
        acting: Option<&AccountId>,
        filter: AccountFilter,
        search: &str,
    ) -> Result<Vec<Account>, AdminError> {
        self.require_admin(acting).await?;
        let needle = search.trim().to_lowercase();
        let mut accounts: Vec<Account> = self
            .all()
            .await?
            .into_iter()
            .filter(|a| filter.accepts(a))
            .filter(|a| {
                needle.is_empty()
                    || contains_folded(&a.display_name, &needle)
                    || contains_folded(&a.email, &needle)
            })
            .collect();
        accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(accounts)
    }

    pub async fn set_verified(
        &self,
        acting: Option<&AccountId>,
        uid: &AccountId,
        verified: bool,
    ) -> Result<(), AdminError> {
        self.require_admin(acting).await?;
        let mut changes = Map::new();
        changes.insert("isVerified".into(), Value::from(verified));
        self.store
            .update(&self.collection, uid.as_str(), changes)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    AdminError::NotFound(format!("account {uid}"))
                } else {
                    AdminError::Remote(e)
                }
            })?;
        info!(%uid, verified, "account verification changed");
        Ok(())
    }

    /// Remove the account record. The principal itself stays registered
    /// with the auth provider and gets a fresh record on next sign-in.
    pub async fn delete_account(
        &self,
        acting: Option<&AccountId>,
        uid: &AccountId,
    ) -> Result<(), AdminError> {
        self.require_admin(acting).await?;
        self.store.remove(&self.collection, uid.as_str()).await?;
        info!(%uid, "account deleted");
        Ok(())
    }
}
