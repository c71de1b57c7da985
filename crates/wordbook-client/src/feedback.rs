//! Feedback messages.
//!
//! Anyone may submit; reading and managing feedback is admin-only.

use serde_json::{Map, Value};
use tracing::{info, warn};
use wordbook_store::{Query, SharedStore, StoreError};
use wordbook_types::{AccountId, Feedback, FeedbackId, ValidationError, now_millis};

use crate::accounts::AccountService;
use crate::config::ClientConfig;
use crate::error::{AdminError, FeedbackError};

#[derive(Clone)]
pub struct FeedbackService {
    store: SharedStore,
    collection: String,
    accounts: AccountService,
}

impl FeedbackService {
    pub fn new(store: SharedStore, accounts: AccountService, config: &ClientConfig) -> Self {
        Self {
            store,
            collection: config.feedback_collection.clone(),
            accounts,
        }
    }

    /// Store a message. `email` is omitted for anonymous senders.
    pub async fn submit(
        &self,
        message: &str,
        email: Option<&str>,
    ) -> Result<FeedbackId, FeedbackError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyField("message").into());
        }

        let id = FeedbackId::new(self.store.allocate_key(&self.collection));
        let feedback = Feedback {
            id: id.clone(),
            message: message.to_string(),
            created_at: now_millis(),
            read: false,
            user_email: email.map(str::trim).filter(|e| !e.is_empty()).map(str::to_string),
        };
        let value = serde_json::to_value(&feedback).map_err(StoreError::from)?;
        self.store
            .set(&self.collection, id.as_str(), value)
            .await
            .inspect_err(|e| warn!(error = %e, "feedback submit failed"))?;
        info!(feedback_id = %id, "feedback submitted");
        Ok(id)
    }

    async fn all(&self) -> Result<Vec<Feedback>, AdminError> {
        let children = self.store.list(&Query::collection(&self.collection)).await?;
        Ok(children
            .into_iter()
            .filter_map(|(key, value)| {
                match Feedback::from_value(FeedbackId::new(key.clone()), value) {
                    Ok(feedback) => Some(feedback),
                    Err(e) => {
                        warn!(feedback_id = %key, error = %e, "skipping feedback");
                        None
                    }
                }
            })
            .collect())
    }

    /// Messages matching `search` (message or sender), newest first.
    pub async fn list(
        &self,
        acting: Option<&AccountId>,
        search: &str,
    ) -> Result<Vec<Feedback>, AdminError> {
        self.accounts.require_admin(acting).await?;
        let needle = search.trim().to_lowercase();
        let mut items: Vec<Feedback> = self
            .all()
            .await?
            .into_iter()
            .filter(|f| {
                needle.is_empty()
                    || f.message.to_lowercase().contains(&needle)
                    || f.sender().to_lowercase().contains(&needle)
            })
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    pub async fn mark_read(
        &self,
        acting: Option<&AccountId>,
        id: &FeedbackId,
        read: bool,
    ) -> Result<(), AdminError> {
        self.accounts.require_admin(acting).await?;
        let mut changes = Map::new();
        changes.insert("read".into(), Value::from(read));
        self.store
            .update(&self.collection, id.as_str(), changes)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    AdminError::NotFound(format!("feedback {id}"))
                } else {
                    AdminError::Remote(e)
                }
            })
    }

    pub async fn delete(&self, acting: Option<&AccountId>, id: &FeedbackId) -> Result<(), AdminError> {
        self.accounts.require_admin(acting).await?;
        self.store.remove(&self.collection, id.as_str()).await?;
        info!(feedback_id = %id, "feedback deleted");
        Ok(())
    }

    pub async fn unread_count(&self, acting: Option<&AccountId>) -> Result<usize, AdminError> {
        self.accounts.require_admin(acting).await?;
        Ok(self.all().await?.iter().filter(|f| !f.read).count())
    }
}
