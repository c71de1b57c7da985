//! Admin dashboard data.

use wordbook_store::{Query, SharedStore};
use wordbook_types::{AccountId, Entry};

use crate::accounts::AccountService;
use crate::config::ClientConfig;
use crate::error::AdminError;
use crate::feedback::FeedbackService;
use crate::sync::decode_entries;

/// Creation-time ordering for the word management table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Dashboard counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminStats {
    pub total_words: usize,
    pub total_users: usize,
    pub verified_users: usize,
    pub unread_feedback: usize,
    /// Most recently created entries, newest first.
    pub recent_words: Vec<Entry>,
}

#[derive(Clone)]
pub struct AdminService {
    store: SharedStore,
    words_collection: String,
    recent_limit: usize,
    accounts: AccountService,
    feedback: FeedbackService,
}

impl AdminService {
    pub fn new(
        store: SharedStore,
        accounts: AccountService,
        feedback: FeedbackService,
        config: &ClientConfig,
    ) -> Self {
        Self {
            store,
            words_collection: config.words_collection.clone(),
            recent_limit: config.recent_words_limit,
            accounts,
            feedback,
        }
    }

    async fn entries(&self) -> Result<Vec<Entry>, AdminError> {
        let children = self
            .store
            .list(&Query::collection(&self.words_collection))
            .await?;
        Ok(decode_entries(children))
    }

    pub async fn stats(&self, acting: Option<&AccountId>) -> Result<AdminStats, AdminError> {
        self.accounts.require_admin(acting).await?;

        let mut words = self.entries().await?;
        let users = self.accounts.all().await?;
        let unread_feedback = self.feedback.unread_count(acting).await?;

        words.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total_words = words.len();
        words.truncate(self.recent_limit);

        Ok(AdminStats {
            total_words,
            total_users: users.len(),
            verified_users: users.iter().filter(|u| u.is_verified).count(),
            unread_feedback,
            recent_words: words,
        })
    }

    /// Every entry, ordered by creation time. `search` matches the headword,
    /// meaning, example, or the author's display name.
    pub async fn manage_words(
        &self,
        acting: Option<&AccountId>,
        search: &str,
        order: SortOrder,
    ) -> Result<Vec<Entry>, AdminError> {
        self.accounts.require_admin(acting).await?;
        let needle = search.trim().to_lowercase();
        let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&needle));

        let mut words: Vec<Entry> = self
            .entries()
            .await?
            .into_iter()
            .filter(|e| {
                needle.is_empty()
                    || hit(Some(e.text.as_str()))
                    || hit(Some(e.meaning.as_str()))
                    || hit(e.example.as_deref())
                    || hit(e.created_by_display_name.as_deref())
            })
            .collect();
        match order {
            SortOrder::NewestFirst => words.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::OldestFirst => words.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        Ok(words)
    }
}
