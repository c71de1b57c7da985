//! Write coordinator.
//!
//! All entry mutations go through one write actor task, so writes from a
//! client reach the store in the order they were issued. Each command is
//! validated and authorized before any remote call, then stamped with the
//! author and a monotonic timestamp.
//!
//! ```text
//!   WriteHandle (Clone)        mpsc       WriteActor (tokio task)
//!   ┌──────────────────┐   ─────────▶   ┌────────────────────────┐
//!   │ .create()        │                │ validate → authorize   │
//!   │ .update()        │   ◀─────────   │ stamp → store write    │
//!   │ .toggle_favorite │    oneshot     │ monotonic clock        │
//!   │ .delete()        │                └────────────────────────┘
//!   └──────────────────┘
//! ```
//!
//! The local cache is never touched here. A write becomes visible when the
//! store's next snapshot carries it.

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use wordbook_store::{SharedStore, StoreError};
use wordbook_types::{Entry, EntryDraft, EntryId, entry_fields as fields, now_millis};

use crate::config::ClientConfig;
use crate::error::WriteError;
use crate::identity::Author;

// ============================================================================
// Policy
// ============================================================================

/// Who may write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WritePolicy {
    pub allow_anonymous: bool,
    pub require_verified: bool,
}

impl WritePolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            allow_anonymous: config.allow_anonymous_writes,
            require_verified: config.require_verified_writers,
        }
    }

    pub fn check(&self, author: &Author) -> Result<(), WriteError> {
        if author.actor.is_anonymous() {
            if self.allow_anonymous {
                return Ok(());
            }
            return Err(WriteError::AnonymousWriteDenied);
        }
        if self.require_verified && !(author.verified || author.admin) {
            return Err(WriteError::UnverifiedWriter);
        }
        Ok(())
    }
}

/// Millisecond clock that never runs backwards.
#[derive(Debug, Default)]
struct MonotonicClock {
    last: u64,
}

impl MonotonicClock {
    fn now(&mut self) -> u64 {
        self.last = now_millis().max(self.last);
        self.last
    }
}

// ============================================================================
// Commands (internal)
// ============================================================================

enum WriteCommand {
    Create {
        author: Author,
        draft: EntryDraft,
        reply: oneshot::Sender<Result<EntryId, WriteError>>,
    },
    Update {
        author: Author,
        id: EntryId,
        draft: EntryDraft,
        reply: oneshot::Sender<Result<(), WriteError>>,
    },
    ToggleFavorite {
        author: Author,
        id: EntryId,
        current: bool,
        reply: oneshot::Sender<Result<bool, WriteError>>,
    },
    Delete {
        author: Author,
        id: EntryId,
        reply: oneshot::Sender<Result<(), WriteError>>,
    },
}

// ============================================================================
// WriteHandle (public API)
// ============================================================================

/// Cloneable handle to the write actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl WriteHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, WriteError>>) -> WriteCommand,
    ) -> Result<T, WriteError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| WriteError::Shutdown)?;
        rx.await.map_err(|_| WriteError::Shutdown)?
    }

    /// Create an entry under a newly allocated key. Returns the key.
    pub async fn create(&self, author: Author, draft: EntryDraft) -> Result<EntryId, WriteError> {
        self.call(|reply| WriteCommand::Create {
            author,
            draft,
            reply,
        })
        .await
    }

    /// Replace the content fields of an existing entry.
    pub async fn update(
        &self,
        author: Author,
        id: EntryId,
        draft: EntryDraft,
    ) -> Result<(), WriteError> {
        self.call(|reply| WriteCommand::Update {
            author,
            id,
            draft,
            reply,
        })
        .await
    }

    /// Flip `isFavorite` from `current`. Returns the new value.
    pub async fn toggle_favorite(
        &self,
        author: Author,
        id: EntryId,
        current: bool,
    ) -> Result<bool, WriteError> {
        self.call(|reply| WriteCommand::ToggleFavorite {
            author,
            id,
            current,
            reply,
        })
        .await
    }

    /// Delete an entry. Deleting an absent entry succeeds.
    pub async fn delete(&self, author: Author, id: EntryId) -> Result<(), WriteError> {
        self.call(|reply| WriteCommand::Delete { author, id, reply })
            .await
    }
}

// ============================================================================
// WriteActor
// ============================================================================

struct WriteActor {
    store: SharedStore,
    collection: String,
    policy: WritePolicy,
    clock: MonotonicClock,
}

/// Map a store failure on an existing entry.
fn entry_error(id: &EntryId, error: StoreError) -> WriteError {
    if error.is_not_found() {
        return WriteError::NotFound(id.clone());
    }
    warn!(entry_id = %id, error = %error, "entry write failed");
    WriteError::Remote(error)
}

impl WriteActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.handle_command(cmd).await;
        }
        debug!("write actor shutting down: channel closed");
    }

    async fn handle_command(&mut self, cmd: WriteCommand) {
        match cmd {
            WriteCommand::Create {
                author,
                draft,
                reply,
            } => {
                let _ = reply.send(self.create(&author, &draft).await);
            }
            WriteCommand::Update {
                author,
                id,
                draft,
                reply,
            } => {
                let _ = reply.send(self.update(&author, &id, &draft).await);
            }
            WriteCommand::ToggleFavorite {
                author,
                id,
                current,
                reply,
            } => {
                let _ = reply.send(self.toggle_favorite(&author, &id, current).await);
            }
            WriteCommand::Delete { author, id, reply } => {
                let _ = reply.send(self.delete(&author, &id).await);
            }
        }
    }

    async fn create(&mut self, author: &Author, draft: &EntryDraft) -> Result<EntryId, WriteError> {
        let content = draft.normalize()?;
        self.policy.check(author)?;

        let now = self.clock.now();
        let id = EntryId::new(self.store.allocate_key(&self.collection));
        let actor = author.actor.as_str().to_string();
        let entry = Entry {
            id: id.clone(),
            text: content.text,
            text_lower: Some(content.text_lower),
            meaning: content.meaning,
            example: content.example,
            is_favorite: false,
            created_at: now,
            updated_at: now,
            created_by: Some(actor.clone()),
            created_by_display_name: Some(author.display_name.clone()),
            last_modified_by: Some(actor),
            last_modified_by_display_name: Some(author.display_name.clone()),
        };
        let value = entry
            .to_value()
            .map_err(|e| WriteError::Remote(StoreError::from(e)))?;

        self.store
            .set(&self.collection, id.as_str(), value)
            .await
            .map_err(|e| {
                warn!(entry_id = %id, error = %e, "create failed");
                WriteError::Remote(e)
            })?;
        debug!(entry_id = %id, actor = %author.actor, "entry created");
        Ok(id)
    }

    async fn update(
        &mut self,
        author: &Author,
        id: &EntryId,
        draft: &EntryDraft,
    ) -> Result<(), WriteError> {
        let content = draft.normalize()?;
        self.policy.check(author)?;

        let now = self.clock.now();
        let mut changes = Map::new();
        changes.insert(fields::TEXT.into(), Value::from(content.text));
        changes.insert(fields::TEXT_LOWER.into(), Value::from(content.text_lower));
        changes.insert(fields::MEANING.into(), Value::from(content.meaning));
        // Null clears a previously stored example.
        changes.insert(
            fields::EXAMPLE.into(),
            content.example.map_or(Value::Null, Value::from),
        );
        changes.insert(fields::UPDATED_AT.into(), Value::from(now));
        changes.insert(fields::LAST_MODIFIED_BY.into(), Value::from(author.actor.as_str()));
        changes.insert(
            fields::LAST_MODIFIED_BY_DISPLAY_NAME.into(),
            Value::from(author.display_name.as_str()),
        );

        self.store
            .update(&self.collection, id.as_str(), changes)
            .await
            .map_err(|e| entry_error(id, e))?;
        debug!(entry_id = %id, actor = %author.actor, "entry updated");
        Ok(())
    }

    async fn toggle_favorite(
        &mut self,
        author: &Author,
        id: &EntryId,
        current: bool,
    ) -> Result<bool, WriteError> {
        self.policy.check(author)?;

        let favorite = !current;
        let mut changes = Map::new();
        changes.insert(fields::IS_FAVORITE.into(), Value::from(favorite));
        changes.insert(fields::UPDATED_AT.into(), Value::from(self.clock.now()));

        self.store
            .update(&self.collection, id.as_str(), changes)
            .await
            .map_err(|e| entry_error(id, e))?;
        debug!(entry_id = %id, favorite, "favorite toggled");
        Ok(favorite)
    }

    async fn delete(&mut self, author: &Author, id: &EntryId) -> Result<(), WriteError> {
        self.policy.check(author)?;
        self.store
            .remove(&self.collection, id.as_str())
            .await
            .map_err(|e| entry_error(id, e))?;
        debug!(entry_id = %id, "entry deleted");
        Ok(())
    }
}

// ============================================================================
// Spawn
// ============================================================================

/// Spawn the write actor on the current runtime.
///
/// The actor exits once every [`WriteHandle`] clone is dropped.
pub fn spawn_writer(store: SharedStore, collection: impl Into<String>, policy: WritePolicy) -> WriteHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = WriteActor {
        store,
        collection: collection.into(),
        policy,
        clock: MonotonicClock::default(),
    };
    tokio::spawn(actor.run(rx));
    WriteHandle { tx }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wordbook_store::{CollectionStore, MemoryStore};
    use wordbook_types::{Account, AccountId, ValidationError};

    const OPEN: WritePolicy = WritePolicy {
        allow_anonymous: false,
        require_verified: false,
    };

    fn ana() -> Author {
        Author::from_account(&Account::new(AccountId::new("ana"), "Ana", "ana@x.io", false, 0))
    }

    fn beto() -> Author {
        Author::from_account(&Account::new(AccountId::new("beto"), "Beto", "beto@x.io", false, 0))
    }

    fn setup(policy: WritePolicy) -> (Arc<MemoryStore>, WriteHandle) {
        let store = Arc::new(MemoryStore::connected());
        let writer = spawn_writer(store.clone(), "words", policy);
        (store, writer)
    }

    async fn read(store: &MemoryStore, id: &EntryId) -> Option<Entry> {
        store
            .get("words", id.as_str())
            .await
            .unwrap()
            .map(|v| Entry::from_value(id.clone(), v).unwrap())
    }

    #[tokio::test]
    async fn test_create_round_trip() {
        let (store, writer) = setup(OPEN);
        let id = writer
            .create(ana(), EntryDraft::new("  Efímero ", " que dura poco ", Some("  ")))
            .await
            .unwrap();

        let entry = read(&store, &id).await.unwrap();
        assert_eq!(entry.text, "Efímero");
        assert_eq!(entry.text_lower.as_deref(), Some("efímero"));
        assert_eq!(entry.meaning, "que dura poco");
        assert_eq!(entry.example, None);
        assert!(!entry.is_favorite);
        assert_eq!(entry.created_at, entry.updated_at);
        assert_eq!(entry.created_by.as_deref(), Some("ana"));
        assert_eq!(entry.created_by_display_name.as_deref(), Some("Ana"));
        assert_eq!(entry.last_modified_by.as_deref(), Some("ana"));

        // Absent example is not stored at all.
        let raw = store.get("words", id.as_str()).await.unwrap().unwrap();
        assert!(raw.get("example").is_none());
    }

    #[tokio::test]
    async fn test_create_validation_never_reaches_store() {
        let (store, writer) = setup(OPEN);
        let err = writer
            .create(ana(), EntryDraft::new("   ", "m", None::<String>))
            .await
            .unwrap_err();
        assert_eq!(err, WriteError::Validation(ValidationError::EmptyField("text")));
        assert_eq!(store.child_count("words"), 0);
    }

    #[tokio::test]
    async fn test_update_preserves_creation_fields() {
        let (store, writer) = setup(OPEN);
        let id = writer
            .create(ana(), EntryDraft::new("sol", "estrella", Some("ejemplo")))
            .await
            .unwrap();
        let before = read(&store, &id).await.unwrap();

        writer
            .update(beto(), id.clone(), EntryDraft::new("Sol", "astro rey", None::<String>))
            .await
            .unwrap();
        let after = read(&store, &id).await.unwrap();

        assert_eq!(after.text, "Sol");
        assert_eq!(after.text_lower.as_deref(), Some("sol"));
        assert_eq!(after.meaning, "astro rey");
        assert_eq!(after.example, None);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.created_by.as_deref(), Some("ana"));
        assert_eq!(after.created_by_display_name.as_deref(), Some("Ana"));
        assert_eq!(after.last_modified_by.as_deref(), Some("beto"));
        assert_eq!(after.last_modified_by_display_name.as_deref(), Some("Beto"));
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (store, writer) = setup(OPEN);
        let id = EntryId::new("ghost");
        let err = writer
            .update(ana(), id.clone(), EntryDraft::new("a", "b", None::<String>))
            .await
            .unwrap_err();
        assert_eq!(err, WriteError::NotFound(id));
        assert_eq!(store.child_count("words"), 0);
    }

    #[tokio::test]
    async fn test_toggle_favorite_leaves_authorship() {
        let (store, writer) = setup(OPEN);
        let id = writer
            .create(ana(), EntryDraft::new("luna", "satélite", None::<String>))
            .await
            .unwrap();

        assert!(writer.toggle_favorite(beto(), id.clone(), false).await.unwrap());
        let entry = read(&store, &id).await.unwrap();
        assert!(entry.is_favorite);
        assert_eq!(entry.last_modified_by.as_deref(), Some("ana"));
        assert_eq!(entry.created_by.as_deref(), Some("ana"));

        assert!(!writer.toggle_favorite(ana(), id.clone(), true).await.unwrap());
        assert!(!read(&store, &id).await.unwrap().is_favorite);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, writer) = setup(OPEN);
        let id = writer
            .create(ana(), EntryDraft::new("a", "b", None::<String>))
            .await
            .unwrap();
        writer.delete(ana(), id.clone()).await.unwrap();
        writer.delete(ana(), id.clone()).await.unwrap();
        assert!(read(&store, &id).await.is_none());
    }

    #[tokio::test]
    async fn test_anonymous_policy() {
        let anon = Author::anonymous("temp-abc");
        let (_store, writer) = setup(OPEN);
        assert_eq!(
            writer
                .create(anon.clone(), EntryDraft::new("a", "b", None::<String>))
                .await,
            Err(WriteError::AnonymousWriteDenied)
        );

        let (store, writer) = setup(WritePolicy {
            allow_anonymous: true,
            require_verified: false,
        });
        let id = writer
            .create(anon, EntryDraft::new("a", "b", None::<String>))
            .await
            .unwrap();
        let entry = read(&store, &id).await.unwrap();
        assert_eq!(entry.created_by.as_deref(), Some("temp-abc"));
    }

    #[tokio::test]
    async fn test_require_verified_policy() {
        let policy = WritePolicy {
            allow_anonymous: false,
            require_verified: true,
        };
        let (_store, writer) = setup(policy);
        assert_eq!(
            writer.delete(ana(), EntryId::new("k")).await,
            Err(WriteError::UnverifiedWriter)
        );

        let mut verified = ana();
        verified.verified = true;
        assert!(writer.delete(verified, EntryId::new("k")).await.is_ok());
    }

    #[tokio::test]
    async fn test_remote_failure_is_surfaced() {
        let (store, writer) = setup(OPEN);
        store.deny_writes("words", true);
        let err = writer
            .create(ana(), EntryDraft::new("a", "b", None::<String>))
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::Remote(StoreError::PermissionDenied(_))));

        store.deny_writes("words", false);
        store.set_offline(true);
        let err = writer.delete(ana(), EntryId::new("k")).await.unwrap_err();
        assert!(matches!(err, WriteError::Remote(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_monotonic_clock() {
        let mut clock = MonotonicClock { last: u64::MAX - 1 };
        assert_eq!(clock.now(), u64::MAX - 1);
        let mut clock = MonotonicClock::default();
        let a = clock.now();
        assert!(clock.now() >= a);
    }
}
