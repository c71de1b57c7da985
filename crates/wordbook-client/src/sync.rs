//! Live collection sync.
//!
//! The [`SyncEngine`] owns the local entry cache. It opens two subscriptions
//! against the collection store for one query:
//!
//! - **value**: every event carries the complete current child set; the
//!   cache is replaced wholesale, sorted, and published on a `watch` channel
//! - **child added**: one event per new key; never touches the cache, only
//!   feeds [`InsertionEvent`]s to the notification dispatcher
//!
//! # State Machine
//!
//! ```text
//! Uninitialized ──subscribe()──▶ Loading ──first snapshot──▶ Live
//!                                   │                          │
//!                       open failed │          subscribe() with│a new query
//!                                   ▼                          ▼
//!                                 Failed                    Loading
//!
//!              unsubscribe() from any state ──▶ Unsubscribed
//! ```
//!
//! # Liveness
//!
//! Each `subscribe()` starts a new generation. Pump tasks emit only while
//! holding the generation lock and only if their generation is still the
//! current one, so nothing is emitted once `unsubscribe()` has returned,
//! even for events already queued in the subscription channel.
//!
//! # Errors
//!
//! A failure to open either subscription is returned from `subscribe()`.
//! In-band store errors afterwards go out on the error channel as
//! [`SyncFailure`]s; the subscription stays open and the next successful
//! snapshot brings the engine back.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use wordbook_store::{
    Child, ChildEvent, Query, SharedStore, StoreError, Subscription, ValueEvent,
};
use wordbook_types::{Entry, EntryId, entry_fields};

use crate::collate::CollationKey;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::error::SyncError;

/// Sorted, immutable snapshot of the cache.
pub type EntryList = Arc<Vec<Entry>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SyncState {
    Uninitialized,
    Loading,
    Live,
    /// Opening the subscription failed; call `subscribe()` again to retry.
    Failed,
    Unsubscribed,
}

/// A child that appeared in the collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertionEvent {
    pub id: EntryId,
    /// The entry's `text`, empty if the child has none.
    pub headword: String,
    /// Stored `createdBy`, if any.
    pub created_by: Option<String>,
    pub generation: u64,
    pub subscribed_at: Instant,
    pub observed_at: Instant,
}

impl InsertionEvent {
    fn from_child(child: Child, generation: u64, subscribed_at: Instant) -> Self {
        let text_field = |name: &str| {
            child
                .value
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            headword: text_field(entry_fields::TEXT).unwrap_or_default(),
            created_by: text_field(entry_fields::CREATED_BY),
            id: EntryId::new(child.key),
            generation,
            subscribed_at,
            observed_at: Instant::now(),
        }
    }

    /// How long after the subscription opened this insertion was observed.
    pub fn since_subscribe(&self) -> Duration {
        self.observed_at.saturating_duration_since(self.subscribed_at)
    }
}

/// Which subscription reported a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureSource {
    Snapshot,
    Insertions,
}

/// An in-band store error on a live subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncFailure {
    pub generation: u64,
    pub source: FailureSource,
    pub error: StoreError,
}

/// Receivers handed back by [`SyncEngine::subscribe`].
pub struct SyncStreams {
    pub snapshots: watch::Receiver<EntryList>,
    pub insertions: broadcast::Receiver<InsertionEvent>,
}

// ============================================================================
// Snapshot decoding and ordering
// ============================================================================

/// Decode stored children into entries.
///
/// Wrong-typed fields fall back to their defaults; only a child that is not
/// an object is skipped (and logged).
pub fn decode_entries(children: Vec<(String, Value)>) -> Vec<Entry> {
    children
        .into_iter()
        .filter_map(|(key, value)| match Entry::from_value(EntryId::new(key.clone()), value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(entry_id = %key, error = %e, "skipping malformed entry");
                None
            }
        })
        .collect()
}

/// Favorites first, then collation order of `textLower` (or lowercased
/// `text`). Equal keys keep their input order.
pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by_cached_key(|e| (!e.is_favorite, CollationKey::new(&e.sort_key())));
}

// ============================================================================
// Engine
// ============================================================================

/// Everything the pump tasks publish to, guarded by the generation lock.
struct Outputs {
    generation: Mutex<u64>,
    snapshot_tx: watch::Sender<EntryList>,
    insert_tx: broadcast::Sender<InsertionEvent>,
    error_tx: broadcast::Sender<SyncFailure>,
    state_tx: watch::Sender<SyncState>,
}

impl Outputs {
    /// Run `f` only if `generation` is still current. Holds the lock for the
    /// duration, so teardown waits for an in-progress emission.
    fn with_live<R>(&self, generation: u64, f: impl FnOnce(&Self) -> R) -> Option<R> {
        let current = self.generation.lock();
        if *current != generation {
            return None;
        }
        Some(f(self))
    }

    fn report(&self, generation: u64, source: FailureSource, error: StoreError) -> bool {
        warn!(generation, %source, error = %error, "subscription error");
        self.with_live(generation, |o| {
            // No receivers is fine; errors are advisory.
            let _ = o.error_tx.send(SyncFailure {
                generation,
                source,
                error,
            });
        })
        .is_some()
    }
}

/// Keeps a local, sorted cache of one collection in sync with the store.
pub struct SyncEngine {
    store: SharedStore,
    outputs: Arc<Outputs>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(store: SharedStore) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Vec::new()));
        let (state_tx, _) = watch::channel(SyncState::Uninitialized);
        let (insert_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (error_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            outputs: Arc::new(Outputs {
                generation: Mutex::new(0),
                snapshot_tx,
                insert_tx,
                error_tx,
                state_tx,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    // ── Observers ───────────────────────────────────────────────────────

    pub fn state(&self) -> SyncState {
        *self.outputs.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.outputs.state_tx.subscribe()
    }

    /// The current sorted cache.
    pub fn current(&self) -> EntryList {
        self.outputs.snapshot_tx.borrow().clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<EntryList> {
        self.outputs.snapshot_tx.subscribe()
    }

    /// A new receiver of insertion events. Only events sent after this call
    /// are seen, so subscribe before calling [`subscribe`](Self::subscribe)
    /// to observe the initial replay.
    pub fn insertions(&self) -> broadcast::Receiver<InsertionEvent> {
        self.outputs.insert_tx.subscribe()
    }

    pub fn errors(&self) -> broadcast::Receiver<SyncFailure> {
        self.outputs.error_tx.subscribe()
    }

    /// Generation of the most recent `subscribe()` (0 before the first).
    pub fn generation(&self) -> u64 {
        *self.outputs.generation.lock()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Subscribe to `collection` ordered by `order_key`.
    ///
    /// Replaces any active subscription. Must be called within a tokio
    /// runtime.
    pub fn subscribe(&self, collection: &str, order_key: &str) -> Result<SyncStreams, SyncError> {
        let mut tasks = self.tasks.lock();
        let generation = self.advance_generation(&mut tasks);
        self.outputs.state_tx.send_replace(SyncState::Loading);

        let query = Query::collection(collection).order_by_child(order_key);
        let values = self
            .store
            .subscribe_value(query.clone())
            .map_err(|e| self.open_failed(collection, e))?;
        let children = match self.store.subscribe_child_added(query) {
            Ok(children) => children,
            Err(e) => {
                drop(values);
                return Err(self.open_failed(collection, e));
            }
        };

        let streams = SyncStreams {
            snapshots: self.outputs.snapshot_tx.subscribe(),
            insertions: self.outputs.insert_tx.subscribe(),
        };
        let subscribed_at = Instant::now();
        tasks.push(tokio::spawn(pump_snapshots(
            self.outputs.clone(),
            generation,
            values,
        )));
        tasks.push(tokio::spawn(pump_insertions(
            self.outputs.clone(),
            generation,
            subscribed_at,
            children,
        )));

        info!(collection, order_key, generation, "sync subscribed");
        Ok(streams)
    }

    /// Release both subscriptions. Idempotent.
    ///
    /// Once this returns, no snapshot, insertion or error from the old
    /// subscription is emitted.
    pub fn unsubscribe(&self) {
        let mut tasks = self.tasks.lock();
        let had_tasks = !tasks.is_empty();
        let generation = self.advance_generation(&mut tasks);
        self.outputs.state_tx.send_replace(SyncState::Unsubscribed);
        if had_tasks {
            info!(generation, "sync unsubscribed");
        }
    }

    /// Invalidate the running generation and stop its tasks.
    fn advance_generation(&self, tasks: &mut Vec<JoinHandle<()>>) -> u64 {
        let generation = {
            let mut current = self.outputs.generation.lock();
            *current += 1;
            *current
        };
        for task in tasks.drain(..) {
            task.abort();
        }
        generation
    }

    fn open_failed(&self, collection: &str, error: StoreError) -> SyncError {
        warn!(collection, error = %error, "sync subscribe failed");
        self.outputs.state_tx.send_replace(SyncState::Failed);
        SyncError::Subscribe(error)
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

async fn pump_snapshots(
    outputs: Arc<Outputs>,
    generation: u64,
    mut values: Subscription<ValueEvent>,
) {
    while let Some(event) = values.next().await {
        let live = match event {
            Ok(snapshot) => {
                let mut entries = decode_entries(snapshot.children);
                sort_entries(&mut entries);
                let count = entries.len();
                let live = outputs
                    .with_live(generation, |o| {
                        o.snapshot_tx.send_replace(Arc::new(entries));
                        o.state_tx.send_if_modified(|state| {
                            let changed = *state != SyncState::Live;
                            *state = SyncState::Live;
                            changed
                        });
                    })
                    .is_some();
                trace!(generation, count, "snapshot applied");
                live
            }
            Err(error) => outputs.report(generation, FailureSource::Snapshot, error),
        };
        if !live {
            break;
        }
    }
    debug!(generation, "snapshot pump finished");
}

async fn pump_insertions(
    outputs: Arc<Outputs>,
    generation: u64,
    subscribed_at: Instant,
    mut children: Subscription<ChildEvent>,
) {
    while let Some(event) = children.next().await {
        let live = match event {
            Ok(child) => {
                let event = InsertionEvent::from_child(child, generation, subscribed_at);
                trace!(generation, entry_id = %event.id, "insertion observed");
                outputs
                    .with_live(generation, |o| {
                        let _ = o.insert_tx.send(event);
                    })
                    .is_some()
            }
            Err(error) => outputs.report(generation, FailureSource::Insertions, error),
        };
        if !live {
            break;
        }
    }
    debug!(generation, "insertion pump finished");
}

// ============================================================================
// Tests
// ============================================================================
