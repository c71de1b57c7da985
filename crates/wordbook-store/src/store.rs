//! Collection store trait.
//!
//! This trait abstracts the hosted real-time database in a way that's
//! designed for injection: the sync engine and the write actor hold an
//! `Arc<dyn CollectionStore>` instead of reaching for a process-wide handle,
//! so tests swap in [`MemoryStore`](crate::MemoryStore).
//!
//! Paths are two-level: `collection/key`. Values are JSON documents.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use futures::channel::mpsc;
use serde_json::{Map, Value};

use crate::error::StoreResult;
use crate::query::Query;

/// Shared store handle.
pub type SharedStore = Arc<dyn CollectionStore>;

/// Full current value of a queried collection, in query order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub children: Vec<(String, Value)>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A single child, as delivered by a child-added subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct Child {
    pub key: String,
    pub value: Value,
}

/// Value-subscription item: the whole collection, or an in-band error.
pub type ValueEvent = StoreResult<Snapshot>;

/// Child-added-subscription item: one new child, or an in-band error.
pub type ChildEvent = StoreResult<Child>;

/// A live subscription. Dropping it unsubscribes.
///
/// The store keeps delivering until either side lets go; once the receiver
/// is dropped the store prunes the listener on its next delivery.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub fn new(id: u64, rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { id, rx }
    }

    /// Store-assigned listener id (for logging).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop delivery now; buffered items are discarded.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Keyed collection storage with real-time subscriptions.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the connection. Idempotent.
    async fn connect(&self) -> StoreResult<()>;

    /// Close the connection and every open subscription. Idempotent.
    async fn dispose(&self);

    fn is_connected(&self) -> bool;

    // ========================================================================
    // Reading
    // ========================================================================

    /// Read one child.
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>>;

    /// Read all children matching `query`, in query order.
    async fn list(&self, query: &Query) -> StoreResult<Vec<(String, Value)>>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Allocate a new, never-reused, time-ordered key. No round-trip.
    fn allocate_key(&self, collection: &str) -> String;

    /// Replace a child entirely (creating it if absent).
    async fn set(&self, collection: &str, key: &str, value: Value) -> StoreResult<()>;

    /// Merge the named fields into an existing child.
    ///
    /// A `null` field value removes that field. Fails with `NotFound` when
    /// the child does not exist. The store never creates on update.
    async fn update(&self, collection: &str, key: &str, fields: Map<String, Value>)
    -> StoreResult<()>;

    /// Remove a child. Removing an absent child succeeds.
    async fn remove(&self, collection: &str, key: &str) -> StoreResult<()>;

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Subscribe to the full value of a query.
    ///
    /// The first item is the current value; after that, one item carrying
    /// the complete current child set per mutation under the collection.
    fn subscribe_value(&self, query: Query) -> StoreResult<Subscription<ValueEvent>>;

    /// Subscribe to child insertions.
    ///
    /// Existing children are replayed once, in query order; after that, one
    /// item per newly created key. Updates and removals are never delivered.
    fn subscribe_child_added(&self, query: Query) -> StoreResult<Subscription<ChildEvent>>;
}
