//! In-memory collection store.
//!
//! Used for tests, the demo binary, and anywhere a hosted database is not
//! wanted. All data is ephemeral.
//!
//! Deliveries happen while the write lock is held, so every subscriber sees
//! mutations in exactly the order the store accepted them. Fault injection
//! (`set_offline`, `deny_reads`, `deny_writes`, `emit_error`) lets tests
//! exercise the error paths of the sync engine and write actor.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::channel::mpsc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};
use crate::query::Query;
use crate::store::{Child, ChildEvent, CollectionStore, Snapshot, Subscription, ValueEvent};

/// A registered subscriber.
struct Listener<T> {
    id: u64,
    query: Query,
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Listener<T> {
    /// Deliver `item`. `false` means the subscriber is gone.
    fn send(&self, item: T) -> bool {
        let delivered = self.tx.unbounded_send(item).is_ok();
        if !delivered {
            trace!(id = self.id, collection = %self.query.collection, "pruning closed listener");
        }
        delivered
    }

    fn is_live(&self) -> bool {
        if self.tx.is_closed() {
            trace!(id = self.id, collection = %self.query.collection, "pruning closed listener");
            return false;
        }
        true
    }
}

#[derive(Default)]
struct Inner {
    connected: bool,
    offline: bool,
    collections: HashMap<String, BTreeMap<String, Value>>,
    value_listeners: Vec<Listener<ValueEvent>>,
    child_listeners: Vec<Listener<ChildEvent>>,
    read_denied: HashSet<String>,
    write_denied: HashSet<String>,
}

impl Inner {
    fn check_connected(&self) -> StoreResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }

    fn check_online(&self) -> StoreResult<()> {
        self.check_connected()?;
        if self.offline {
            return Err(StoreError::unavailable("client is offline"));
        }
        Ok(())
    }

    fn check_readable(&self, collection: &str) -> StoreResult<()> {
        if self.read_denied.contains(collection) {
            return Err(StoreError::permission_denied(collection));
        }
        Ok(())
    }

    fn check_writable(&self, collection: &str, key: &str) -> StoreResult<()> {
        self.check_online()?;
        if self.write_denied.contains(collection) {
            return Err(StoreError::permission_denied(format!("{collection}/{key}")));
        }
        Ok(())
    }

    fn snapshot(&self, query: &Query) -> Snapshot {
        let children = match self.collections.get(&query.collection) {
            Some(map) => query.apply(map.iter()),
            None => Vec::new(),
        };
        Snapshot { children }
    }

    /// Deliver the current value of `collection` to its value listeners.
    fn broadcast_value(&mut self, collection: &str) {
        if self.read_denied.contains(collection) {
            return;
        }
        let children = self.collections.get(collection);
        self.value_listeners.retain(|l| {
            if l.query.collection != collection {
                return l.is_live();
            }
            let children = match children {
                Some(map) => l.query.apply(map.iter()),
                None => Vec::new(),
            };
            l.send(Ok(Snapshot { children }))
        });
    }

    /// Deliver a newly created child to matching child-added listeners.
    fn broadcast_child_added(&mut self, collection: &str, key: &str, value: &Value) {
        if self.read_denied.contains(collection) {
            return;
        }
        self.child_listeners.retain(|l| {
            if l.query.collection != collection || !l.query.matches(key, value) {
                return l.is_live();
            }
            l.send(Ok(Child {
                key: key.to_string(),
                value: value.clone(),
            }))
        });
    }

    fn broadcast_error(&mut self, collection: &str, err: &StoreError) {
        self.value_listeners.retain(|l| {
            if l.query.collection != collection {
                return l.is_live();
            }
            l.send(Err(err.clone()))
        });
        self.child_listeners.retain(|l| {
            if l.query.collection != collection {
                return l.is_live();
            }
            l.send(Err(err.clone()))
        });
    }
}

/// In-memory collection store.
///
/// Thread-safe via internal `RwLock`. All data is lost when dropped.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    next_listener: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, disconnected store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Create an empty store that is already connected.
    pub fn connected() -> Self {
        let store = Self::new();
        store.inner.write().connected = true;
        store
    }

    fn next_id(&self) -> u64 {
        self.next_listener.fetch_add(1, Ordering::Relaxed)
    }

    // ========================================================================
    // Fault injection
    // ========================================================================

    /// Simulate losing (or regaining) the transport. Reads and writes fail
    /// with `Unavailable` while offline; open subscriptions stay open.
    pub fn set_offline(&self, offline: bool) {
        debug!(offline, "MemoryStore transport state changed");
        self.inner.write().offline = offline;
    }

    /// Deny (or allow) reads of a collection.
    ///
    /// Denying pushes `PermissionDenied` to every open subscription on the
    /// collection. Allowing again re-delivers the current value to open
    /// value subscriptions, the way a reconnecting client would.
    pub fn deny_reads(&self, collection: &str, denied: bool) {
        let mut inner = self.inner.write();
        if denied {
            inner.read_denied.insert(collection.to_string());
            let err = StoreError::permission_denied(collection);
            inner.broadcast_error(collection, &err);
        } else if inner.read_denied.remove(collection) {
            inner.broadcast_value(collection);
        }
    }

    /// Deny (or allow) writes to a collection.
    pub fn deny_writes(&self, collection: &str, denied: bool) {
        let mut inner = self.inner.write();
        if denied {
            inner.write_denied.insert(collection.to_string());
        } else {
            inner.write_denied.remove(collection);
        }
    }

    /// Push an in-band error to every open subscription on a collection.
    pub fn emit_error(&self, collection: &str, err: StoreError) {
        self.inner.write().broadcast_error(collection, &err);
    }

    /// Number of live subscriptions (closed ones are pruned first).
    pub fn listener_count(&self) -> usize {
        let mut inner = self.inner.write();
        inner.value_listeners.retain(|l| l.is_live());
        inner.child_listeners.retain(|l| l.is_live());
        inner.value_listeners.len() + inner.child_listeners.len()
    }

    /// Number of children currently stored in a collection.
    pub fn child_count(&self, collection: &str) -> usize {
        self.inner
            .read()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn connect(&self) -> StoreResult<()> {
        self.inner.write().connected = true;
        Ok(())
    }

    async fn dispose(&self) {
        let mut inner = self.inner.write();
        inner.connected = false;
        // Dropping the senders ends every subscription stream.
        inner.value_listeners.clear();
        inner.child_listeners.clear();
        debug!("MemoryStore disposed");
    }

    fn is_connected(&self) -> bool {
        self.inner.read().connected
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>> {
        let inner = self.inner.read();
        inner.check_online()?;
        inner.check_readable(collection)?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned())
    }

    async fn list(&self, query: &Query) -> StoreResult<Vec<(String, Value)>> {
        let inner = self.inner.read();
        inner.check_online()?;
        inner.check_readable(&query.collection)?;
        Ok(inner.snapshot(query).children)
    }

    fn allocate_key(&self, _collection: &str) -> String {
        wordbook_types::generate_key()
    }

    async fn set(&self, collection: &str, key: &str, value: Value) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.check_writable(collection, key)?;

        let created = inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value.clone())
            .is_none();
        trace!(collection, key, created, "set");

        if created {
            inner.broadcast_child_added(collection, key, &value);
        }
        inner.broadcast_value(collection);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.check_writable(collection, key)?;

        let child = inner
            .collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(key))
            .ok_or_else(|| StoreError::not_found(format!("{collection}/{key}")))?;

        if !child.is_object() {
            *child = Value::Object(Map::new());
        }
        if let Value::Object(obj) = child {
            for (field, value) in fields {
                if value.is_null() {
                    obj.remove(&field);
                } else {
                    obj.insert(field, value);
                }
            }
        }
        trace!(collection, key, "update");

        inner.broadcast_value(collection);
        Ok(())
    }

    async fn remove(&self, collection: &str, key: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.check_writable(collection, key)?;

        let removed = inner
            .collections
            .get_mut(collection)
            .and_then(|c| c.remove(key))
            .is_some();
        trace!(collection, key, removed, "remove");

        if removed {
            inner.broadcast_value(collection);
        }
        Ok(())
    }

    fn subscribe_value(&self, query: Query) -> StoreResult<Subscription<ValueEvent>> {
        let id = self.next_id();
        let mut inner = self.inner.write();
        inner.check_connected()?;

        let (tx, rx) = mpsc::unbounded();
        let initial = match inner.check_readable(&query.collection) {
            Ok(()) => Ok(inner.snapshot(&query)),
            Err(e) => Err(e),
        };
        let _ = tx.unbounded_send(initial);

        debug!(id, collection = %query.collection, "value subscription opened");
        inner.value_listeners.push(Listener { id, query, tx });
        Ok(Subscription::new(id, rx))
    }

    fn subscribe_child_added(&self, query: Query) -> StoreResult<Subscription<ChildEvent>> {
        let id = self.next_id();
        let mut inner = self.inner.write();
        inner.check_connected()?;

        let (tx, rx) = mpsc::unbounded();
        match inner.check_readable(&query.collection) {
            Ok(()) => {
                for (key, value) in inner.snapshot(&query).children {
                    let _ = tx.unbounded_send(Ok(Child { key, value }));
                }
            }
            Err(e) => {
                let _ = tx.unbounded_send(Err(e));
            }
        }

        debug!(id, collection = %query.collection, "child-added subscription opened");
        inner.child_listeners.push(Listener { id, query, tx });
        Ok(Subscription::new(id, rx))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn test_requires_connect() {
        let store = MemoryStore::new();
        let err = store.set("words", "k", json!({})).await.unwrap_err();
        assert_eq!(err, StoreError::NotConnected);
        assert!(store.subscribe_value(Query::collection("words")).is_err());

        store.connect().await.unwrap();
        store.set("words", "k", json!({})).await.unwrap();
        assert!(store.is_connected());
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::connected();
        store.set("words", "k1", json!({"text": "sol"})).await.unwrap();
        assert_eq!(
            store.get("words", "k1").await.unwrap(),
            Some(json!({"text": "sol"}))
        );

        store.remove("words", "k1").await.unwrap();
        assert_eq!(store.get("words", "k1").await.unwrap(), None);
        // Idempotent
        store.remove("words", "k1").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_merges_and_removes_null_fields() {
        let store = MemoryStore::connected();
        store
            .set("words", "k", json!({"text": "a", "example": "x"}))
            .await
            .unwrap();
        store
            .update("words", "k", fields(json!({"text": "b", "example": null})))
            .await
            .unwrap();
        assert_eq!(store.get("words", "k").await.unwrap(), Some(json!({"text": "b"})));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryStore::connected();
        let err = store
            .update("words", "nope", fields(json!({"text": "b"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.child_count("words"), 0);
    }

    #[tokio::test]
    async fn test_value_subscription_delivers_full_snapshots() {
        let store = MemoryStore::connected();
        store.set("words", "k1", json!({"n": 1})).await.unwrap();

        let mut sub = store.subscribe_value(Query::collection("words")).unwrap();
        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);

        store.set("words", "k2", json!({"n": 2})).await.unwrap();
        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);

        store.update("words", "k1", fields(json!({"n": 3}))).await.unwrap();
        let third = sub.next().await.unwrap().unwrap();
        assert_eq!(third.children[0].1, json!({"n": 3}));

        store.remove("words", "k2").await.unwrap();
        let fourth = sub.next().await.unwrap().unwrap();
        assert_eq!(fourth.len(), 1);
    }

    #[tokio::test]
    async fn test_child_added_replays_then_only_inserts() {
        let store = MemoryStore::connected();
        store.set("words", "k1", json!({"n": 1})).await.unwrap();

        let mut sub = store.subscribe_child_added(Query::collection("words")).unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap().key, "k1");

        store.update("words", "k1", fields(json!({"n": 2}))).await.unwrap();
        store.set("words", "k1", json!({"n": 5})).await.unwrap();
        store.remove("words", "k1").await.unwrap();
        store.set("words", "k2", json!({"n": 3})).await.unwrap();

        let next = sub.next().await.unwrap().unwrap();
        assert_eq!(next.key, "k2");
    }

    #[tokio::test]
    async fn test_other_collections_do_not_notify() {
        let store = MemoryStore::connected();
        let mut sub = store.subscribe_value(Query::collection("words")).unwrap();
        let _ = sub.next().await;

        store.set("users", "u1", json!({})).await.unwrap();
        store.set("words", "k1", json!({})).await.unwrap();
        let snap = sub.next().await.unwrap().unwrap();
        assert_eq!(snap.children[0].0, "k1");
    }

    #[tokio::test]
    async fn test_read_denial_and_recovery() {
        let store = MemoryStore::connected();
        store.set("words", "k1", json!({})).await.unwrap();
        store.deny_reads("words", true);

        let mut sub = store.subscribe_value(Query::collection("words")).unwrap();
        assert!(matches!(
            sub.next().await.unwrap(),
            Err(StoreError::PermissionDenied(_))
        ));

        store.deny_reads("words", false);
        let snap = sub.next().await.unwrap().unwrap();
        assert_eq!(snap.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_and_write_denial() {
        let store = MemoryStore::connected();
        store.set_offline(true);
        assert!(store.set("words", "k", json!({})).await.unwrap_err().is_transient());
        store.set_offline(false);

        store.deny_writes("words", true);
        assert!(matches!(
            store.remove("words", "k").await,
            Err(StoreError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let store = MemoryStore::connected();
        let sub = store.subscribe_value(Query::collection("words")).unwrap();
        assert_eq!(store.listener_count(), 1);
        drop(sub);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_listeners_pruned_on_delivery() {
        let store = MemoryStore::connected();
        let value = store.subscribe_value(Query::collection("words")).unwrap();
        let child = store.subscribe_child_added(Query::collection("words")).unwrap();
        let _other = store.subscribe_value(Query::collection("users")).unwrap();
        drop(value);
        drop(child);

        store.set("words", "k1", json!({"text": "a"})).await.unwrap();
        store.set("users", "u1", json!({"email": "a@b.co"})).await.unwrap();
        assert_eq!(store.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_dispose_ends_streams() {
        let store = MemoryStore::connected();
        let mut sub = store.subscribe_child_added(Query::collection("words")).unwrap();
        store.dispose().await;
        assert!(sub.next().await.is_none());
        assert!(!store.is_connected());
    }

    #[tokio::test]
    async fn test_ordered_range_subscription() {
        let store = MemoryStore::connected();
        store.set("words", "k1", json!({"textLower": "sol"})).await.unwrap();
        store.set("words", "k2", json!({"textLower": "efímero"})).await.unwrap();
        store.set("words", "k3", json!({"textLower": "eco"})).await.unwrap();

        let query = Query::collection("words").order_by_child("textLower").prefix("e");
        let mut sub = store.subscribe_value(query).unwrap();
        let snap = sub.next().await.unwrap().unwrap();
        let keys: Vec<&str> = snap.children.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["k3", "k2"]);
    }
}
