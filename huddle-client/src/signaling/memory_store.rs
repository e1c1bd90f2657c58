use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::signaling::shared_store::{DisconnectOp, SharedStore, SubscriptionId, WatchCallback};

struct Watcher {
    session: u64,
    path: Vec<String>,
    callback: WatchCallback,
    last: Option<Value>,
}

struct StoreInner {
    tree: Mutex<Value>,
    watchers: DashMap<SubscriptionId, Watcher>,
    hooks: DashMap<u64, Vec<(Vec<String>, DisconnectOp)>>,
    available: AtomicBool,
    next_id: AtomicU64,
}

/// In-process shared store with realtime-database semantics: a JSON tree with
/// empty nodes pruned, snapshot watches, and per-connection disconnect hooks.
///
/// Every participant talks to it through its own [`MemorySession`], which plays
/// the role of one client connection.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tree: Mutex::new(Value::Null),
                watchers: DashMap::new(),
                hooks: DashMap::new(),
                available: AtomicBool::new(true),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Open a new client connection.
    pub fn session(&self) -> MemorySession {
        MemorySession {
            store: self.clone(),
            id: self.next_id(),
            connected: AtomicBool::new(true),
        }
    }

    /// Simulate the backend becoming unreachable (or reachable again) for every session.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Current value at `path`, `Null` when absent.
    pub fn read(&self, path: &str) -> Result<Value, StoreError> {
        let segs = segments(path)?;
        let tree = self.lock_tree();
        Ok(lookup(&tree, &segs).cloned().unwrap_or(Value::Null))
    }

    /// Re-deliver the current snapshot to every watcher, as a client does after
    /// reconnecting.
    pub fn replay(&self) {
        let tree = self.lock_tree();
        self.notify(&tree, true);
    }

    pub fn watch_count(&self) -> usize {
        self.inner.watchers.len()
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn lock_tree(&self) -> MutexGuard<'_, Value> {
        self.inner
            .tree
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate(&self, f: impl FnOnce(&mut Value)) {
        let mut tree = self.lock_tree();
        f(&mut tree);
        self.notify(&tree, false);
    }

    /// Callbacks run while the tree lock is held, which keeps deliveries for a
    /// path in mutation order.
    fn notify(&self, tree: &Value, force: bool) {
        let mut deliveries = Vec::new();
        for mut watcher in self.inner.watchers.iter_mut() {
            let snapshot = lookup(tree, &watcher.path).cloned().unwrap_or(Value::Null);
            if force || watcher.last.as_ref() != Some(&snapshot) {
                watcher.last = Some(snapshot.clone());
                deliveries.push((watcher.callback.clone(), snapshot));
            }
        }
        for (callback, snapshot) in deliveries {
            callback(snapshot);
        }
    }

    fn session_watch_count(&self, session: u64) -> usize {
        self.inner
            .watchers
            .iter()
            .filter(|w| w.session == session)
            .count()
    }
}

/// One client connection to a [`MemoryStore`].
pub struct MemorySession {
    store: MemoryStore,
    id: u64,
    connected: AtomicBool,
}

impl MemorySession {
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of live watches opened through this connection.
    pub fn watch_count(&self) -> usize {
        self.store.session_watch_count(self.id)
    }

    /// Drop the connection: cancel its watches and run its disconnect hooks.
    pub fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        let session = self.id;
        self.store.inner.watchers.retain(|_, w| w.session != session);

        let hooks = self
            .store
            .inner
            .hooks
            .remove(&session)
            .map(|(_, hooks)| hooks)
            .unwrap_or_default();
        debug!(session, hooks = hooks.len(), "memory session disconnected");

        self.store.mutate(|tree| {
            for (segs, op) in hooks {
                match op {
                    DisconnectOp::Delete => put(tree, &segs, Value::Null),
                    DisconnectOp::Update(fields) => merge(tree, &segs, fields),
                }
            }
        });
    }

    fn check(&self) -> Result<(), StoreError> {
        if !self.store.inner.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("backend unreachable".into()));
        }
        if !self.is_connected() {
            return Err(StoreError::Unavailable("session disconnected".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SharedStore for MemorySession {
    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check()?;
        let segs = segments(path)?;
        self.store.mutate(|tree| put(tree, &segs, value));
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.check()?;
        let segs = segments(path)?;
        self.store.mutate(|tree| merge(tree, &segs, fields));
        Ok(())
    }

    async fn append(&self, path: &str, value: Value) -> Result<String, StoreError> {
        self.check()?;
        let mut segs = segments(path)?;
        let salt = Uuid::new_v4().simple().to_string();
        let key = format!("{:012}-{}", self.store.next_id(), &salt[..8]);
        segs.push(key.clone());
        self.store.mutate(|tree| put(tree, &segs, value));
        Ok(key)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.check()?;
        let segs = segments(path)?;
        self.store.mutate(|tree| put(tree, &segs, Value::Null));
        Ok(())
    }

    async fn watch(&self, path: &str, callback: WatchCallback) -> Result<SubscriptionId, StoreError> {
        self.check()?;
        let segs = segments(path)?;
        let id = SubscriptionId(self.store.next_id());

        let tree = self.store.lock_tree();
        let snapshot = lookup(&tree, &segs).cloned().unwrap_or(Value::Null);
        self.store.inner.watchers.insert(
            id,
            Watcher {
                session: self.id,
                path: segs,
                callback: callback.clone(),
                last: Some(snapshot.clone()),
            },
        );
        callback(snapshot);
        Ok(id)
    }

    async fn unwatch(&self, id: SubscriptionId) -> Result<(), StoreError> {
        match self.store.inner.watchers.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownSubscription(id)),
        }
    }

    async fn on_disconnect(&self, path: &str, op: DisconnectOp) -> Result<(), StoreError> {
        self.check()?;
        let segs = segments(path)?;
        self.store
            .inner
            .hooks
            .entry(self.id)
            .or_default()
            .push((segs, op));
        Ok(())
    }
}

fn segments(path: &str) -> Result<Vec<String>, StoreError> {
    let segs: Vec<String> = path.split('/').map(str::to_owned).collect();
    if segs.iter().any(String::is_empty) {
        return Err(StoreError::InvalidPath(path.to_owned()));
    }
    Ok(segs)
}

fn lookup<'a>(node: &'a Value, segs: &[String]) -> Option<&'a Value> {
    segs.iter().try_fold(node, |node, seg| node.get(seg.as_str()))
}

fn is_empty(value: &Value) -> bool {
    value.is_null() || value.as_object().is_some_and(Map::is_empty)
}

/// Drop nulls and empty objects, the way the database never stores them.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

fn put(node: &mut Value, segs: &[String], value: Value) {
    let value = normalize(value);
    let Some((head, rest)) = segs.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        if value.is_null() {
            map.remove(head);
        } else {
            map.insert(head.clone(), value);
        }
        return;
    }
    let child = map.entry(head.clone()).or_insert(Value::Null);
    put(child, rest, value);
    if is_empty(child) {
        map.remove(head);
    }
}

fn merge(node: &mut Value, segs: &[String], fields: Map<String, Value>) {
    for (key, value) in fields {
        let mut path = segs.to_vec();
        path.push(key);
        put(node, &path, value);
    }
}
