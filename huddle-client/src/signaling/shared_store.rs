use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::StoreError;

/// Handle returned by [`SharedStore::watch`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Snapshot callback. Receives the full value at the watched path, `Null` when absent.
///
/// Called from whatever context the store completes in; implementations must not
/// block and must not call back into the store.
pub type WatchCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Mutation applied by the store on our behalf once this connection drops.
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectOp {
    Delete,
    Update(Map<String, Value>),
}

/// Key-value store used as the signaling relay.
///
/// Paths are `/`-separated. Values are JSON trees; writing `Null` is a delete.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Overwrite the value at `path`.
    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merge `fields` into the object at `path`, leaving other children alone.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Add `value` under a fresh child of `path`; returns the generated key.
    /// Generated keys sort in append order.
    async fn append(&self, path: &str, value: Value) -> Result<String, StoreError>;

    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Deliver the current snapshot now and again after every change.
    async fn watch(&self, path: &str, callback: WatchCallback) -> Result<SubscriptionId, StoreError>;

    async fn unwatch(&self, id: SubscriptionId) -> Result<(), StoreError>;

    /// Register `op` to run against `path` when this connection drops.
    async fn on_disconnect(&self, path: &str, op: DisconnectOp) -> Result<(), StoreError>;
}
