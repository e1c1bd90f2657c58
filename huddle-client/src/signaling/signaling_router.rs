use huddle_core::{PairKey, PeerIdentity, RoomPaths, SignalEnvelope};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::link::LinkId;
use crate::signaling::shared_store::{DisconnectOp, SharedStore, SubscriptionId, WatchCallback};
use crate::signaling::store_event::{SignalChannel, StoreEvent};

/// The three live subscriptions of one pair.
#[derive(Debug)]
pub struct PairWatch {
    subscriptions: Vec<SubscriptionId>,
}

impl PairWatch {
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

/// Per-pair view of the room's signaling paths.
///
/// Offers and answers overwrite a single slot per pair, candidates are appended.
/// Every concrete path written gets its own delete-on-disconnect hook.
pub struct SignalingRouter {
    store: Arc<dyn SharedStore>,
    paths: RoomPaths,
    local: PeerIdentity,
}

impl SignalingRouter {
    pub fn new(store: Arc<dyn SharedStore>, paths: RoomPaths, local: PeerIdentity) -> Self {
        Self {
            store,
            paths,
            local,
        }
    }

    pub fn local(&self) -> &PeerIdentity {
        &self.local
    }

    /// Subscribe to the offer, answer and candidate paths of `pair`. Snapshots are
    /// tagged with `link` so the room can drop those addressed to a link that has
    /// since been replaced.
    pub async fn watch_pair(
        &self,
        pair: &PairKey,
        link: &LinkId,
        events: &mpsc::UnboundedSender<StoreEvent>,
    ) -> Result<PairWatch, StoreError> {
        let channels = [
            (SignalChannel::Offer, self.paths.offer(pair)),
            (SignalChannel::Answer, self.paths.answer(pair)),
            (SignalChannel::Candidates, self.paths.ice(pair)),
        ];

        let mut watch = PairWatch {
            subscriptions: Vec::with_capacity(channels.len()),
        };
        for (channel, path) in channels {
            let tx = events.clone();
            let link = link.clone();
            let callback: WatchCallback = Arc::new(move |snapshot| {
                let _ = tx.send(StoreEvent::Signal {
                    link: link.clone(),
                    channel,
                    snapshot,
                });
            });

            match self.store.watch(&path, callback).await {
                Ok(id) => watch.subscriptions.push(id),
                Err(e) => {
                    self.unwatch_pair(watch).await;
                    return Err(e);
                }
            }
        }
        debug!("Watching signaling paths of pair {}", pair);
        Ok(watch)
    }

    pub async fn unwatch_pair(&self, watch: PairWatch) {
        for id in watch.subscriptions {
            if let Err(e) = self.store.unwatch(id).await {
                warn!("Failed to cancel signaling watch {:?}: {}", id, e);
            }
        }
    }

    /// Overwrite the pair's offer slot. Returns the written path.
    pub async fn send_offer(&self, envelope: &SignalEnvelope) -> Result<String, StoreError> {
        let path = self.paths.offer(&envelope.route().pair);
        self.put_description(path, envelope).await
    }

    /// Overwrite the pair's answer slot. Returns the written path.
    pub async fn send_answer(&self, envelope: &SignalEnvelope) -> Result<String, StoreError> {
        let path = self.paths.answer(&envelope.route().pair);
        self.put_description(path, envelope).await
    }

    /// Append a candidate entry. Returns the written path.
    pub async fn send_candidate(&self, envelope: &SignalEnvelope) -> Result<String, StoreError> {
        let list = self.paths.ice(&envelope.route().pair);
        let key = self.store.append(&list, encode(envelope)).await?;
        let path = format!("{list}/{key}");
        self.store.on_disconnect(&path, DisconnectOp::Delete).await?;
        Ok(path)
    }

    /// Remove a consumed offer so a replayed snapshot cannot re-apply it.
    pub async fn consume_offer(&self, pair: &PairKey) -> Result<(), StoreError> {
        self.store.delete(&self.paths.offer(pair)).await
    }

    /// Remove a consumed answer so a replayed snapshot cannot re-apply it.
    pub async fn consume_answer(&self, pair: &PairKey) -> Result<(), StoreError> {
        self.store.delete(&self.paths.answer(pair)).await
    }

    /// Drop an answer left over from an earlier link before offering again.
    pub async fn clear_answer(&self, pair: &PairKey) -> Result<(), StoreError> {
        self.store.delete(&self.paths.answer(pair)).await
    }

    /// Best-effort delete of paths a closing link wrote.
    pub async fn retract(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.store.delete(path).await {
                debug!("Could not retract {}: {}", path, e);
            }
        }
    }

    /// Decode an offer or answer slot. `Ok(None)` when the slot is empty.
    pub fn decode_description(
        &self,
        snapshot: &Value,
    ) -> Result<Option<SignalEnvelope>, serde_json::Error> {
        if snapshot.is_null() {
            return Ok(None);
        }
        serde_json::from_value(snapshot.clone()).map(Some)
    }

    /// Decode a candidate list into `(key, envelope)` pairs in key order, which
    /// is append order.
    pub fn decode_candidates(
        &self,
        snapshot: &Value,
    ) -> Vec<(String, Result<SignalEnvelope, serde_json::Error>)> {
        match snapshot {
            Value::Null => Vec::new(),
            Value::Object(entries) => {
                let mut decoded: Vec<_> = entries
                    .iter()
                    .map(|(key, value)| (key.clone(), serde_json::from_value(value.clone())))
                    .collect();
                decoded.sort_by(|a, b| a.0.cmp(&b.0));
                decoded
            }
            other => {
                warn!("Ignoring non-object candidate list: {}", other);
                Vec::new()
            }
        }
    }

    async fn put_description(
        &self,
        path: String,
        envelope: &SignalEnvelope,
    ) -> Result<String, StoreError> {
        self.store.write(&path, encode(envelope)).await?;
        self.store.on_disconnect(&path, DisconnectOp::Delete).await?;
        Ok(path)
    }
}

fn encode(envelope: &SignalEnvelope) -> Value {
    // Envelopes hold only strings, integers and options; serialization cannot fail.
    serde_json::to_value(envelope).unwrap_or(Value::Null)
}
