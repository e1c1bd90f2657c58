use huddle_core::{PeerIdentity, PresenceRecord, RoomPaths, Roster};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::PresenceError;
use crate::signaling::{DisconnectOp, SharedStore, SubscriptionId, WatchCallback};

/// This participant's entry in the room's member map, plus the watch on the
/// whole map.
///
/// The entry is deleted by the store when the connection drops, so a crashed
/// participant disappears from everyone's roster without running any code.
pub struct PresenceRegistry {
    store: Arc<dyn SharedStore>,
    paths: RoomPaths,
    joined: Option<PeerIdentity>,
    subscription: Option<SubscriptionId>,
}

impl PresenceRegistry {
    pub fn new(store: Arc<dyn SharedStore>, paths: RoomPaths) -> Self {
        Self {
            store,
            paths,
            joined: None,
            subscription: None,
        }
    }

    pub fn identity(&self) -> Option<&PeerIdentity> {
        self.joined.as_ref()
    }

    /// Publish `{speaking: false, muted: false}` for `identity` and arm its
    /// delete-on-disconnect hook.
    pub async fn join(&mut self, identity: PeerIdentity) -> Result<(), PresenceError> {
        let path = self.paths.member(&identity);
        let record = PresenceRecord::default();

        self.store
            .write(
                &path,
                json!({ "speaking": record.speaking, "muted": record.muted }),
            )
            .await
            .map_err(PresenceError::StoreUnavailable)?;

        if let Err(e) = self.store.on_disconnect(&path, DisconnectOp::Delete).await {
            // Without the hook the record would outlive us.
            let _ = self.store.delete(&path).await;
            return Err(PresenceError::StoreUnavailable(e));
        }

        info!("Joined presence as {}", identity);
        self.joined = Some(identity);
        Ok(())
    }

    pub async fn set_speaking(&self, speaking: bool) -> Result<(), PresenceError> {
        self.update_flag("speaking", speaking).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), PresenceError> {
        self.update_flag("muted", muted).await
    }

    /// Subscribe to the member map. Replaces any previous subscription.
    pub async fn watch_members(
        &mut self,
        callback: WatchCallback,
    ) -> Result<SubscriptionId, PresenceError> {
        self.unwatch_members().await;

        let id = self
            .store
            .watch(&self.paths.members(), callback)
            .await
            .map_err(PresenceError::StoreUnavailable)?;
        self.subscription = Some(id);
        Ok(id)
    }

    /// Withdraw from the room: stop watching members and delete our record.
    pub async fn leave(&mut self) -> Result<(), PresenceError> {
        self.unwatch_members().await;

        let Some(identity) = self.joined.take() else {
            return Err(PresenceError::NotJoined);
        };
        self.store
            .delete(&self.paths.member(&identity))
            .await
            .map_err(PresenceError::StoreUnavailable)?;

        info!("Left presence as {}", identity);
        Ok(())
    }

    /// Decode a member map snapshot. Entries with an invalid identity or a
    /// non-record value are skipped.
    pub fn decode_members(snapshot: &Value) -> Roster {
        let Value::Object(entries) = snapshot else {
            if !snapshot.is_null() {
                warn!("Ignoring non-object member map: {}", snapshot);
            }
            return Roster::new();
        };

        let mut roster = Roster::new();
        for (key, value) in entries {
            let id = match key.parse::<PeerIdentity>() {
                Ok(id) => id,
                Err(e) => {
                    warn!("Skipping member with invalid identity {:?}: {}", key, e);
                    continue;
                }
            };
            match serde_json::from_value::<PresenceRecord>(value.clone()) {
                Ok(record) => roster.insert(id, record),
                Err(e) => warn!("Skipping malformed presence record of {}: {}", id, e),
            }
        }
        roster
    }

    async fn update_flag(&self, field: &str, value: bool) -> Result<(), PresenceError> {
        let identity = self.joined.as_ref().ok_or(PresenceError::NotJoined)?;

        let mut fields = Map::new();
        fields.insert(field.to_owned(), Value::Bool(value));
        self.store
            .update(&self.paths.member(identity), fields)
            .await
            .map_err(PresenceError::StoreUnavailable)
    }

    /// Stop watching the member map. The record stays, so the disconnect
    /// hook still removes it.
    pub async fn unwatch_members(&mut self) {
        let Some(id) = self.subscription.take() else {
            return;
        };
        if let Err(e) = self.store.unwatch(id).await {
            warn!("Failed to cancel member watch: {}", e);
        }
    }
}
