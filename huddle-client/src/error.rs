use huddle_core::{ConfigError, PeerIdentity};
use thiserror::Error;

use crate::signaling::SubscriptionId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("shared store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid store path `{0}`")]
    InvalidPath(String),

    #[error("unknown subscription {0:?}")]
    UnknownSubscription(SubscriptionId),
}

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("could not publish presence")]
    StoreUnavailable(#[source] StoreError),

    #[error("presence has not been joined")]
    NotJoined,
}

/// Failures scoped to one peer link. None of them are fatal to the room.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("malformed signaling payload from {peer}: {reason}")]
    MalformedSignalingPayload { peer: PeerIdentity, reason: String },

    #[error("transport setup failed for {peer}")]
    TransportSetupFailure {
        peer: PeerIdentity,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("could not join room presence")]
    StoreUnavailable(#[from] PresenceError),

    #[error("invalid room configuration")]
    InvalidConfig(#[from] ConfigError),

    #[error("room task has stopped")]
    Closed,
}
