use huddle_core::PeerIdentity;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::oneshot;

use crate::link::PeerLinkState;

/// Commands sent to the room task by its [`RoomHandle`](crate::room::RoomHandle).
#[derive(Debug)]
pub enum RoomCommand {
    /// Mute or unmute the local microphone. Muting also forces speaking off.
    SetMuted(bool),

    /// Raw speech verdict for the latest captured frame.
    SetSpeaking(bool),

    /// Report link states.
    Inspect(oneshot::Sender<RoomSnapshot>),

    /// Delete our presence record, close every link and stop.
    Leave(oneshot::Sender<()>),

    /// Close every link and stop. Presence is left to the disconnect hook.
    Shutdown(oneshot::Sender<()>),
}

/// Point-in-time view of the room task, serializable for a UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    pub local: PeerIdentity,
    pub links: BTreeMap<PeerIdentity, PeerLinkState>,
    pub muted: bool,
    pub speaking: bool,
}
