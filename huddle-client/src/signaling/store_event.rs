use serde_json::Value;

use crate::link::LinkId;

/// Which per-pair path a signal snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalChannel {
    Offer,
    Answer,
    Candidates,
}

/// Snapshots pushed by store watches into the room event loop.
#[derive(Debug)]
pub enum StoreEvent {
    /// Full member map of the room.
    Members(Value),

    /// One of the three signaling paths of a pair changed.
    Signal {
        link: LinkId,
        channel: SignalChannel,
        snapshot: Value,
    },
}
