use huddle_core::PeerIdentity;
use serde::Serialize;

/// Identifies one incarnation of the link to `remote`. A link recreated for the
/// same peer gets a higher epoch, so events addressed to the old one are dropped.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct LinkId {
    pub remote: PeerIdentity,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerLinkState {
    /// Tracked, no transport yet.
    Idle,
    /// Offer written, waiting for the remote answer.
    AwaitingAnswer,
    /// Transport ready, waiting for the remote offer.
    AwaitingOffer,
    /// Descriptions exchanged. Media may still be converging.
    Connected,
    Closed,
}

/// Result of feeding one signaling snapshot to a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Applied,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The slot is empty.
    Empty,
    /// Our own message read back through the shared path.
    Echo,
    /// Addressed to a different pair or participant.
    Misaddressed,
    /// Already consumed by this link.
    Replay,
    /// An offer from the peer that loses the tie-break.
    DuplicateOfferRace,
    /// Not expected in the current state.
    WrongState,
}
