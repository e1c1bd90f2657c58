pub mod error;
pub mod link;
pub mod presence;
pub mod room;
pub mod signaling;
pub mod transport;

pub use error::*;
pub use link::*;
pub use presence::*;
pub use room::*;
pub use signaling::*;
pub use transport::*;

pub use huddle_core::{
    IceCandidate, IceServerConfig, PairKey, PeerIdentity, PresenceRecord, RoomConfig, Roster,
    SessionDescription, SignalEnvelope, VoiceActivityConfig,
};
