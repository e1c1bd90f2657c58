mod pair;
mod peer;
mod presence;
mod room;
mod signaling;

pub use pair::{NegotiationRole, PairKey, PairKeyError};
pub use peer::{IdentityError, PeerIdentity};
pub use presence::{PresenceRecord, Roster};
pub use room::{ConfigError, DEFAULT_STUN_SERVER, RoomConfig, RoomPaths, VoiceActivityConfig};
pub use signaling::{
    IceCandidate, IceServerConfig, Route, SdpKind, SessionDescription, SignalEnvelope,
};
