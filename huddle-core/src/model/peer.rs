use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Characters that would break a store path or a pair key.
const RESERVED: &[char] = &['/', '_', '.', '#', '$', '[', ']'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("peer identity is empty")]
    Empty,

    #[error("peer identity `{0}` contains a reserved character")]
    Reserved(String),
}

/// Room-unique participant token.
///
/// Identities are compared by plain string order. That order is also the pair
/// tie-break, so it must be identical on every participant.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(try_from = "String", into = "String")]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Timestamp-derived identity: 13 digits of Unix milliseconds followed by
    /// 4 random digits. Fixed width keeps string order equal to join order.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let salt = Uuid::new_v4().as_u128() % 10_000;
        Self(format!("{millis:013}{salt:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PeerIdentity {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            return Err(IdentityError::Empty);
        }
        if s.contains(RESERVED) {
            return Err(IdentityError::Reserved(s));
        }
        Ok(Self(s))
    }
}

impl FromStr for PeerIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl From<PeerIdentity> for String {
    fn from(id: PeerIdentity) -> Self {
        id.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
