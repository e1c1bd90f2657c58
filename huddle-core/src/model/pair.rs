use crate::model::peer::PeerIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairKeyError {
    #[error("pair key `{0}` is not of the form <lower>_<higher>")]
    Format(String),

    #[error("pair key `{0}` names the same identity twice")]
    SameIdentity(String),
}

/// Unordered peer pair stored as `(lower, higher)`.
///
/// Both participants derive the same key, rendered `<lower>_<higher>`, so the
/// signaling paths for a pair are shared instead of mirrored.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairKey {
    lower: PeerIdentity,
    higher: PeerIdentity,
}

impl PairKey {
    /// Returns `None` when both sides are the same identity.
    pub fn new(a: &PeerIdentity, b: &PeerIdentity) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(Self {
                lower: a.clone(),
                higher: b.clone(),
            }),
            std::cmp::Ordering::Greater => Some(Self {
                lower: b.clone(),
                higher: a.clone(),
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn lower(&self) -> &PeerIdentity {
        &self.lower
    }

    pub fn higher(&self) -> &PeerIdentity {
        &self.higher
    }

    pub fn contains(&self, id: &PeerIdentity) -> bool {
        &self.lower == id || &self.higher == id
    }

    /// The member of the pair that is not `id`.
    pub fn other(&self, id: &PeerIdentity) -> Option<&PeerIdentity> {
        if &self.lower == id {
            Some(&self.higher)
        } else if &self.higher == id {
            Some(&self.lower)
        } else {
            None
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.lower, self.higher)
    }
}

impl TryFrom<String> for PairKey {
    type Error = PairKeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let Some((a, b)) = s.split_once('_') else {
            return Err(PairKeyError::Format(s));
        };
        let (Ok(a), Ok(b)) = (a.parse::<PeerIdentity>(), b.parse::<PeerIdentity>()) else {
            return Err(PairKeyError::Format(s));
        };
        if a > b {
            return Err(PairKeyError::Format(s));
        }
        Self::new(&a, &b).ok_or(PairKeyError::SameIdentity(s))
    }
}

impl From<PairKey> for String {
    fn from(pair: PairKey) -> Self {
        pair.to_string()
    }
}

/// Which side of a pair creates the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    Offerer,
    Answerer,
}

impl NegotiationRole {
    /// The greater identity offers. Pure and total over distinct identities:
    /// swapping the arguments always yields the opposite role.
    pub fn between(local: &PeerIdentity, remote: &PeerIdentity) -> Option<Self> {
        match local.cmp(remote) {
            std::cmp::Ordering::Greater => Some(Self::Offerer),
            std::cmp::Ordering::Less => Some(Self::Answerer),
            std::cmp::Ordering::Equal => None,
        }
    }
}
