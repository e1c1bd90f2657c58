use crate::model::peer::PeerIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Member record stored at `members/<identity>`. Only its owner writes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    #[serde(default)]
    pub speaking: bool,
    #[serde(default)]
    pub muted: bool,
}

/// Current room membership as seen through the members watch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    members: BTreeMap<PeerIdentity, PresenceRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: PeerIdentity, record: PresenceRecord) {
        self.members.insert(id, record);
    }

    pub fn contains(&self, id: &PeerIdentity) -> bool {
        self.members.contains_key(id)
    }

    pub fn get(&self, id: &PeerIdentity) -> Option<&PresenceRecord> {
        self.members.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &PeerIdentity> {
        self.members.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerIdentity, &PresenceRecord)> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl FromIterator<(PeerIdentity, PresenceRecord)> for Roster {
    fn from_iter<I: IntoIterator<Item = (PeerIdentity, PresenceRecord)>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}
