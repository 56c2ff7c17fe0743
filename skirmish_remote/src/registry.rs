// Known peers of a session.
//
// A session keeps three registries: `nodes` (every peer taking part,
// including the local player), `hosts` (hosts found by discovery, client
// side) and `clients` (peers that sent discovery, host side). Registries are
// tiny (a handful of peers) so lookups are linear scans over a `Vec`, which
// also keeps insertion order stable for the node list sent to new clients.

use std::net::SocketAddr;

use skirmish_prng::SessionRng;
use skirmish_protocol::{EntityId, NodeRecord};

/// Range entity ids are drawn from. Zero and the low ids stay free so an id
/// can never be mistaken for "unassigned" or a team index.
const ENTITY_ID_MIN: u16 = 10;
const ENTITY_ID_MAX: u16 = 32_001;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    pub address: SocketAddr,
    pub entity_id: EntityId,
    pub name: String,
    pub is_host: bool,
}

impl From<&Peer> for NodeRecord {
    fn from(peer: &Peer) -> Self {
        NodeRecord {
            entity_id: peer.entity_id,
            address: peer.address,
            name: peer.name.clone(),
            is_host: peer.is_host,
        }
    }
}

impl From<NodeRecord> for Peer {
    fn from(record: NodeRecord) -> Self {
        Peer {
            address: record.address,
            entity_id: record.entity_id,
            name: record.name,
            is_host: record.is_host,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PeerRegistry {
    peers: Vec<Peer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update. A peer already known at the same address is
    /// replaced; failing that, one with the same entity id.
    pub fn add(&mut self, peer: Peer) {
        let existing = self
            .peers
            .iter()
            .position(|p| p.address == peer.address)
            .or_else(|| {
                self.peers
                    .iter()
                    .position(|p| p.entity_id == peer.entity_id)
            });
        match existing {
            Some(index) => self.peers[index] = peer,
            None => self.peers.push(peer),
        }
    }

    pub fn find_by_id(&self, id: EntityId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.entity_id == id)
    }

    pub fn find_by_id_mut(&mut self, id: EntityId) -> Option<&mut Peer> {
        self.peers.iter_mut().find(|p| p.entity_id == id)
    }

    pub fn find_by_address(&self, address: SocketAddr) -> Option<&Peer> {
        self.peers.iter().find(|p| p.address == address)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.find_by_id(id).is_some()
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Peer> {
        let index = self.peers.iter().position(|p| p.entity_id == id)?;
        Some(self.peers.remove(index))
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    /// Draw a fresh entity id not present in this registry. Ids are not
    /// recycled within a session, and zero is never produced.
    pub fn generate_id(&self, rng: &mut SessionRng) -> EntityId {
        loop {
            let id = EntityId(rng.range_u16(ENTITY_ID_MIN, ENTITY_ID_MAX));
            if !self.contains(id) {
                return id;
            }
        }
    }

    pub fn to_records(&self) -> Vec<NodeRecord> {
        self.peers.iter().map(NodeRecord::from).collect()
    }
}
