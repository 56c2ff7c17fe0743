// Core id types and protocol-wide constants.
//
// `EntityId` names a peer (a lobby node); `UnitId` names a simulation unit.
// Both travel as the u16 "origin" field that follows the packet type byte,
// so the header of every packet is `[type][origin]`. What the origin means
// depends on the packet kind: a team index for per-team sync packets, a unit
// id for unit packets, or an entity id for lobby packets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::packet::{Packet, Wire};

/// Maximum number of teams in a match. Team indices are `0..MAX_TEAM_COUNT`.
pub const MAX_TEAM_COUNT: usize = 4;

/// Version exchanged during host discovery and registration. Peers with a
/// different version never see each other in the lobby.
pub const PROTOCOL_VERSION: u32 = 0x0001_0200;

/// Session-local peer identifier. Zero means "unassigned".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u16);

impl EntityId {
    pub const NONE: EntityId = EntityId(0);

    pub fn is_assigned(self) -> bool {
        self != Self::NONE
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Simulation unit id, owned by the game. The protocol only carries it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u16);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

impl Wire for EntityId {
    const SIZE: usize = 2;

    fn put(self, buf: &mut Vec<u8>) {
        self.0.put(buf);
    }

    fn take(bytes: &[u8]) -> Self {
        EntityId(u16::take(bytes))
    }
}

impl Wire for UnitId {
    const SIZE: usize = 2;

    fn put(self, buf: &mut Vec<u8>) {
        self.0.put(buf);
    }

    fn take(bytes: &[u8]) -> Self {
        UnitId(u16::take(bytes))
    }
}

/// Optional unit reference; zero on the wire means "no unit".
pub(crate) fn write_unit_ref(packet: &mut Packet, unit: Option<UnitId>) {
    packet.write(unit.map_or(0, |u| u.0));
}

pub(crate) fn read_unit_ref(packet: &mut Packet) -> Result<Option<UnitId>, DecodeError> {
    let raw: u16 = packet.read()?;
    Ok((raw != 0).then_some(UnitId(raw)))
}

/// Validate a wire team index.
pub fn team_index(raw: u16) -> Option<usize> {
    let team = usize::from(raw);
    (team < MAX_TEAM_COUNT).then_some(team)
}
