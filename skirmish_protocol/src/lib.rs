// skirmish_protocol — wire format for lockstep remote play.
//
// Everything two peers need to agree on byte-for-byte lives here: the packet
// buffer, the packet type catalogue, the unit-order codec cascade and the
// typed message set. The crate has no networking and no session state; the
// `skirmish_remote` crate owns transports, barriers and the lobby, and the
// game simulation is reached from there through traits.
//
// Module overview:
// - `packet.rs`:      `Packet` byte buffer with little-endian scalar, string,
//                     vector and blob fields plus a destination address table.
// - `types.rs`:       `EntityId`, `UnitId`, `MAX_TEAM_COUNT`, `PROTOCOL_VERSION`.
// - `packet_type.rs`: the numbered packet kinds.
// - `order.rs`:       `OrderKind`, `CascadeLevel`, `OrderPayload` and the
//                     layered order encoders/decoders.
// - `records.rs`:     structured payloads (economy, supplies, settings, paths,
//                     desync snapshots, lobby node lists).
// - `message.rs`:     `Message`, one variant per packet kind, with
//                     `encode`/`decode`.
// - `error.rs`:       `DecodeError`.
//
// Design decisions:
// - **Raw little-endian, untagged.** Packets are datagram-sized and sent many
//   times per second during barriers, so fields carry no names or tags. The
//   cost is that sender and receiver must list fields identically; keeping
//   both directions in `message.rs` is how that is enforced.
// - **Cascade as composition.** Each order level's writer calls the previous
//   level's writer, so shared prefixes are shared code, not copied tables.

pub mod error;
pub mod message;
pub mod order;
pub mod packet;
pub mod packet_type;
pub mod records;
pub mod types;

pub use error::DecodeError;
pub use message::Message;
pub use order::{CascadeLevel, OrderKind, OrderPayload};
pub use packet::{MIN_PACKET_SIZE, Packet, Wire};
pub use packet_type::PacketType;
pub use records::{
    AirRoute, ComplexTransfer, DesyncSnapshot, FieldDiff, GameRules, GameSettings,
    MissionSupplies, NodeRecord, PathRoute, PathStep, Record, ResearchTopic, ResourceProfile,
    SupplyUnit, TeamEconomy, TeamRoster, UnitAttributes, UnitPath,
};
pub use types::{EntityId, MAX_TEAM_COUNT, PROTOCOL_VERSION, UnitId, team_index};
