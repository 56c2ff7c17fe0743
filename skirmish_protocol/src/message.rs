// Typed view of every remote packet kind.
//
// `Message::encode` writes `[type][origin][payload]` and `Message::decode`
// reads it back. Both directions of a kind live next to each other in this
// file so their field lists can be checked against each other by eye; there
// is no tagging on the wire to catch drift.
//
// The u16 origin after the type byte is reused per kind:
// - team index: turn/frame sync, economy, supplies, chat, desync acks;
// - unit id: orders, unit values, paths, names, desync probes;
// - entity id: lobby traffic (discovery, registration, slots, chat).
// Team indices are not range-checked here; the dispatcher drops packets
// whose team is out of range.

use crate::error::DecodeError;
use crate::order::{self, OrderKind, OrderPayload};
use crate::packet::{MIN_PACKET_SIZE, Packet};
use crate::packet_type::PacketType;
use crate::records::{
    ComplexTransfer, DesyncSnapshot, GameRules, GameSettings, MissionSupplies, NodeRecord, Record,
    TeamEconomy, TeamRoster, UnitAttributes, UnitPath, read_records, write_records,
};
use crate::types::{EntityId, UnitId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    // --- Turn and frame barriers ---
    /// 00: begin-turn barrier index of `team`.
    BeginTurn { team: u16, index: u32 },
    /// 01: per-tick frame sync counter (modulo 64) of `team`.
    FrameSync { team: u16, counter: u32 },
    /// 52: end-turn barrier index of `team`.
    EndTurnSync { team: u16, index: u32 },
    /// 45: checksum barrier; `crc16` is the team's state checksum at `next_turn_index`.
    TurnChecksum {
        team: u16,
        next_turn_index: u32,
        crc16: u16,
    },

    // --- Session ---
    /// 05: a client finished setting up players for the match started by `host`.
    StartAck { host: EntityId },
    EndTurn { team: u16 },
    /// 07: `team` is leaving the match; `dropped` when it is leaving for good.
    LeaveRequest {
        team: u16,
        request_id: u8,
        dropped: bool,
    },
    LeaveAck { team: u16, request_id: u8 },
    /// 46: hands the delayed-reaction token to `team`.
    ReactionToken {
        team: u16,
        active: bool,
        counter: u32,
    },

    // --- Game state sync ---
    UnitOrder { unit: UnitId, order: OrderPayload },
    TeamEconomy { team: u16, economy: TeamEconomy },
    TeamUnitValues {
        team: u16,
        unit_type: u16,
        values: UnitAttributes,
    },
    /// 11: production complex state, opaque to the protocol.
    Complex { team: u16, data: Vec<u8> },
    MissionSupplies {
        team: u16,
        supplies: MissionSupplies,
    },
    RngSeed { seed: u32 },
    DeployUnit {
        team: u16,
        unit_type: u16,
        grid_x: i32,
        grid_y: i32,
    },
    RemoteSave {
        team: u16,
        file_name: String,
        title: String,
    },
    GameRules { from: EntityId, rules: GameRules },
    Chat { team: u16, text: String },
    UnitBaseValues {
        unit: UnitId,
        values: UnitAttributes,
    },
    ComplexTransfer {
        team: u16,
        transfer: ComplexTransfer,
    },
    /// 22: full unit state, opaque to the protocol.
    UnitState { unit: UnitId, data: Vec<u8> },
    Clan { team: u16, clan: u8 },
    UnitPath { unit: UnitId, path: UnitPath },
    DesyncDialog { team: u16 },
    Unpause { team: u16 },
    PathBlocked { unit: UnitId, blocked: bool },
    ClearSupplies { team: u16 },
    UnitName { unit: UnitId, name: String },
    EmergencyStop { unit: UnitId },

    // --- Desync analysis ---
    DesyncProbe {
        unit: UnitId,
        snapshot: DesyncSnapshot,
    },
    /// 24: `team` compared the last probe; `diverged` when it differed locally.
    DesyncAck { team: u16, diverged: bool },
    DesyncAnalysisDone { team: u16 },
    RestartAfterDesync { team: u16 },

    // --- Lobby ---
    /// 28: broadcast by a client looking for hosts.
    Discover { from: EntityId, protocol_version: u32 },
    /// 44: a host answering discovery.
    HostAnnounce {
        host: EntityId,
        protocol_version: u32,
        name: String,
    },
    /// 29: a client asking `host` for a place in its lobby.
    Register {
        host: EntityId,
        protocol_version: u32,
        name: String,
    },
    /// 30: the host's answer to a registration.
    RegisterAccept {
        client: EntityId,
        host: EntityId,
        roster: TeamRoster,
        nodes: Vec<NodeRecord>,
        settings: GameSettings,
    },
    LeaveLobby { node: EntityId },
    StartGame { host: EntityId },
    LobbyChat { host: EntityId, text: String },
    ConnectionEstablished { host: EntityId },
    /// 35: `node` took team slot `team` in the lobby of `host`.
    TeamSlot {
        host: EntityId,
        node: EntityId,
        team: u16,
        ready: bool,
        name: String,
    },
    PlayerName { node: EntityId, name: String },
    Settings {
        host: EntityId,
        settings: GameSettings,
    },
}

impl Message {
    pub fn kind(&self) -> PacketType {
        match self {
            Message::BeginTurn { .. } => PacketType::BeginTurn,
            Message::FrameSync { .. } => PacketType::FrameSync,
            Message::EndTurnSync { .. } => PacketType::EndTurnSync,
            Message::TurnChecksum { .. } => PacketType::TurnChecksum,
            Message::StartAck { .. } => PacketType::StartAck,
            Message::EndTurn { .. } => PacketType::EndTurn,
            Message::LeaveRequest { .. } => PacketType::LeaveRequest,
            Message::LeaveAck { .. } => PacketType::LeaveAck,
            Message::ReactionToken { .. } => PacketType::ReactionToken,
            Message::UnitOrder { .. } => PacketType::UnitOrder,
            Message::TeamEconomy { .. } => PacketType::TeamEconomy,
            Message::TeamUnitValues { .. } => PacketType::TeamUnitValues,
            Message::Complex { .. } => PacketType::Complex,
            Message::MissionSupplies { .. } => PacketType::MissionSupplies,
            Message::RngSeed { .. } => PacketType::RngSeed,
            Message::DeployUnit { .. } => PacketType::DeployUnit,
            Message::RemoteSave { .. } => PacketType::RemoteSave,
            Message::GameRules { .. } => PacketType::GameRules,
            Message::Chat { .. } => PacketType::Chat,
            Message::UnitBaseValues { .. } => PacketType::UnitBaseValues,
            Message::ComplexTransfer { .. } => PacketType::ComplexTransfer,
            Message::UnitState { .. } => PacketType::UnitState,
            Message::Clan { .. } => PacketType::Clan,
            Message::UnitPath { .. } => PacketType::UnitPath,
            Message::DesyncDialog { .. } => PacketType::DesyncDialog,
            Message::Unpause { .. } => PacketType::Unpause,
            Message::PathBlocked { .. } => PacketType::PathBlocked,
            Message::ClearSupplies { .. } => PacketType::ClearSupplies,
            Message::UnitName { .. } => PacketType::UnitName,
            Message::EmergencyStop { .. } => PacketType::EmergencyStop,
            Message::DesyncProbe { .. } => PacketType::DesyncProbe,
            Message::DesyncAck { .. } => PacketType::DesyncAck,
            Message::DesyncAnalysisDone { .. } => PacketType::DesyncAnalysisDone,
            Message::RestartAfterDesync { .. } => PacketType::RestartAfterDesync,
            Message::Discover { .. } => PacketType::Discover,
            Message::HostAnnounce { .. } => PacketType::HostAnnounce,
            Message::Register { .. } => PacketType::Register,
            Message::RegisterAccept { .. } => PacketType::RegisterAccept,
            Message::LeaveLobby { .. } => PacketType::LeaveLobby,
            Message::StartGame { .. } => PacketType::StartGame,
            Message::LobbyChat { .. } => PacketType::LobbyChat,
            Message::ConnectionEstablished { .. } => PacketType::ConnectionEstablished,
            Message::TeamSlot { .. } => PacketType::TeamSlot,
            Message::PlayerName { .. } => PacketType::PlayerName,
            Message::Settings { .. } => PacketType::Settings,
        }
    }

    /// The u16 written right after the type byte.
    pub fn origin(&self) -> u16 {
        match self {
            Message::BeginTurn { team, .. }
            | Message::FrameSync { team, .. }
            | Message::EndTurnSync { team, .. }
            | Message::TurnChecksum { team, .. }
            | Message::EndTurn { team }
            | Message::LeaveRequest { team, .. }
            | Message::LeaveAck { team, .. }
            | Message::ReactionToken { team, .. }
            | Message::TeamEconomy { team, .. }
            | Message::TeamUnitValues { team, .. }
            | Message::Complex { team, .. }
            | Message::MissionSupplies { team, .. }
            | Message::DeployUnit { team, .. }
            | Message::RemoteSave { team, .. }
            | Message::Chat { team, .. }
            | Message::ComplexTransfer { team, .. }
            | Message::Clan { team, .. }
            | Message::DesyncDialog { team }
            | Message::Unpause { team }
            | Message::ClearSupplies { team }
            | Message::DesyncAck { team, .. }
            | Message::DesyncAnalysisDone { team }
            | Message::RestartAfterDesync { team } => *team,

            Message::UnitOrder { unit, .. }
            | Message::UnitBaseValues { unit, .. }
            | Message::UnitState { unit, .. }
            | Message::UnitPath { unit, .. }
            | Message::PathBlocked { unit, .. }
            | Message::UnitName { unit, .. }
            | Message::EmergencyStop { unit }
            | Message::DesyncProbe { unit, .. } => unit.0,

            Message::StartAck { host }
            | Message::HostAnnounce { host, .. }
            | Message::Register { host, .. }
            | Message::StartGame { host }
            | Message::LobbyChat { host, .. }
            | Message::ConnectionEstablished { host }
            | Message::TeamSlot { host, .. }
            | Message::Settings { host, .. } => host.0,

            Message::GameRules { from, .. } | Message::Discover { from, .. } => from.0,
            Message::RegisterAccept { client, .. } => client.0,
            Message::LeaveLobby { node } | Message::PlayerName { node, .. } => node.0,
            Message::RngSeed { .. } => 0,
        }
    }

    pub fn encode(&self) -> Packet {
        let mut packet = Packet::new();
        packet.write(self.kind().code());
        packet.write(self.origin());

        match self {
            Message::BeginTurn { index, .. } | Message::EndTurnSync { index, .. } => {
                packet.write(*index);
            }
            Message::FrameSync { counter, .. } => packet.write(*counter),
            Message::TurnChecksum {
                next_turn_index,
                crc16,
                ..
            } => {
                packet.write(*next_turn_index);
                packet.write(*crc16);
            }
            Message::LeaveRequest {
                request_id,
                dropped,
                ..
            } => {
                packet.write(*request_id);
                packet.write(*dropped);
            }
            Message::LeaveAck { request_id, .. } => packet.write(*request_id),
            Message::ReactionToken {
                active, counter, ..
            } => {
                packet.write(*active);
                packet.write(*counter);
            }
            Message::UnitOrder { order, .. } => {
                order::encode(order.cascade_level(), order, &mut packet);
            }
            Message::TeamEconomy { economy, .. } => economy.write_to(&mut packet),
            Message::TeamUnitValues {
                unit_type, values, ..
            } => {
                packet.write(*unit_type);
                values.write_to(&mut packet);
            }
            Message::Complex { data, .. } | Message::UnitState { data, .. } => {
                packet.write_blob(data);
            }
            Message::MissionSupplies { supplies, .. } => supplies.write_to(&mut packet),
            Message::RngSeed { seed } => packet.write(*seed),
            Message::DeployUnit {
                unit_type,
                grid_x,
                grid_y,
                ..
            } => {
                packet.write(*unit_type);
                packet.write(*grid_x);
                packet.write(*grid_y);
            }
            Message::RemoteSave {
                file_name, title, ..
            } => {
                packet.write_str(file_name);
                packet.write_str(title);
            }
            Message::GameRules { rules, .. } => rules.write_to(&mut packet),
            Message::Chat { text, .. } | Message::LobbyChat { text, .. } => {
                packet.write_str(text);
            }
            Message::UnitBaseValues { values, .. } => values.write_to(&mut packet),
            Message::ComplexTransfer { transfer, .. } => transfer.write_to(&mut packet),
            Message::Clan { clan, .. } => packet.write(*clan),
            Message::UnitPath { path, .. } => path.write_to(&mut packet),
            Message::PathBlocked { blocked, .. } => packet.write(*blocked),
            Message::UnitName { name, .. } | Message::PlayerName { name, .. } => {
                packet.write_str(name);
            }
            Message::DesyncProbe { snapshot, .. } => snapshot.write_to(&mut packet),
            Message::DesyncAck { diverged, .. } => packet.write(*diverged),
            Message::Discover {
                protocol_version, ..
            } => packet.write(*protocol_version),
            Message::HostAnnounce {
                protocol_version,
                name,
                ..
            }
            | Message::Register {
                protocol_version,
                name,
                ..
            } => {
                packet.write(*protocol_version);
                packet.write_str(name);
            }
            Message::RegisterAccept {
                host,
                roster,
                nodes,
                settings,
                ..
            } => {
                packet.write(*host);
                roster.write_to(&mut packet);
                write_records(&mut packet, nodes);
                settings.write_to(&mut packet);
            }
            Message::TeamSlot {
                node,
                team,
                ready,
                name,
                ..
            } => {
                packet.write(*node);
                packet.write(*team);
                packet.write(*ready);
                packet.write_str(name);
            }
            Message::Settings { settings, .. } => settings.write_to(&mut packet),
            Message::StartAck { .. }
            | Message::EndTurn { .. }
            | Message::DesyncDialog { .. }
            | Message::Unpause { .. }
            | Message::ClearSupplies { .. }
            | Message::EmergencyStop { .. }
            | Message::DesyncAnalysisDone { .. }
            | Message::RestartAfterDesync { .. }
            | Message::LeaveLobby { .. }
            | Message::StartGame { .. }
            | Message::ConnectionEstablished { .. } => {}
        }

        packet
    }

    /// Decode a packet from its first byte. The read cursor is left after the
    /// last field of the kind; trailing bytes are ignored.
    pub fn decode(packet: &mut Packet) -> Result<Message, DecodeError> {
        if packet.len() < MIN_PACKET_SIZE {
            return Err(DecodeError::TooShort { len: packet.len() });
        }
        let kind = PacketType::try_from(packet.read::<u8>()?)?;
        let origin: u16 = packet.read()?;
        let team = origin;
        let unit = UnitId(origin);
        let entity = EntityId(origin);

        let message = match kind {
            PacketType::BeginTurn => Message::BeginTurn {
                team,
                index: packet.read()?,
            },
            PacketType::FrameSync => Message::FrameSync {
                team,
                counter: packet.read()?,
            },
            PacketType::EndTurnSync => Message::EndTurnSync {
                team,
                index: packet.read()?,
            },
            PacketType::TurnChecksum => Message::TurnChecksum {
                team,
                next_turn_index: packet.read()?,
                crc16: packet.read()?,
            },
            PacketType::StartAck => Message::StartAck { host: entity },
            PacketType::EndTurn => Message::EndTurn { team },
            PacketType::LeaveRequest => Message::LeaveRequest {
                team,
                request_id: packet.read()?,
                dropped: packet.read()?,
            },
            PacketType::LeaveAck => Message::LeaveAck {
                team,
                request_id: packet.read()?,
            },
            PacketType::ReactionToken => Message::ReactionToken {
                team,
                active: packet.read()?,
                counter: packet.read()?,
            },
            PacketType::UnitOrder => {
                // The orders byte leads every level, so it picks the level.
                let orders = OrderKind::try_from(packet.peek_u8()?)?;
                let mut order = OrderPayload::default();
                order::decode(orders.cascade_level(), &mut order, packet)?;
                Message::UnitOrder { unit, order }
            }
            PacketType::TeamEconomy => Message::TeamEconomy {
                team,
                economy: TeamEconomy::read_from(packet)?,
            },
            PacketType::TeamUnitValues => Message::TeamUnitValues {
                team,
                unit_type: packet.read()?,
                values: UnitAttributes::read_from(packet)?,
            },
            PacketType::Complex => Message::Complex {
                team,
                data: packet.read_blob()?,
            },
            PacketType::MissionSupplies => Message::MissionSupplies {
                team,
                supplies: MissionSupplies::read_from(packet)?,
            },
            PacketType::RngSeed => Message::RngSeed {
                seed: packet.read()?,
            },
            PacketType::DeployUnit => Message::DeployUnit {
                team,
                unit_type: packet.read()?,
                grid_x: packet.read()?,
                grid_y: packet.read()?,
            },
            PacketType::RemoteSave => Message::RemoteSave {
                team,
                file_name: packet.read_string()?,
                title: packet.read_string()?,
            },
            PacketType::GameRules => Message::GameRules {
                from: entity,
                rules: GameRules::read_from(packet)?,
            },
            PacketType::Chat => Message::Chat {
                team,
                text: packet.read_string()?,
            },
            PacketType::UnitBaseValues => Message::UnitBaseValues {
                unit,
                values: UnitAttributes::read_from(packet)?,
            },
            PacketType::ComplexTransfer => Message::ComplexTransfer {
                team,
                transfer: ComplexTransfer::read_from(packet)?,
            },
            PacketType::UnitState => Message::UnitState {
                unit,
                data: packet.read_blob()?,
            },
            PacketType::Clan => Message::Clan {
                team,
                clan: packet.read()?,
            },
            PacketType::UnitPath => Message::UnitPath {
                unit,
                path: UnitPath::read_from(packet)?,
            },
            PacketType::DesyncDialog => Message::DesyncDialog { team },
            PacketType::Unpause => Message::Unpause { team },
            PacketType::PathBlocked => Message::PathBlocked {
                unit,
                blocked: packet.read()?,
            },
            PacketType::ClearSupplies => Message::ClearSupplies { team },
            PacketType::UnitName => Message::UnitName {
                unit,
                name: packet.read_string()?,
            },
            PacketType::EmergencyStop => Message::EmergencyStop { unit },
            PacketType::DesyncProbe => Message::DesyncProbe {
                unit,
                snapshot: DesyncSnapshot::read_from(packet)?,
            },
            PacketType::DesyncAck => Message::DesyncAck {
                team,
                diverged: packet.read()?,
            },
            PacketType::DesyncAnalysisDone => Message::DesyncAnalysisDone { team },
            PacketType::RestartAfterDesync => Message::RestartAfterDesync { team },
            PacketType::Discover => Message::Discover {
                from: entity,
                protocol_version: packet.read()?,
            },
            PacketType::HostAnnounce => Message::HostAnnounce {
                host: entity,
                protocol_version: packet.read()?,
                name: packet.read_string()?,
            },
            PacketType::Register => Message::Register {
                host: entity,
                protocol_version: packet.read()?,
                name: packet.read_string()?,
            },
            PacketType::RegisterAccept => Message::RegisterAccept {
                client: entity,
                host: packet.read()?,
                roster: TeamRoster::read_from(packet)?,
                nodes: read_records(packet)?,
                settings: GameSettings::read_from(packet)?,
            },
            PacketType::LeaveLobby => Message::LeaveLobby { node: entity },
            PacketType::StartGame => Message::StartGame { host: entity },
            PacketType::LobbyChat => Message::LobbyChat {
                host: entity,
                text: packet.read_string()?,
            },
            PacketType::ConnectionEstablished => Message::ConnectionEstablished { host: entity },
            PacketType::TeamSlot => Message::TeamSlot {
                host: entity,
                node: packet.read()?,
                team: packet.read()?,
                ready: packet.read()?,
                name: packet.read_string()?,
            },
            PacketType::PlayerName => Message::PlayerName {
                node: entity,
                name: packet.read_string()?,
            },
            PacketType::Settings => Message::Settings {
                host: entity,
                settings: GameSettings::read_from(packet)?,
            },
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{PathRoute, SupplyUnit};

    fn roundtrip(message: Message) {
        let mut packet = message.encode();
        assert_eq!(packet.peek_type(), Some(message.kind().code()));
        assert_eq!(packet.peek_origin(), Some(message.origin()));
        let decoded = Message::decode(&mut packet).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(packet.remaining(), 0, "{:?} left bytes unread", message.kind());
    }

    #[test]
    fn signal_layout_is_type_team_param() {
        let packet = Message::BeginTurn { team: 2, index: 7 }.encode();
        assert_eq!(packet.as_bytes(), &[0, 2, 0, 7, 0, 0, 0]);
        let packet = Message::TurnChecksum {
            team: 1,
            next_turn_index: 3,
            crc16: 0xbeef,
        }
        .encode();
        assert_eq!(packet.as_bytes(), &[45, 1, 0, 3, 0, 0, 0, 0xef, 0xbe]);
    }

    #[test]
    fn header_only_kinds_are_three_bytes() {
        for message in [
            Message::EndTurn { team: 1 },
            Message::Unpause { team: 0 },
            Message::EmergencyStop { unit: UnitId(9) },
            Message::StartGame { host: EntityId(300) },
            Message::DesyncAnalysisDone { team: 3 },
        ] {
            assert_eq!(message.encode().len(), 3);
            roundtrip(message);
        }
    }

    #[test]
    fn unit_order_is_sent_at_its_order_level() {
        let order = OrderPayload {
            orders: OrderKind::PowerOff,
            state: 2,
            target_grid_x: 99,
            ..OrderPayload::default()
        };
        let packet = Message::UnitOrder {
            unit: UnitId(40),
            order: order.clone(),
        }
        .encode();
        // Header plus the five Basic-level bytes; the target is not sent.
        assert_eq!(packet.len(), 3 + 5);

        let mut packet = packet;
        let Message::UnitOrder { order: decoded, .. } = Message::decode(&mut packet).unwrap()
        else {
            panic!("wrong kind");
        };
        assert_eq!(decoded.orders, OrderKind::PowerOff);
        assert_eq!(decoded.target_grid_x, 0);
    }

    #[test]
    fn unit_order_roundtrips_at_builder_level() {
        roundtrip(Message::UnitOrder {
            unit: UnitId(1201),
            order: OrderPayload {
                orders: OrderKind::Build,
                state: 1,
                parent_unit: Some(UnitId(17)),
                target_grid_x: 10,
                target_grid_y: 11,
                repeat_build: true,
                build_time: 4,
                build_rate: 1,
                build_queue: vec![22, 23],
                ..OrderPayload::default()
            },
        });
    }

    #[test]
    fn lobby_messages_roundtrip() {
        roundtrip(Message::Discover {
            from: EntityId(512),
            protocol_version: 7,
        });
        roundtrip(Message::HostAnnounce {
            host: EntityId(20),
            protocol_version: 7,
            name: "Host".into(),
        });
        roundtrip(Message::Register {
            host: EntityId(20),
            protocol_version: 7,
            name: "Guest".into(),
        });
        let mut roster = TeamRoster::default();
        roster.nodes[0] = EntityId(20);
        roster.names[0] = "Red".into();
        roundtrip(Message::RegisterAccept {
            client: EntityId(4000),
            host: EntityId(20),
            roster,
            nodes: vec![NodeRecord {
                entity_id: EntityId(20),
                address: "10.1.1.1:31554".parse().unwrap(),
                name: "Host".into(),
                is_host: true,
            }],
            settings: GameSettings::default(),
        });
        roundtrip(Message::TeamSlot {
            host: EntityId(20),
            node: EntityId(4000),
            team: 1,
            ready: true,
            name: "Green".into(),
        });
    }

    #[test]
    fn game_state_messages_roundtrip() {
        roundtrip(Message::MissionSupplies {
            team: 2,
            supplies: MissionSupplies {
                team_gold: 15,
                units: vec![SupplyUnit {
                    unit_type: 4,
                    cargo: 10,
                }],
                ..MissionSupplies::default()
            },
        });
        roundtrip(Message::UnitPath {
            unit: UnitId(3),
            path: UnitPath {
                orders: OrderKind::Move,
                route: PathRoute::Ground(vec![]),
                ..UnitPath::default()
            },
        });
        roundtrip(Message::Complex {
            team: 1,
            data: vec![1, 2, 3],
        });
        roundtrip(Message::RngSeed { seed: 0xdead_beef });
        roundtrip(Message::ReactionToken {
            team: 3,
            active: false,
            counter: 9,
        });
        roundtrip(Message::LeaveRequest {
            team: 1,
            request_id: 4,
            dropped: true,
        });
    }

    #[test]
    fn short_and_unknown_packets_fail() {
        let mut short = Packet::from_bytes(vec![0, 1]);
        assert_eq!(
            Message::decode(&mut short),
            Err(DecodeError::TooShort { len: 2 })
        );
        let mut unknown = Packet::from_bytes(vec![47, 0, 0]);
        assert_eq!(
            Message::decode(&mut unknown),
            Err(DecodeError::UnknownPacketType(47))
        );
    }

    #[test]
    fn missing_payload_is_truncated() {
        let mut packet = Packet::from_bytes(vec![52, 1, 0, 9]);
        assert!(matches!(
            Message::decode(&mut packet),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
