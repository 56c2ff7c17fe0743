// Packet type catalogue.
//
// The first byte of every packet selects one of these kinds. The numbering is
// a fixed 53-slot table; slots not listed here (2, 3, 4, 15, 19, 25, 27, 47)
// are retired and decode as `UnknownPacketType`. Renumbering an existing kind
// breaks compatibility with every deployed peer.

use crate::error::DecodeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    BeginTurn = 0,
    FrameSync = 1,
    StartAck = 5,
    EndTurn = 6,
    LeaveRequest = 7,
    UnitOrder = 8,
    TeamEconomy = 9,
    TeamUnitValues = 10,
    Complex = 11,
    MissionSupplies = 12,
    RngSeed = 13,
    DeployUnit = 14,
    RemoteSave = 16,
    GameRules = 17,
    Chat = 18,
    UnitBaseValues = 20,
    ComplexTransfer = 21,
    UnitState = 22,
    DesyncProbe = 23,
    DesyncAck = 24,
    Clan = 26,
    Discover = 28,
    Register = 29,
    RegisterAccept = 30,
    LeaveLobby = 31,
    StartGame = 32,
    LobbyChat = 33,
    ConnectionEstablished = 34,
    TeamSlot = 35,
    PlayerName = 36,
    Settings = 37,
    UnitPath = 38,
    DesyncDialog = 39,
    Unpause = 40,
    PathBlocked = 41,
    ClearSupplies = 42,
    UnitName = 43,
    HostAnnounce = 44,
    TurnChecksum = 45,
    ReactionToken = 46,
    LeaveAck = 48,
    DesyncAnalysisDone = 49,
    EmergencyStop = 50,
    RestartAfterDesync = 51,
    EndTurnSync = 52,
}

impl PacketType {
    pub const ALL: [PacketType; 45] = [
        PacketType::BeginTurn,
        PacketType::FrameSync,
        PacketType::StartAck,
        PacketType::EndTurn,
        PacketType::LeaveRequest,
        PacketType::UnitOrder,
        PacketType::TeamEconomy,
        PacketType::TeamUnitValues,
        PacketType::Complex,
        PacketType::MissionSupplies,
        PacketType::RngSeed,
        PacketType::DeployUnit,
        PacketType::RemoteSave,
        PacketType::GameRules,
        PacketType::Chat,
        PacketType::UnitBaseValues,
        PacketType::ComplexTransfer,
        PacketType::UnitState,
        PacketType::DesyncProbe,
        PacketType::DesyncAck,
        PacketType::Clan,
        PacketType::Discover,
        PacketType::Register,
        PacketType::RegisterAccept,
        PacketType::LeaveLobby,
        PacketType::StartGame,
        PacketType::LobbyChat,
        PacketType::ConnectionEstablished,
        PacketType::TeamSlot,
        PacketType::PlayerName,
        PacketType::Settings,
        PacketType::UnitPath,
        PacketType::DesyncDialog,
        PacketType::Unpause,
        PacketType::PathBlocked,
        PacketType::ClearSupplies,
        PacketType::UnitName,
        PacketType::HostAnnounce,
        PacketType::TurnChecksum,
        PacketType::ReactionToken,
        PacketType::LeaveAck,
        PacketType::DesyncAnalysisDone,
        PacketType::EmergencyStop,
        PacketType::RestartAfterDesync,
        PacketType::EndTurnSync,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        PacketType::ALL
            .iter()
            .copied()
            .find(|kind| kind.code() == code)
            .ok_or(DecodeError::UnknownPacketType(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_roundtrips_through_its_code() {
        for kind in PacketType::ALL {
            assert_eq!(PacketType::try_from(kind.code()), Ok(kind));
        }
    }

    #[test]
    fn retired_slots_are_unknown() {
        for code in [2u8, 3, 4, 15, 19, 25, 27, 47, 53, 255] {
            assert_eq!(
                PacketType::try_from(code),
                Err(DecodeError::UnknownPacketType(code))
            );
        }
    }

    #[test]
    fn catalogue_fits_in_53_slots() {
        assert!(PacketType::ALL.iter().all(|kind| kind.code() < 53));
    }
}
