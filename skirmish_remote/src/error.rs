use std::io;

use skirmish_protocol::EntityId;
use thiserror::Error;

/// Failure inside a `Transport`. Transports also keep the text of the last
/// one so the UI can show it after the fact.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport used before init")]
    NotInitialized,
    #[error("transport io error: {0}")]
    Io(#[from] io::Error),
    #[error("unicast packet has {0} destinations, expected exactly one")]
    BadDestinationCount(usize),
    #[error("transport peer went away")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The local player aborted a blocking wait. The barrier that was being
    /// waited on is left unresolved and must not be resumed.
    #[error("wait cancelled by the local player")]
    Cancelled,
    #[error("no discovered host with id {0}")]
    UnknownHost(EntityId),
    #[error("operation requires an open lobby")]
    NotInLobby,
    #[error("no free team slot {0}")]
    BadTeamSlot(usize),
}
