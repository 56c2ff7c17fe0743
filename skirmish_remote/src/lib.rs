// skirmish_remote — lockstep session engine for Skirmish remote play.
//
// Every participant runs the same deterministic simulation; this crate keeps
// the copies in step. It owns the transport, the peer registries, the
// per-team barrier counters and the lobby, and reaches the game through the
// `GameHost` / `RemoteUnit` traits, so it has no dependency on a simulation
// crate.
//
// Module overview:
// - `remote.rs`:    `Remote`, the session object: construction, addressing
//                   (unicast / multicast / broadcast) and the drop policy.
// - `dispatch.rs`:  draining the transport and routing decoded messages.
// - `barrier.rs`:   per-tick frame sync and the begin/end-turn barriers,
//                   with pending notices and timeout drops.
// - `desync.rs`:    checksum barrier and unit-by-unit desync analysis.
// - `lobby.rs`:     discovery, registration, team slots, match start,
//                   leaving, mission supplies.
// - `outbound.rs`:  senders for in-game sync messages.
// - `state.rs`:     `SessionState`, per-team counters and team kinds.
// - `registry.rs`:  `PeerRegistry` and entity id generation.
// - `host.rs`:      the `GameHost` and `RemoteUnit` traits.
// - `transport.rs`: the `Transport` trait and the in-process loopback
//                   network; `udp.rs`: the UDP transport.
// - `clock.rs`, `cancel.rs`, `config.rs`, `error.rs`: time source,
//                   cancellation, `RemoteConfig`, error types.
//
// Concurrency: single-threaded and cooperative. Blocking waits are polling
// loops that drain packets, tick the game through `GameHost::process_tick`
// and check a `CancellationToken` each iteration. Nothing is global, so
// several sessions can run in one process (one per thread in the
// `multiplayer_tests` crate).

pub mod barrier;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod desync;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod lobby;
pub mod outbound;
pub mod registry;
pub mod remote;
pub mod state;
pub mod transport;
pub mod udp;

#[cfg(test)]
pub(crate) mod test_support;

pub use barrier::{SyncMode, SyncStatus};
pub use cancel::CancellationToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RemoteConfig;
pub use desync::{DesyncReport, UnitDivergence};
pub use error::{RemoteError, TransportError};
pub use host::{GameHost, RemoteUnit, UnitList};
pub use lobby::LobbyEvent;
pub use registry::{Peer, PeerRegistry};
pub use remote::{Delivery, DispatchStats, Remote, SessionPhase};
pub use state::{DropReason, ReactionToken, SessionState, TeamKind, TeamSync};
pub use transport::{LoopbackNetwork, LoopbackTransport, Transport, TransportRole};
pub use udp::UdpTransport;
