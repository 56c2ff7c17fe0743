// The `Remote` session object.
//
// One `Remote` per participating peer owns the transport, the clock, the
// session PRNG, the peer registries, the lobby and the synchronization state.
// Its behavior is split over several files, each adding an `impl Remote`
// block:
// - `remote.rs` (this file): construction, accessors, addressing and the
//   team drop policy.
// - `dispatch.rs`: draining the transport and routing decoded messages.
// - `barrier.rs`: frame sync and turn barriers.
// - `desync.rs`: checksum barrier and desync analysis.
// - `lobby.rs`: discovery, registration, team slots, match start and leave.
// - `outbound.rs`: senders for in-game sync messages.
//
// Nothing here is global: several `Remote`s can run side by side in one
// process, which is how the integration tests simulate a whole match.

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, trace, warn};
use skirmish_prng::SessionRng;
use skirmish_protocol::{EntityId, GameSettings, MAX_TEAM_COUNT, Message, Packet, TeamRoster};

use crate::clock::{Clock, SystemClock};
use crate::config::RemoteConfig;
use crate::error::{RemoteError, TransportError};
use crate::host::GameHost;
use crate::lobby::LobbyState;
use crate::registry::{Peer, PeerRegistry};
use crate::state::{DropReason, SessionState, TeamKind};
use crate::transport::{Transport, TransportRole};
use crate::udp::UdpTransport;

/// How a packet is addressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// To the single destination already in the packet's address table.
    Unicast,
    /// To every known node except the local one. Nothing is sent when there
    /// are no other nodes.
    Multicast,
    /// Transport-wide broadcast; any addresses in the table are cleared.
    Broadcast,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    Lobby,
    Connecting,
    InGame,
}

/// Counters of what the dispatcher did with incoming packets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    pub dropped_short: u64,
    pub unknown_type: u64,
    pub malformed: u64,
    pub bad_team: u64,
    pub unknown_unit: u64,
    pub handled: u64,
}

pub struct Remote {
    pub(crate) config: RemoteConfig,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) transport_role: Option<TransportRole>,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) rng: SessionRng,
    pub(crate) state: SessionState,
    pub(crate) nodes: PeerRegistry,
    pub(crate) hosts: PeerRegistry,
    pub(crate) clients: PeerRegistry,
    pub(crate) player_node: EntityId,
    pub(crate) host_node: EntityId,
    pub(crate) is_host: bool,
    pub(crate) is_network_game: bool,
    pub(crate) phase: SessionPhase,
    pub(crate) player_team: usize,
    pub(crate) lobby: LobbyState,
    pub(crate) last_ui_tick_ms: Option<u64>,
    pub(crate) stats: DispatchStats,
}

impl Remote {
    /// A session over UDP on `config.udp_port`. The socket is opened when
    /// the lobby or match starts.
    pub fn over_udp(config: RemoteConfig) -> Self {
        let transport = UdpTransport::from_config(&config);
        Self::new(config, Box::new(transport))
    }

    pub fn new(config: RemoteConfig, transport: Box<dyn Transport>) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self {
            config,
            transport,
            transport_role: None,
            clock: Box::new(SystemClock::new()),
            rng: SessionRng::new(seed),
            state: SessionState::default(),
            nodes: PeerRegistry::new(),
            hosts: PeerRegistry::new(),
            clients: PeerRegistry::new(),
            player_node: EntityId::NONE,
            host_node: EntityId::NONE,
            is_host: false,
            is_network_game: false,
            phase: SessionPhase::Idle,
            player_team: 0,
            lobby: LobbyState::default(),
            last_ui_tick_ms: None,
            stats: DispatchStats::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the session PRNG seed, for reproducible entity ids.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SessionRng::new(seed);
        self
    }

    // -- accessors --

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn nodes(&self) -> &PeerRegistry {
        &self.nodes
    }

    pub fn hosts(&self) -> &PeerRegistry {
        &self.hosts
    }

    pub fn clients(&self) -> &PeerRegistry {
        &self.clients
    }

    pub fn player_node(&self) -> EntityId {
        self.player_node
    }

    pub fn host_node(&self) -> EntityId {
        self.host_node
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn is_network_game(&self) -> bool {
        self.is_network_game
    }

    pub fn player_team(&self) -> usize {
        self.player_team
    }

    pub fn team_kind(&self, team: usize) -> TeamKind {
        self.state
            .teams
            .get(team)
            .map_or(TeamKind::None, |t| t.kind)
    }

    pub fn rng_seed(&self) -> u32 {
        self.state.rng_seed
    }

    pub fn roster(&self) -> &TeamRoster {
        &self.lobby.roster
    }

    pub fn settings(&self) -> &GameSettings {
        &self.lobby.settings
    }

    pub fn last_transport_error(&self) -> Option<String> {
        self.transport.last_error()
    }

    // -- transport --

    pub(crate) fn ensure_transport(&mut self, role: TransportRole) -> Result<(), RemoteError> {
        if self.transport_role == Some(role) {
            return Ok(());
        }
        if self.transport_role.is_some() {
            self.transport.deinit();
        }
        self.transport.init(role)?;
        self.transport_role = Some(role);
        Ok(())
    }

    pub(crate) fn shutdown_transport(&mut self) {
        if self.transport_role.take().is_some() {
            self.transport.deinit();
        }
    }

    /// Encode and send `message`.
    pub fn send(&mut self, message: &Message, delivery: Delivery) {
        self.transmit(message.encode(), delivery);
    }

    /// Encode `message` and unicast it to `address`.
    pub fn send_to(&mut self, message: &Message, address: SocketAddr) {
        let mut packet = message.encode();
        packet.add_address(address);
        self.transmit(packet, Delivery::Unicast);
    }

    /// Address `packet` per `delivery` and hand it to the transport.
    /// Transport failures are logged and remembered by the transport; they
    /// never abort the caller.
    pub fn transmit(&mut self, mut packet: Packet, delivery: Delivery) {
        match delivery {
            Delivery::Unicast => {
                if packet.address_count() != 1 {
                    let err = TransportError::BadDestinationCount(packet.address_count());
                    warn!("not sending packet type {:?}: {err}", packet.peek_type());
                    return;
                }
            }
            Delivery::Multicast => {
                packet.clear_address_table();
                for peer in self.nodes.iter() {
                    if peer.entity_id != self.player_node {
                        packet.add_address(peer.address);
                    }
                }
                if packet.address_count() == 0 {
                    return;
                }
            }
            Delivery::Broadcast => packet.clear_address_table(),
        }
        trace!(
            "send type {:?} origin {:?} to {} destination(s)",
            packet.peek_type(),
            packet.peek_origin(),
            packet.address_count()
        );
        if let Err(err) = self.transport.send(&packet) {
            warn!("send failed: {err}");
        }
    }

    // -- match setup --

    /// Derive team kinds from the lobby roster and reset all counters.
    /// Returns the number of remote teams.
    pub fn setup_players(&mut self) -> usize {
        self.state.reset();
        let now = self.now_ms();
        for team in 0..MAX_TEAM_COUNT {
            let node = self.lobby.roster.nodes[team];
            let kind = if !node.is_assigned() {
                TeamKind::None
            } else if node == self.player_node {
                self.player_team = team;
                TeamKind::Player
            } else {
                TeamKind::Remote
            };
            self.state.teams[team].kind = kind;
        }
        self.state.touch_all(now);
        self.state.reaction_token.team = self.first_live_team();
        let remote = self.state.remote_team_count();
        self.is_network_game = remote > 0;
        info!(
            "players set up: local team {}, {remote} remote team(s)",
            self.player_team
        );
        remote
    }

    /// Enter a match directly from a known roster, skipping the lobby.
    /// `nodes` must include the local player's node.
    pub fn start_with_roster(
        &mut self,
        player_node: EntityId,
        roster: TeamRoster,
        nodes: Vec<Peer>,
    ) -> Result<usize, RemoteError> {
        self.ensure_transport(TransportRole::Client)?;
        self.player_node = player_node;
        self.nodes.clear();
        for peer in nodes {
            if peer.is_host {
                self.host_node = peer.entity_id;
            }
            self.nodes.add(peer);
        }
        self.is_host = self.host_node == player_node;
        self.lobby.roster = roster;
        let remote = self.setup_players();
        self.phase = SessionPhase::InGame;
        Ok(remote)
    }

    /// Team seated by the node at `address`.
    pub(crate) fn team_at(&self, address: SocketAddr) -> Option<usize> {
        let node = self.nodes.find_by_address(address)?.entity_id;
        self.lobby.roster.nodes.iter().position(|&n| n == node)
    }

    pub(crate) fn is_host_address(&self, address: SocketAddr) -> bool {
        self.nodes
            .find_by_id(self.host_node)
            .is_some_and(|peer| peer.address == address)
    }

    fn first_live_team(&self) -> usize {
        self.state
            .teams
            .iter()
            .position(|t| matches!(t.kind, TeamKind::Player | TeamKind::Remote))
            .unwrap_or(0)
    }

    // -- drop policy --

    /// Remove `team` from the match. Only a live remote team transitions,
    /// and only once. While other remote teams remain it is eliminated and
    /// the shared seed is stepped so every survivor re-randomizes the same
    /// way; if it was the last one the match falls back to local play.
    pub fn drop_team(&mut self, host: &mut dyn GameHost, team: usize, reason: DropReason) {
        if self.team_kind(team) != TeamKind::Remote {
            return;
        }
        let others_remain = self
            .state
            .remote_teams()
            .any(|other| other != team);
        if others_remain {
            self.state.teams[team].kind = TeamKind::Eliminated;
            self.state.rng_seed = self.state.rng_seed.wrapping_add(1);
            warn!("team {team} eliminated from the match ({reason:?})");
            if !(reason == DropReason::Left && host.is_wrapping_up()) {
                host.on_team_dropped(team, reason);
            }
        } else {
            self.state.teams[team].kind = TeamKind::Disconnected;
            self.is_network_game = false;
            warn!("last remote team {team} disconnected ({reason:?}); continuing locally");
            if !(reason == DropReason::Left && host.is_wrapping_up()) {
                host.on_team_dropped(team, reason);
            }
            host.on_network_game_ended();
        }
        let node = self.lobby.roster.nodes[team];
        if node.is_assigned() && self.nodes.remove(node).is_some() {
            debug!("removed {node} from nodes");
        }
        if self.state.reaction_token.team == team {
            self.state.reaction_token.team = self.first_live_team();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedHost, loopback_remote, peer_at};
    use skirmish_protocol::MIN_PACKET_SIZE;

    fn roster(ids: &[u16]) -> TeamRoster {
        let mut roster = TeamRoster::default();
        for (slot, id) in ids.iter().enumerate() {
            roster.nodes[slot] = EntityId(*id);
            roster.names[slot] = format!("p{id}");
        }
        roster
    }

    fn three_team_remote() -> Remote {
        let (mut remote, _network) = loopback_remote();
        remote
            .start_with_roster(
                EntityId(11),
                roster(&[11, 12, 13]),
                vec![peer_at(1, 11, true), peer_at(2, 12, false), peer_at(3, 13, false)],
            )
            .unwrap();
        remote
    }

    #[test]
    fn setup_players_derives_kinds_from_roster() {
        let remote = three_team_remote();
        assert_eq!(remote.team_kind(0), TeamKind::Player);
        assert_eq!(remote.team_kind(1), TeamKind::Remote);
        assert_eq!(remote.team_kind(2), TeamKind::Remote);
        assert_eq!(remote.team_kind(3), TeamKind::None);
        assert!(remote.is_network_game());
        assert!(remote.is_host());
        assert_eq!(remote.phase(), SessionPhase::InGame);
    }

    #[test]
    fn drop_with_survivors_eliminates_and_steps_seed() {
        let mut remote = three_team_remote();
        let mut host = ScriptedHost::default();
        let seed = remote.rng_seed();

        remote.drop_team(&mut host, 1, DropReason::TimedOut);
        assert_eq!(remote.team_kind(1), TeamKind::Eliminated);
        assert_eq!(remote.rng_seed(), seed.wrapping_add(1));
        assert!(remote.is_network_game());
        assert_eq!(host.dropped, vec![(1, DropReason::TimedOut)]);
        assert!(!remote.nodes().contains(EntityId(12)));

        // A second drop of the same team changes nothing.
        remote.drop_team(&mut host, 1, DropReason::TimedOut);
        assert_eq!(remote.rng_seed(), seed.wrapping_add(1));
        assert_eq!(host.dropped.len(), 1);
    }

    #[test]
    fn dropping_the_last_remote_team_goes_offline() {
        let mut remote = three_team_remote();
        let mut host = ScriptedHost::default();
        remote.drop_team(&mut host, 1, DropReason::TimedOut);
        let seed = remote.rng_seed();
        remote.drop_team(&mut host, 2, DropReason::TimedOut);
        assert_eq!(remote.team_kind(2), TeamKind::Disconnected);
        assert!(!remote.is_network_game());
        assert_eq!(remote.rng_seed(), seed);
        assert_eq!(host.network_game_ended, 1);
    }

    #[test]
    fn voluntary_leave_while_wrapping_up_is_silent_but_applied() {
        let mut remote = three_team_remote();
        let mut host = ScriptedHost {
            wrapping_up: true,
            ..ScriptedHost::default()
        };
        remote.drop_team(&mut host, 2, DropReason::Left);
        assert_eq!(remote.team_kind(2), TeamKind::Eliminated);
        assert!(host.dropped.is_empty());
    }

    #[test]
    fn player_and_empty_slots_are_never_dropped() {
        let mut remote = three_team_remote();
        let mut host = ScriptedHost::default();
        remote.drop_team(&mut host, 0, DropReason::TimedOut);
        remote.drop_team(&mut host, 3, DropReason::TimedOut);
        assert_eq!(remote.team_kind(0), TeamKind::Player);
        assert_eq!(remote.team_kind(3), TeamKind::None);
        assert!(host.dropped.is_empty());
    }

    #[test]
    fn unicast_without_destination_is_not_sent() {
        let (mut remote, network) = loopback_remote();
        let mut observer = network.endpoint();
        observer.init(TransportRole::Client).unwrap();
        remote.ensure_transport(TransportRole::Client).unwrap();

        remote.send(&Message::EndTurn { team: 0 }, Delivery::Unicast);
        assert!(observer.receive().unwrap().is_none());

        remote.send(&Message::EndTurn { team: 0 }, Delivery::Broadcast);
        let packet = observer.receive().unwrap().unwrap();
        assert!(packet.len() >= MIN_PACKET_SIZE);
    }

    #[test]
    fn multicast_with_no_other_nodes_sends_nothing() {
        let (mut remote, network) = loopback_remote();
        let mut observer = network.endpoint();
        observer.init(TransportRole::Client).unwrap();
        remote.ensure_transport(TransportRole::Client).unwrap();
        remote.send(&Message::EndTurn { team: 0 }, Delivery::Multicast);
        assert!(observer.receive().unwrap().is_none());
    }
}
