// Lobby and session lifecycle.
//
// Phases: `Idle -> Lobby -> Connecting -> InGame`, back to `Idle` on leave.
//
// Handshake (client C, host H):
//   C: register_lobby(false)  -> broadcast 28 Discover {version}
//   H: on 28 (matching version) -> remember C in `clients`, unicast 44
//   C: on 44 (matching version)  -> add H to `hosts`, HostFound event
//   C: join_host(H)             -> unicast 29 Register {version, name}
//   H: on 29 addressed to H      -> fresh entity id, add C to `nodes`,
//                                  unicast 30 {id, roster, nodes, settings}
//   C: on 30                    -> adopt id, host, roster, nodes, settings
// A peer with a different protocol version is ignored silently at every step,
// so it never gets a registration reply.
//
// A freshly registered client announces its name (36) to every node in the
// list it received, and in the lobby every peer announces its slot (35) and
// name changes (36) to all known nodes; a node first heard of this way is
// added with the packet's source address. The host mirrors settings (37). `setup_connection` starts the
// match: the host sends 32 until every remote player answered 05, then sends
// 34; a client without a team slot drops out of the lobby on 32.
//
// Also here: `leave_game` (07/48 with the delayed-reaction token handoff),
// `wait_mission_supplies` (12/13/42) and `check_unpause_event` (40).

use std::collections::BTreeSet;
use std::net::SocketAddr;

use log::{debug, info, warn};
use skirmish_protocol::{EntityId, GameSettings, MAX_TEAM_COUNT, Message, TeamRoster, team_index};

use crate::cancel::CancellationToken;
use crate::error::RemoteError;
use crate::host::GameHost;
use crate::registry::Peer;
use crate::remote::{Delivery, Remote, SessionPhase};
use crate::state::{SessionState, TeamKind};
use crate::transport::TransportRole;

/// Something the lobby UI should show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LobbyEvent {
    HostFound { host: EntityId, name: String },
    /// The host accepted our registration and assigned `node`.
    Joined { node: EntityId, host: EntityId },
    NodeJoined { node: EntityId, name: String },
    NodeLeft { node: EntityId },
    /// The host closed its lobby.
    HostLeft,
    Chat { from: Option<EntityId>, text: String },
    SlotChanged { team: usize, node: EntityId, ready: bool },
    NameChanged { node: EntityId, name: String },
    SettingsChanged,
    /// The host started the match and we have a seat.
    GameStarting,
    /// The host started the match without us.
    NotSeated,
    Connected,
}

#[derive(Debug, Default)]
pub(crate) struct LobbyState {
    pub(crate) roster: TeamRoster,
    pub(crate) ready: [bool; MAX_TEAM_COUNT],
    pub(crate) settings: GameSettings,
    /// Host we sent a registration to and have not heard back from.
    pub(crate) pending_host: Option<EntityId>,
    /// Addresses that acknowledged the match start (host side).
    pub(crate) start_acks: BTreeSet<SocketAddr>,
    pub(crate) connected: bool,
    pub(crate) events: Vec<LobbyEvent>,
}

impl LobbyState {
    fn clear_node(&mut self, node: EntityId) {
        for team in 0..MAX_TEAM_COUNT {
            if self.roster.nodes[team] == node {
                self.roster.nodes[team] = EntityId::NONE;
                self.roster.names[team].clear();
                self.ready[team] = false;
            }
        }
    }
}

impl Remote {
    // -----------------------------------------------------------------------
    // Lobby operations
    // -----------------------------------------------------------------------

    /// Open a lobby. A host waits for clients; a client starts looking for
    /// hosts right away.
    pub fn register_lobby(&mut self, as_host: bool) -> Result<(), RemoteError> {
        let role = if as_host {
            TransportRole::Host
        } else {
            TransportRole::Client
        };
        self.ensure_transport(role)?;
        self.nodes.clear();
        self.hosts.clear();
        self.clients.clear();
        self.state = SessionState::default();
        self.lobby = LobbyState::default();
        self.is_host = as_host;
        self.is_network_game = false;
        self.player_node = self.nodes.generate_id(&mut self.rng);
        self.phase = SessionPhase::Lobby;
        if as_host {
            self.host_node = self.player_node;
            if let Some(address) = self.transport.local_address() {
                self.nodes.add(Peer {
                    address,
                    entity_id: self.player_node,
                    name: self.config.player_name.clone(),
                    is_host: true,
                });
            }
            info!("hosting lobby as {}", self.player_node);
        } else {
            self.host_node = EntityId::NONE;
            info!("looking for lobbies as {}", self.player_node);
            self.discover_hosts();
        }
        Ok(())
    }

    /// Broadcast a discovery request (packet 28).
    pub fn discover_hosts(&mut self) {
        let message = Message::Discover {
            from: self.player_node,
            protocol_version: self.config.protocol_version,
        };
        self.send(&message, Delivery::Broadcast);
    }

    /// Ask a discovered host for a place in its lobby (packet 29).
    pub fn join_host(&mut self, host: EntityId) -> Result<(), RemoteError> {
        if self.phase != SessionPhase::Lobby || self.is_host {
            return Err(RemoteError::NotInLobby);
        }
        let address = self
            .hosts
            .find_by_id(host)
            .map(|peer| peer.address)
            .ok_or(RemoteError::UnknownHost(host))?;
        self.lobby.pending_host = Some(host);
        let message = Message::Register {
            host,
            protocol_version: self.config.protocol_version,
            name: self.config.player_name.clone(),
        };
        self.send_to(&message, address);
        Ok(())
    }

    /// Take `team` in the lobby and tell everyone (packet 35).
    pub fn claim_team_slot(&mut self, team: usize, ready: bool) -> Result<(), RemoteError> {
        if self.phase != SessionPhase::Lobby || !self.host_node.is_assigned() {
            return Err(RemoteError::NotInLobby);
        }
        if team >= MAX_TEAM_COUNT {
            return Err(RemoteError::BadTeamSlot(team));
        }
        let taken = self.lobby.roster.nodes[team];
        if taken.is_assigned() && taken != self.player_node {
            return Err(RemoteError::BadTeamSlot(team));
        }
        let name = self.config.player_name.clone();
        self.set_slot(team, self.player_node, ready, name.clone());
        let message = Message::TeamSlot {
            host: self.host_node,
            node: self.player_node,
            team: team as u16,
            ready,
            name,
        };
        self.send(&message, Delivery::Multicast);
        Ok(())
    }

    /// Rename the local player (packet 36).
    pub fn send_player_name(&mut self, name: &str) {
        self.config.player_name = name.to_string();
        let node = self.player_node;
        if let Some(peer) = self.nodes.find_by_id_mut(node) {
            peer.name = name.to_string();
        }
        self.rename_slots(node, name);
        let message = Message::PlayerName {
            node,
            name: name.to_string(),
        };
        self.send(&message, Delivery::Multicast);
    }

    /// Lobby chat line (packet 33).
    pub fn send_lobby_chat(&mut self, text: &str) {
        let message = Message::LobbyChat {
            host: self.host_node,
            text: text.to_string(),
        };
        self.send(&message, Delivery::Multicast);
    }

    /// Host only: change and mirror the game settings (packet 37).
    pub fn send_game_settings(&mut self, settings: GameSettings) -> Result<(), RemoteError> {
        if self.phase != SessionPhase::Lobby || !self.is_host {
            return Err(RemoteError::NotInLobby);
        }
        self.lobby.settings = settings.clone();
        let message = Message::Settings {
            host: self.player_node,
            settings,
        };
        self.send(&message, Delivery::Multicast);
        Ok(())
    }

    /// Leave the lobby (packet 31) and close the transport.
    pub fn leave_lobby(&mut self) {
        if self.phase == SessionPhase::Idle {
            return;
        }
        self.send(
            &Message::LeaveLobby {
                node: self.player_node,
            },
            Delivery::Multicast,
        );
        info!("left the lobby");
        self.go_idle();
        self.shutdown_transport();
    }

    pub fn drain_lobby_events(&mut self) -> Vec<LobbyEvent> {
        std::mem::take(&mut self.lobby.events)
    }

    pub fn team_ready(&self, team: usize) -> bool {
        self.lobby.ready.get(team).copied().unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    // Match start
    // -----------------------------------------------------------------------

    /// Move from the lobby into the match. The host derives the teams, sends
    /// the start signal until every remote player acknowledged it and then
    /// confirms the connection; a client waits for that confirmation.
    /// Returns the number of remote teams.
    pub fn setup_connection(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
    ) -> Result<usize, RemoteError> {
        if self.is_host {
            self.host_connection(host, cancel)?;
        } else {
            self.client_connection(host, cancel)?;
        }
        self.state.touch_all(self.clock.now_ms());
        self.phase = SessionPhase::InGame;
        let remote = self.state.remote_team_count();
        info!("match connected with {remote} remote team(s)");
        Ok(remote)
    }

    fn host_connection(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError> {
        if self.phase != SessionPhase::Lobby && self.phase != SessionPhase::Connecting {
            return Err(RemoteError::NotInLobby);
        }
        let remote = self.setup_players();
        self.phase = SessionPhase::Connecting;
        self.lobby.start_acks.clear();
        let start = Message::StartGame {
            host: self.player_node,
        };
        let mut last_sent: Option<u64> = None;
        loop {
            let now = self.now_ms();
            if last_sent.is_none_or(|sent| now.saturating_sub(sent) >= self.config.ping_period_ms)
            {
                self.send(&start, Delivery::Multicast);
                last_sent = Some(now);
            }
            self.process_incoming(host);
            if self.lobby.start_acks.len() >= remote {
                break;
            }
            if cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            host.process_tick();
        }
        self.send(
            &Message::ConnectionEstablished {
                host: self.player_node,
            },
            Delivery::Multicast,
        );
        self.lobby.connected = true;
        Ok(())
    }

    fn client_connection(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError> {
        loop {
            self.process_incoming(host);
            if self.lobby.connected {
                return Ok(());
            }
            if self.phase == SessionPhase::Idle {
                return Err(RemoteError::NotInLobby);
            }
            if cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            host.process_tick();
        }
    }

    // -----------------------------------------------------------------------
    // In-match lifecycle
    // -----------------------------------------------------------------------

    /// Leave a running match. The delayed-reaction token is handed on if the
    /// leaving team holds it, packet 07 is sent, and acknowledgements are
    /// awaited for at most `leave_timeout_ms`. Cancelling only cuts the wait
    /// short; the match is left either way.
    pub fn leave_game(
        &mut self,
        host: &mut dyn GameHost,
        team: usize,
        dropped: bool,
        cancel: &CancellationToken,
    ) {
        if team >= MAX_TEAM_COUNT {
            warn!("leave_game for invalid team {team}");
            return;
        }
        self.hand_off_reaction_token();

        let own = &mut self.state.teams[team];
        own.leave_request_id = own.leave_request_id.wrapping_add(1);
        let request_id = own.leave_request_id;
        let baseline: Vec<u8> = self.state.teams.iter().map(|t| t.leave_request_id).collect();
        self.send(
            &Message::LeaveRequest {
                team: team as u16,
                request_id,
                dropped,
            },
            Delivery::Multicast,
        );

        let start = self.now_ms();
        while self.is_network_game {
            self.process_incoming(host);
            let unanswered = self
                .state
                .remote_teams()
                .any(|t| self.state.teams[t].leave_request_id == baseline[t]);
            let expired = self.now_ms().saturating_sub(start) >= self.config.leave_timeout_ms;
            if !unanswered || expired || cancel.is_cancelled() {
                break;
            }
            host.process_tick();
        }
        info!("left the match (team {team}, dropped: {dropped})");
        self.is_network_game = false;
        self.phase = SessionPhase::Idle;
    }

    fn hand_off_reaction_token(&mut self) {
        let token = self.state.reaction_token;
        if self.team_kind(token.team) == TeamKind::Remote {
            return;
        }
        let next = (1..MAX_TEAM_COUNT)
            .map(|step| (token.team + step) % MAX_TEAM_COUNT)
            .find(|&t| self.team_kind(t) == TeamKind::Remote);
        let Some(next) = next else {
            return;
        };
        let counter = token.counter.wrapping_add(1);
        self.state.reaction_token.team = next;
        self.state.reaction_token.active = false;
        self.state.reaction_token.counter = counter;
        debug!("handing reaction token to team {next}");
        self.send(
            &Message::ReactionToken {
                team: next as u16,
                active: false,
                counter,
            },
            Delivery::Multicast,
        );
    }

    /// Site selection: wait until every remote team sent its mission
    /// supplies, then agree on the session seed. The host picks it and
    /// repeats packet 13 every ping period until each remote team has sent
    /// it back; clients return once they hold it. Cancelling withdraws the
    /// local supplies (packet 42).
    pub fn wait_mission_supplies(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
    ) -> Result<u32, RemoteError> {
        let mut seed_sent: Option<u64> = None;
        let mut confirm_start: Option<u64> = None;
        loop {
            self.process_incoming(host);
            if !self.is_network_game {
                return Ok(self.state.rng_seed);
            }
            let all_in = self
                .state
                .remote_teams()
                .all(|t| self.state.teams[t].supplies_received);
            if all_in && self.is_host {
                if !self.state.seed_received {
                    self.pick_session_seed();
                }
                let now = self.now_ms();
                if seed_sent
                    .is_none_or(|sent| now.saturating_sub(sent) >= self.config.ping_period_ms)
                {
                    let seed = self.state.rng_seed;
                    self.send(&Message::RngSeed { seed }, Delivery::Multicast);
                    seed_sent = Some(now);
                }
                let start = *confirm_start.get_or_insert(now);
                let waiting = self.await_remote_teams(host, start, |state, team| {
                    !state.teams[team].seed_acked
                });
                if !waiting {
                    return Ok(self.state.rng_seed);
                }
            } else if all_in && self.state.seed_received {
                return Ok(self.state.rng_seed);
            }
            if cancel.is_cancelled() {
                self.send(
                    &Message::ClearSupplies {
                        team: self.player_team as u16,
                    },
                    Delivery::Multicast,
                );
                return Err(RemoteError::Cancelled);
            }
            host.process_tick();
        }
    }

    fn pick_session_seed(&mut self) {
        let seed = self.rng.next_u32();
        info!("session seed {seed}");
        self.state.rng_seed = seed;
        self.state.seed_received = true;
        self.state.pending_notified = 0;
        for team in &mut self.state.teams {
            team.seed_acked = false;
        }
    }

    /// Drain packets and report whether a peer unpaused the game (packet 40).
    pub fn check_unpause_event(&mut self, host: &mut dyn GameHost) -> bool {
        self.process_incoming(host);
        std::mem::take(&mut self.state.unpause_event)
    }

    /// Shut the session down completely.
    pub fn deinit(&mut self) {
        self.go_idle();
        self.shutdown_transport();
    }

    fn go_idle(&mut self) {
        self.phase = SessionPhase::Idle;
        self.is_network_game = false;
        self.host_node = EntityId::NONE;
        self.nodes.clear();
        self.hosts.clear();
        self.clients.clear();
        self.lobby.roster = TeamRoster::default();
        self.lobby.ready = [false; MAX_TEAM_COUNT];
        self.lobby.pending_host = None;
        self.lobby.connected = false;
    }

    // -----------------------------------------------------------------------
    // Incoming lobby traffic
    // -----------------------------------------------------------------------

    pub(crate) fn handle_lobby(&mut self, message: Message, source: Option<SocketAddr>) {
        match message {
            Message::Discover {
                from,
                protocol_version,
            } => {
                if self.phase != SessionPhase::Lobby || !self.is_host {
                    return;
                }
                if protocol_version != self.config.protocol_version {
                    debug!("ignoring discovery from {from}: protocol {protocol_version:#x}");
                    return;
                }
                let Some(address) = source else {
                    return;
                };
                self.clients.add(Peer {
                    address,
                    entity_id: from,
                    name: String::new(),
                    is_host: false,
                });
                let reply = Message::HostAnnounce {
                    host: self.player_node,
                    protocol_version: self.config.protocol_version,
                    name: self.config.player_name.clone(),
                };
                self.send_to(&reply, address);
            }
            Message::HostAnnounce {
                host,
                protocol_version,
                name,
            } => {
                if self.phase != SessionPhase::Lobby || self.is_host || self.hosts.contains(host) {
                    return;
                }
                if protocol_version != self.config.protocol_version {
                    debug!("ignoring host {host}: protocol {protocol_version:#x}");
                    return;
                }
                let Some(address) = source else {
                    return;
                };
                info!("found host {host} ({name}) at {address}");
                self.hosts.add(Peer {
                    address,
                    entity_id: host,
                    name: name.clone(),
                    is_host: true,
                });
                self.lobby.events.push(LobbyEvent::HostFound { host, name });
            }
            Message::Register {
                host,
                protocol_version,
                name,
            } => {
                if self.phase != SessionPhase::Lobby || !self.is_host || host != self.player_node {
                    return;
                }
                if protocol_version != self.config.protocol_version {
                    debug!("ignoring registration: protocol {protocol_version:#x}");
                    return;
                }
                let Some(address) = source else {
                    return;
                };
                // A repeated registration from the same address keeps its id.
                let node = match self.nodes.find_by_address(address) {
                    Some(known) => known.entity_id,
                    None => self.nodes.generate_id(&mut self.rng),
                };
                self.nodes.add(Peer {
                    address,
                    entity_id: node,
                    name: name.clone(),
                    is_host: false,
                });
                info!("{name} joined the lobby as {node}");
                let reply = Message::RegisterAccept {
                    client: node,
                    host: self.player_node,
                    roster: self.lobby.roster.clone(),
                    nodes: self.nodes.to_records(),
                    settings: self.lobby.settings.clone(),
                };
                self.send_to(&reply, address);
                self.lobby.events.push(LobbyEvent::NodeJoined { node, name });
            }
            Message::RegisterAccept {
                client,
                host,
                roster,
                nodes,
                settings,
            } => {
                if self.phase != SessionPhase::Lobby
                    || self.is_host
                    || self.lobby.pending_host != Some(host)
                {
                    return;
                }
                self.player_node = client;
                self.host_node = host;
                self.lobby.pending_host = None;
                self.lobby.roster = roster;
                self.lobby.settings = settings;
                self.nodes.clear();
                for record in nodes {
                    let mut peer = Peer::from(record);
                    // The host may only know itself by a wildcard address.
                    if let Some(address) = source.filter(|_| peer.entity_id == host) {
                        peer.address = address;
                    }
                    self.nodes.add(peer);
                }
                info!("joined lobby of {host} as {client}");
                self.lobby.events.push(LobbyEvent::Joined { node: client, host });
                // Introduce ourselves to the clients that joined earlier.
                let hello = Message::PlayerName {
                    node: client,
                    name: self.config.player_name.clone(),
                };
                self.send(&hello, Delivery::Multicast);
            }
            Message::LeaveLobby { node } => {
                if self.phase != SessionPhase::Lobby {
                    return;
                }
                if node == self.host_node && !self.is_host {
                    info!("host {node} closed the lobby");
                    self.go_idle();
                    self.phase = SessionPhase::Lobby;
                    self.lobby.events.push(LobbyEvent::HostLeft);
                    return;
                }
                self.nodes.remove(node);
                self.clients.remove(node);
                self.hosts.remove(node);
                self.lobby.clear_node(node);
                self.lobby.events.push(LobbyEvent::NodeLeft { node });
            }
            Message::TeamSlot {
                host,
                node,
                team,
                ready,
                name,
            } => {
                if self.phase != SessionPhase::Lobby || host != self.host_node {
                    return;
                }
                let Some(team) = team_index(team) else {
                    self.stats.bad_team += 1;
                    return;
                };
                self.learn_node(node, &name, source);
                self.set_slot(team, node, ready, name);
            }
            Message::PlayerName { node, name } => {
                if self.phase != SessionPhase::Lobby {
                    return;
                }
                if let Some(found) = self.hosts.find_by_id_mut(node) {
                    found.name = name.clone();
                }
                self.learn_node(node, &name, source);
                self.rename_slots(node, &name);
                self.lobby.events.push(LobbyEvent::NameChanged { node, name });
            }
            Message::LobbyChat { host, text } => {
                if self.phase != SessionPhase::Lobby || host != self.host_node {
                    return;
                }
                let from = source
                    .and_then(|address| self.nodes.find_by_address(address))
                    .map(|peer| peer.entity_id);
                self.lobby.events.push(LobbyEvent::Chat { from, text });
            }
            Message::Settings { host, settings } => {
                if self.phase != SessionPhase::Lobby || host != self.host_node || self.is_host {
                    return;
                }
                self.lobby.settings = settings;
                self.lobby.events.push(LobbyEvent::SettingsChanged);
            }
            Message::StartGame { host } => self.on_start_game(host),
            Message::StartAck { host } => {
                let expected = self.is_host
                    && host == self.player_node
                    && self.phase == SessionPhase::Connecting;
                if let Some(address) = source.filter(|_| expected) {
                    self.lobby.start_acks.insert(address);
                }
            }
            Message::ConnectionEstablished { host } => {
                if !self.is_host && host == self.host_node && self.phase == SessionPhase::Connecting
                {
                    self.lobby.connected = true;
                    self.lobby.events.push(LobbyEvent::Connected);
                }
            }
            other => warn!("{:?} routed to the lobby", other.kind()),
        }
    }

    fn on_start_game(&mut self, host: EntityId) {
        if self.is_host
            || !matches!(self.phase, SessionPhase::Lobby | SessionPhase::Connecting)
        {
            return;
        }
        if host != self.host_node {
            // Another lobby started without us.
            self.hosts.remove(host);
            self.nodes.remove(host);
            return;
        }
        if self.phase == SessionPhase::Lobby {
            let seated = self.lobby.roster.nodes.contains(&self.player_node);
            if !seated {
                info!("match started without a seat for {}", self.player_node);
                self.go_idle();
                self.phase = SessionPhase::Lobby;
                self.lobby.events.push(LobbyEvent::NotSeated);
                return;
            }
            self.setup_players();
            self.phase = SessionPhase::Connecting;
            self.lobby.events.push(LobbyEvent::GameStarting);
        }
        // The start signal is repeated until acknowledged; answer each one.
        if let Some(address) = self.nodes.find_by_id(host).map(|peer| peer.address) {
            self.send_to(&Message::StartAck { host }, address);
        }
    }

    fn set_slot(&mut self, team: usize, node: EntityId, ready: bool, name: String) {
        self.lobby.clear_node(node);
        self.lobby.roster.nodes[team] = node;
        self.lobby.roster.names[team] = name;
        self.lobby.ready[team] = ready;
        self.lobby
            .events
            .push(LobbyEvent::SlotChanged { team, node, ready });
    }

    fn rename_slots(&mut self, node: EntityId, name: &str) {
        for team in 0..MAX_TEAM_COUNT {
            if self.lobby.roster.nodes[team] == node {
                self.lobby.roster.names[team] = name.to_string();
            }
        }
    }

    /// Add a node first heard of through its own lobby traffic.
    fn learn_node(&mut self, node: EntityId, name: &str, source: Option<SocketAddr>) {
        if node == self.player_node {
            return;
        }
        if let Some(known) = self.nodes.find_by_id_mut(node) {
            known.name = name.to_string();
            return;
        }
        let Some(address) = source else {
            return;
        };
        debug!("learned {node} at {address}");
        self.nodes.add(Peer {
            address,
            entity_id: node,
            name: name.to_string(),
            is_host: node == self.host_node,
        });
        self.lobby.events.push(LobbyEvent::NodeJoined {
            node,
            name: name.to_string(),
        });
    }
}
