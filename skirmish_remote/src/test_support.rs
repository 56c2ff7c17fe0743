// Scripted game host and session builders for unit tests.
//
// `ScriptedHost` records every callback it receives so tests can assert on
// them; with a `ManualClock` attached, each `process_tick` moves time forward,
// which lets blocking waits run into their timeouts without sleeping.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use skirmish_protocol::{
    DesyncSnapshot, EntityId, OrderPayload, TeamEconomy, TeamRoster, UnitAttributes, UnitId,
    UnitPath,
};

use crate::cancel::CancellationToken;
use crate::clock::ManualClock;
use crate::config::RemoteConfig;
use crate::host::{GameHost, RemoteUnit, UnitList};
use crate::registry::Peer;
use crate::remote::Remote;
use crate::state::DropReason;
use crate::transport::LoopbackNetwork;

#[derive(Debug, Default)]
pub(crate) struct ScriptedUnit {
    pub(crate) payload: OrderPayload,
    pub(crate) snapshot: DesyncSnapshot,
    pub(crate) mining_station: bool,
    pub(crate) base_values: Option<UnitAttributes>,
    pub(crate) name: String,
    pub(crate) path: Option<UnitPath>,
    pub(crate) state: Vec<u8>,
    pub(crate) stopped: bool,
    pub(crate) blocked: bool,
}

impl RemoteUnit for ScriptedUnit {
    fn order_payload(&self) -> OrderPayload {
        self.payload.clone()
    }

    fn apply_order_payload(&mut self, payload: &OrderPayload) {
        self.payload = payload.clone();
    }

    fn desync_snapshot(&self) -> DesyncSnapshot {
        self.snapshot.clone()
    }

    fn apply_base_values(&mut self, values: &UnitAttributes) {
        self.base_values = Some(*values);
    }

    fn apply_state(&mut self, data: &[u8]) {
        self.state = data.to_vec();
    }

    fn apply_path(&mut self, path: &UnitPath) {
        self.path = Some(path.clone());
    }

    fn set_path_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn emergency_stop(&mut self) {
        self.stopped = true;
    }

    fn is_mining_station(&self) -> bool {
        self.mining_station
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedHost {
    pub(crate) units: HashMap<UnitId, ScriptedUnit>,
    pub(crate) lists: HashMap<UnitList, Vec<UnitId>>,
    pub(crate) frame_sync_disabled: bool,
    pub(crate) wrapping_up: bool,
    pub(crate) clock: Option<ManualClock>,
    pub(crate) tick_ms: u64,
    /// Cancel the token once this many ticks have run.
    pub(crate) cancel_after: Option<(u64, CancellationToken)>,
    pub(crate) ticks: u64,
    pub(crate) messages: Vec<String>,
    pub(crate) saves: Vec<(String, String)>,
    pub(crate) pending: Vec<usize>,
    pub(crate) dropped: Vec<(usize, DropReason)>,
    pub(crate) network_game_ended: usize,
    pub(crate) economies: Vec<(usize, TeamEconomy)>,
    pub(crate) chats: Vec<(usize, String)>,
}

impl ScriptedHost {
    /// A host whose every tick advances `clock` by `tick_ms`.
    pub(crate) fn ticking(clock: ManualClock, tick_ms: u64) -> Self {
        Self {
            clock: Some(clock),
            tick_ms,
            ..Self::default()
        }
    }
}

impl GameHost for ScriptedHost {
    fn process_tick(&mut self) {
        self.ticks += 1;
        if let Some(clock) = &self.clock {
            clock.advance(self.tick_ms);
        }
        let ticks = self.ticks;
        if let Some((_, token)) = self.cancel_after.as_ref().filter(|(after, _)| ticks >= *after) {
            token.cancel();
        }
    }

    fn unit(&mut self, id: UnitId) -> Option<&mut dyn RemoteUnit> {
        self.units
            .get_mut(&id)
            .map(|unit| unit as &mut dyn RemoteUnit)
    }

    fn unit_ids(&self, list: UnitList) -> Vec<UnitId> {
        self.lists.get(&list).cloned().unwrap_or_default()
    }

    fn frame_sync_enabled(&self) -> bool {
        !self.frame_sync_disabled
    }

    fn is_wrapping_up(&self) -> bool {
        self.wrapping_up
    }

    fn show_message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn debug_save(&mut self, file_name: &str, title: &str) {
        self.saves.push((file_name.to_string(), title.to_string()));
    }

    fn on_peer_pending(&mut self, team: usize) {
        self.pending.push(team);
    }

    fn on_team_dropped(&mut self, team: usize, reason: DropReason) {
        self.dropped.push((team, reason));
    }

    fn on_network_game_ended(&mut self) {
        self.network_game_ended += 1;
    }

    fn apply_team_economy(&mut self, team: usize, economy: TeamEconomy) {
        self.economies.push((team, economy));
    }

    fn show_chat(&mut self, team: usize, text: &str) {
        self.chats.push((team, text.to_string()));
    }
}

/// A fresh session on its own loopback network.
pub(crate) fn loopback_remote() -> (Remote, LoopbackNetwork) {
    let network = LoopbackNetwork::new();
    let remote = Remote::new(RemoteConfig::default(), Box::new(network.endpoint())).with_seed(7);
    (remote, network)
}

/// A fresh session named `name` attached to `network`.
pub(crate) fn lobby_remote(network: &LoopbackNetwork, name: &str) -> Remote {
    let config = RemoteConfig {
        player_name: name.to_string(),
        ..RemoteConfig::default()
    };
    let seed = name.bytes().fold(17_u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    Remote::new(config, Box::new(network.endpoint())).with_seed(seed)
}

/// A peer at an address no endpoint owns; whatever is sent there is lost.
pub(crate) fn peer_at(n: u16, id: u16, is_host: bool) -> Peer {
    Peer {
        address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50_000 + n),
        entity_id: EntityId(id),
        name: format!("peer{n}"),
        is_host,
    }
}

/// The hosting player on team 0 (node 11) in a match of `teams` teams,
/// the others silent remote peers (nodes 12..).
pub(crate) fn in_game_remote(teams: usize) -> (Remote, LoopbackNetwork) {
    in_game_remote_with_clock(teams, ManualClock::new(0))
}

pub(crate) fn in_game_remote_with_clock(
    teams: usize,
    clock: ManualClock,
) -> (Remote, LoopbackNetwork) {
    seated_remote(teams, 0, clock)
}

/// A non-hosting player on team 1 (node 12); the host is node 11 on team 0
/// and every other team is a silent remote peer.
pub(crate) fn peer_remote_with_clock(
    teams: usize,
    clock: ManualClock,
) -> (Remote, LoopbackNetwork) {
    seated_remote(teams, 1, clock)
}

/// Team `t` belongs to node `11 + t` and node 11 hosts. The local session
/// sits on team `seat`; the rest live at addresses nobody owns.
fn seated_remote(teams: usize, seat: usize, clock: ManualClock) -> (Remote, LoopbackNetwork) {
    let network = LoopbackNetwork::new();
    let endpoint = network.endpoint();
    let own_id = EntityId(11 + seat as u16);
    let mut roster = TeamRoster::default();
    let mut nodes = vec![Peer {
        address: endpoint.address(),
        entity_id: own_id,
        name: "local".into(),
        is_host: seat == 0,
    }];
    for team in 0..teams {
        let id = 11 + team as u16;
        roster.nodes[team] = EntityId(id);
        roster.names[team] = format!("team{team}");
        if team != seat {
            nodes.push(peer_at(team as u16, id, team == 0));
        }
    }
    let mut remote = Remote::new(RemoteConfig::default(), Box::new(endpoint))
        .with_seed(3)
        .with_clock(clock);
    remote
        .start_with_roster(own_id, roster, nodes)
        .expect("loopback start");
    (remote, network)
}

/// `teams` sessions on one loopback network, each seated on its own team
/// (node `11 + team`) and all knowing each other. Team 0 hosts.
pub(crate) fn connected_sessions(teams: usize) -> (Vec<Remote>, LoopbackNetwork) {
    let network = LoopbackNetwork::new();
    let endpoints: Vec<_> = (0..teams).map(|_| network.endpoint()).collect();
    let mut roster = TeamRoster::default();
    let peers: Vec<Peer> = endpoints
        .iter()
        .enumerate()
        .map(|(team, endpoint)| {
            let id = EntityId(11 + team as u16);
            roster.nodes[team] = id;
            roster.names[team] = format!("team{team}");
            Peer {
                address: endpoint.address(),
                entity_id: id,
                name: format!("team{team}"),
                is_host: team == 0,
            }
        })
        .collect();
    let sessions = endpoints
        .into_iter()
        .enumerate()
        .map(|(team, endpoint)| {
            let mut remote =
                Remote::new(RemoteConfig::default(), Box::new(endpoint)).with_seed(team as u64);
            remote
                .start_with_roster(EntityId(11 + team as u16), roster.clone(), peers.clone())
                .expect("loopback start");
            remote
        })
        .collect();
    (sessions, network)
}
