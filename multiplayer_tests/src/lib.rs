// Test-only peers for multi-session integration tests.
//
// Wraps a real `Remote` (from `skirmish_remote`) and a minimal `GameHost`
// to provide a synchronous, test-friendly API for exercising the whole
// protocol: discovery -> registration -> team slots -> match start ->
// barriers -> checksum -> desync analysis -> leave.
//
// Every peer gets its own endpoint on a shared in-process `LoopbackNetwork`.
// The lobby is formed on the test thread by pumping all peers round-robin;
// the blocking phases then run on one thread per peer (`run_parallel`),
// exactly as separate game processes would. `TestHost::process_tick` sleeps
// briefly so those waits do not spin.
//
// See also: `tests/lockstep.rs` for the scenarios.

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use skirmish_protocol::{DesyncSnapshot, OrderPayload, UnitId};
use skirmish_remote::{
    CancellationToken, DropReason, GameHost, LoopbackNetwork, Remote, RemoteConfig, RemoteUnit,
    UnitList,
};

/// Default timeout for blocking poll operations.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A unit that only carries what the protocol looks at.
#[derive(Debug, Default)]
pub struct TestUnit {
    pub orders: OrderPayload,
    pub snapshot: DesyncSnapshot,
}

impl RemoteUnit for TestUnit {
    fn order_payload(&self) -> OrderPayload {
        self.orders.clone()
    }

    fn apply_order_payload(&mut self, payload: &OrderPayload) {
        self.orders = payload.clone();
    }

    fn desync_snapshot(&self) -> DesyncSnapshot {
        self.snapshot.clone()
    }
}

/// Game side of a test peer. All units live in the stationary list.
#[derive(Debug, Default)]
pub struct TestHost {
    pub units: BTreeMap<UnitId, TestUnit>,
    pub dropped: Vec<(usize, DropReason)>,
    pub network_game_ended: bool,
    pub debug_saves: usize,
    pub messages: Vec<String>,
}

impl TestHost {
    pub fn add_unit(&mut self, id: u16, hits: u16) {
        let snapshot = DesyncSnapshot {
            unit_id: id,
            hits,
            grid_x: (id % 64) as i16,
            grid_y: 7,
            ..DesyncSnapshot::default()
        };
        self.units.insert(
            UnitId(id),
            TestUnit {
                snapshot,
                ..TestUnit::default()
            },
        );
    }
}

impl GameHost for TestHost {
    fn process_tick(&mut self) {
        thread::sleep(POLL_INTERVAL);
    }

    fn unit(&mut self, id: UnitId) -> Option<&mut dyn RemoteUnit> {
        self.units
            .get_mut(&id)
            .map(|unit| unit as &mut dyn RemoteUnit)
    }

    fn unit_ids(&self, list: UnitList) -> Vec<UnitId> {
        match list {
            UnitList::Stationary => self.units.keys().copied().collect(),
            _ => Vec::new(),
        }
    }

    fn show_message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn debug_save(&mut self, _file_name: &str, _title: &str) {
        self.debug_saves += 1;
    }

    fn on_team_dropped(&mut self, team: usize, reason: DropReason) {
        self.dropped.push((team, reason));
    }

    fn on_network_game_ended(&mut self) {
        self.network_game_ended = true;
    }
}

/// A session plus its game side.
pub struct TestPeer {
    pub remote: Remote,
    pub host: TestHost,
    pub cancel: CancellationToken,
}

impl TestPeer {
    /// Attach a new peer named `name` to `network`.
    pub fn new(network: &LoopbackNetwork, name: &str) -> Self {
        Self::with_config(
            network,
            RemoteConfig {
                player_name: name.to_string(),
                ping_period_ms: 100,
                ..RemoteConfig::default()
            },
        )
    }

    pub fn with_config(network: &LoopbackNetwork, config: RemoteConfig) -> Self {
        Self {
            remote: Remote::new(config, Box::new(network.endpoint())),
            host: TestHost::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Handle everything queued for this peer.
    pub fn pump(&mut self) -> usize {
        self.remote.process_incoming(&mut self.host)
    }

    /// Blocking poll until `done` holds for this peer.
    pub fn poll_until(&mut self, what: &str, mut done: impl FnMut(&TestPeer) -> bool) {
        let start = Instant::now();
        loop {
            self.pump();
            if done(self) {
                return;
            }
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Pump every peer round-robin until `done` holds.
pub fn pump_until(peers: &mut [TestPeer], what: &str, done: impl Fn(&[TestPeer]) -> bool) {
    let start = Instant::now();
    loop {
        for peer in peers.iter_mut() {
            peer.pump();
        }
        if done(peers) {
            return;
        }
        assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
        thread::sleep(POLL_INTERVAL);
    }
}

/// Build a full lobby: the first peer hosts, the others discover and join
/// it, and peer `i` takes team slot `i`.
pub fn form_lobby(network: &LoopbackNetwork, names: &[&str]) -> Vec<TestPeer> {
    let mut peers: Vec<TestPeer> = names.iter().map(|n| TestPeer::new(network, n)).collect();
    let count = peers.len();
    peers[0].remote.register_lobby(true).expect("host lobby failed");
    let host_id = peers[0].remote.player_node();
    for peer in &mut peers[1..] {
        peer.remote.register_lobby(false).expect("client lobby failed");
    }
    pump_until(&mut peers, "host discovery", |peers| {
        peers[1..].iter().all(|p| p.remote.hosts().contains(host_id))
    });

    for peer in &mut peers[1..] {
        peer.remote.join_host(host_id).expect("join_host failed");
    }
    pump_until(&mut peers, "registration", |peers| {
        peers
            .iter()
            .all(|p| p.remote.host_node() == host_id && p.remote.nodes().len() == count)
    });

    for (team, peer) in peers.iter_mut().enumerate() {
        peer.remote
            .claim_team_slot(team, true)
            .expect("claim_team_slot failed");
    }
    pump_until(&mut peers, "team slots", |peers| {
        peers.iter().all(|p| {
            p.remote
                .roster()
                .nodes
                .iter()
                .filter(|n| n.is_assigned())
                .count()
                == count
        })
    });
    peers
}

/// Run `script` for every peer at once, one thread each, and return the
/// results in peer order.
pub fn run_parallel<T: Send>(
    peers: &mut [TestPeer],
    script: impl Fn(&mut TestPeer) -> T + Sync,
) -> Vec<T> {
    let script = &script;
    thread::scope(|scope| {
        let handles: Vec<_> = peers
            .iter_mut()
            .map(|peer| scope.spawn(move || script(peer)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("peer thread panicked"))
            .collect()
    })
}

/// Start the match on every peer; returns each peer's remote team count.
pub fn start_match(peers: &mut [TestPeer]) -> Vec<usize> {
    run_parallel(peers, |peer| {
        peer.remote
            .setup_connection(&mut peer.host, &peer.cancel)
            .expect("setup_connection failed")
    })
}
