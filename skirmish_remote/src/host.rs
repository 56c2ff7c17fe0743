// The game side of a remote session.
//
// The session engine knows nothing about maps, units or rendering. It reaches
// the running game through two traits:
// - `GameHost`: the simulation plus UI as a whole. Blocking waits call
//   `process_tick` every iteration so the game keeps animating and the UI
//   keeps responding while peers are awaited.
// - `RemoteUnit`: one unit, looked up by id, for order sync and desync
//   snapshots.
//
// Most `GameHost` hooks have logging defaults so a headless host (tests, a
// dedicated relay) only implements what it cares about.

use log::{debug, info};
use skirmish_protocol::{
    ComplexTransfer, DesyncSnapshot, GameRules, MissionSupplies, OrderPayload, TeamEconomy,
    UnitAttributes, UnitId, UnitPath,
};

use crate::state::DropReason;

/// The unit lists a game keeps, in the order desync analysis walks them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitList {
    MobileLandSea,
    Air,
    Stationary,
    GroundCover,
    Particle,
}

impl UnitList {
    pub const ANALYSIS_ORDER: [UnitList; 5] = [
        UnitList::MobileLandSea,
        UnitList::Air,
        UnitList::Stationary,
        UnitList::GroundCover,
        UnitList::Particle,
    ];
}

pub trait RemoteUnit {
    fn order_payload(&self) -> OrderPayload;

    fn apply_order_payload(&mut self, payload: &OrderPayload);

    fn desync_snapshot(&self) -> DesyncSnapshot;

    fn apply_base_values(&mut self, _values: &UnitAttributes) {}

    /// Opaque full-state blob (packet 22).
    fn apply_state(&mut self, _data: &[u8]) {}

    fn apply_path(&mut self, _path: &UnitPath) {}

    fn set_path_blocked(&mut self, _blocked: bool) {}

    fn set_name(&mut self, _name: &str) {}

    fn emergency_stop(&mut self) {}

    /// Mining stations carry per-turn production that peers legitimately
    /// disagree on mid-turn; desync analysis skips them.
    fn is_mining_station(&self) -> bool {
        false
    }
}

pub trait GameHost {
    /// Advance the game by one UI frame while a wait is in progress.
    fn process_tick(&mut self) {}

    fn unit(&mut self, id: UnitId) -> Option<&mut dyn RemoteUnit>;

    fn unit_ids(&self, list: UnitList) -> Vec<UnitId>;

    /// Whether per-tick frame sync applies right now (e.g. not during
    /// turn-based phases or while paused).
    fn frame_sync_enabled(&self) -> bool {
        true
    }

    /// True once the local game is shutting down. Voluntary departures seen
    /// while wrapping up are not announced to the player.
    fn is_wrapping_up(&self) -> bool {
        false
    }

    fn show_message(&mut self, text: &str) {
        info!("{text}");
    }

    fn debug_save(&mut self, file_name: &str, title: &str) {
        debug!("debug save requested: {file_name} ({title})");
    }

    // -- team callbacks --

    /// A remote team has not answered for `response_pending_ms`.
    fn on_peer_pending(&mut self, _team: usize) {}

    fn on_team_dropped(&mut self, team: usize, reason: DropReason) {
        info!("team {team} left the match ({reason:?})");
    }

    /// The last remote team is gone; the match continues locally.
    fn on_network_game_ended(&mut self) {}

    fn on_end_turn(&mut self, _team: usize) {}

    // -- game state sync --

    fn apply_team_economy(&mut self, _team: usize, _economy: TeamEconomy) {}

    fn apply_team_unit_values(&mut self, _team: usize, _unit_type: u16, _values: UnitAttributes) {}

    fn apply_complex(&mut self, _team: usize, _data: Vec<u8>) {}

    fn apply_mission_supplies(&mut self, _team: usize, _supplies: MissionSupplies) {}

    fn clear_mission_supplies(&mut self, _team: usize) {}

    fn deploy_unit(&mut self, _team: usize, _unit_type: u16, _grid_x: i32, _grid_y: i32) {}

    fn remote_save(&mut self, _team: usize, _file_name: &str, _title: &str) {}

    fn apply_game_rules(&mut self, _rules: GameRules) {}

    fn show_chat(&mut self, team: usize, text: &str) {
        info!("[team {team}] {text}");
    }

    fn complex_transfer(&mut self, _team: usize, _transfer: ComplexTransfer) {}

    fn apply_clan(&mut self, _team: usize, _clan: u8) {}

    fn show_desync_dialog(&mut self, _team: usize) {}
}
