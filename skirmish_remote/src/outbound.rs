// Senders for in-game sync messages.
//
// Each sender encodes one message and multicasts it to every other node.
// None of them wait for an answer; state that must be agreed on is settled by
// the barriers in `barrier.rs`. Team arguments are local team indices
// (`0..MAX_TEAM_COUNT`).

use log::debug;
use skirmish_protocol::{
    ComplexTransfer, GameRules, Message, MissionSupplies, OrderPayload, TeamEconomy,
    UnitAttributes, UnitId, UnitPath,
};

use crate::remote::{Delivery, Remote};

impl Remote {
    fn multicast(&mut self, message: Message) {
        self.send(&message, Delivery::Multicast);
    }

    /// Packet 06.
    pub fn send_end_turn(&mut self, team: usize) {
        self.multicast(Message::EndTurn { team: team as u16 });
    }

    /// Send the orders of `unit` (packet 08). Only the cascade level selected
    /// by the current orders is encoded.
    pub fn send_unit_order(&mut self, unit: UnitId, order: &OrderPayload) {
        self.multicast(Message::UnitOrder {
            unit,
            order: order.clone(),
        });
    }

    pub fn send_team_economy(&mut self, team: usize, economy: TeamEconomy) {
        self.multicast(Message::TeamEconomy {
            team: team as u16,
            economy,
        });
    }

    /// Upgraded attribute values of one unit type (packet 10).
    pub fn send_team_unit_values(&mut self, team: usize, unit_type: u16, values: UnitAttributes) {
        self.multicast(Message::TeamUnitValues {
            team: team as u16,
            unit_type,
            values,
        });
    }

    pub fn send_complex(&mut self, team: usize, data: Vec<u8>) {
        self.multicast(Message::Complex {
            team: team as u16,
            data,
        });
    }

    /// Site-select supplies of `team` (packet 12). Sending them opens a new
    /// site selection, so any seed from an earlier one is forgotten.
    pub fn send_mission_supplies(&mut self, team: usize, supplies: MissionSupplies) {
        self.state.seed_received = false;
        self.multicast(Message::MissionSupplies {
            team: team as u16,
            supplies,
        });
    }

    /// Withdraw supplies sent earlier (packet 42).
    pub fn send_clear_supplies(&mut self, team: usize) {
        self.multicast(Message::ClearSupplies { team: team as u16 });
    }

    /// Adopt `seed` locally and announce it (packet 13).
    pub fn send_rng_seed(&mut self, seed: u32) {
        self.state.rng_seed = seed;
        self.state.seed_received = true;
        self.multicast(Message::RngSeed { seed });
    }

    pub fn send_deploy_unit(&mut self, team: usize, unit_type: u16, grid_x: i32, grid_y: i32) {
        self.multicast(Message::DeployUnit {
            team: team as u16,
            unit_type,
            grid_x,
            grid_y,
        });
    }

    /// Ask every peer to save under `file_name` (packet 16).
    pub fn send_remote_save(&mut self, team: usize, file_name: &str, title: &str) {
        self.multicast(Message::RemoteSave {
            team: team as u16,
            file_name: file_name.to_string(),
            title: title.to_string(),
        });
    }

    /// Packet 17. The settings inside `rules` become the session settings.
    pub fn send_game_rules(&mut self, rules: GameRules) {
        self.lobby.settings = rules.settings.clone();
        self.multicast(Message::GameRules {
            from: self.player_node,
            rules,
        });
    }

    pub fn send_chat(&mut self, team: usize, text: &str) {
        self.multicast(Message::Chat {
            team: team as u16,
            text: text.to_string(),
        });
    }

    pub fn send_unit_base_values(&mut self, unit: UnitId, values: UnitAttributes) {
        self.multicast(Message::UnitBaseValues { unit, values });
    }

    pub fn send_complex_transfer(&mut self, team: usize, transfer: ComplexTransfer) {
        self.multicast(Message::ComplexTransfer {
            team: team as u16,
            transfer,
        });
    }

    /// Full opaque state of `unit` (packet 22).
    pub fn send_unit_state(&mut self, unit: UnitId, data: Vec<u8>) {
        self.multicast(Message::UnitState { unit, data });
    }

    pub fn send_clan(&mut self, team: usize, clan: u8) {
        self.multicast(Message::Clan {
            team: team as u16,
            clan,
        });
    }

    pub fn send_unit_path(&mut self, unit: UnitId, path: UnitPath) {
        self.multicast(Message::UnitPath { unit, path });
    }

    pub fn send_desync_dialog(&mut self, team: usize) {
        self.multicast(Message::DesyncDialog { team: team as u16 });
    }

    pub fn send_unpause(&mut self, team: usize) {
        self.multicast(Message::Unpause { team: team as u16 });
    }

    pub fn send_path_blocked(&mut self, unit: UnitId, blocked: bool) {
        self.multicast(Message::PathBlocked { unit, blocked });
    }

    pub fn send_unit_name(&mut self, unit: UnitId, name: &str) {
        self.multicast(Message::UnitName {
            unit,
            name: name.to_string(),
        });
    }

    pub fn send_emergency_stop(&mut self, unit: UnitId) {
        self.multicast(Message::EmergencyStop { unit });
    }

    /// Packet 51.
    pub fn send_restart_after_desync(&mut self, team: usize) {
        self.multicast(Message::RestartAfterDesync { team: team as u16 });
    }

    /// Pass the delayed-reaction token to `team`. Peers only accept a token
    /// whose counter is newer than the one they hold.
    pub fn send_reaction_token(&mut self, team: usize, active: bool) {
        let token = &mut self.state.reaction_token;
        token.team = team;
        token.active = active;
        token.counter = token.counter.wrapping_add(1);
        let counter = token.counter;
        debug!("reaction token -> team {team} (active: {active}, #{counter})");
        self.multicast(Message::ReactionToken {
            team: team as u16,
            active,
            counter,
        });
    }
}
