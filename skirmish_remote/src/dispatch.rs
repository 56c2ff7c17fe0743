// Incoming packet dispatch.
//
// `process_incoming` drains the transport without blocking and routes each
// packet to its handler. Packets are filtered in this order:
// 1. shorter than `MIN_PACKET_SIZE`: dropped (debug log);
// 2. unknown type byte: dropped (warn log);
// 3. truncated or invalid payload: dropped (warn log);
// 4. team index out of range, for team-addressed kinds: dropped.
// Every outcome is counted in `DispatchStats`. A bad packet never stops the
// drain; the next packet is processed normally.
//
// Handlers only record state and call `GameHost` hooks. Anything that needs
// to wait (barriers, desync analysis, lobby setup) polls the recorded state
// from its own loop.
//
// Lobby kinds are forwarded to `lobby.rs`.

use std::net::SocketAddr;

use log::{debug, trace, warn};
use skirmish_protocol::{
    DecodeError, MIN_PACKET_SIZE, Message, Packet, PacketType, UnitId, team_index,
};

use crate::host::{GameHost, RemoteUnit};
use crate::remote::{Delivery, Remote};
use crate::state::{DropReason, FRAME_SYNC_MODULUS, TeamSync};

/// Resolve a wire team index or drop the packet being handled.
macro_rules! team_or_drop {
    ($remote:expr, $raw:expr) => {
        match $remote.checked_team($raw) {
            Some(team) => team,
            None => return,
        }
    };
}

impl Remote {
    /// Handle every packet currently queued. Returns how many were received.
    pub fn process_incoming(&mut self, host: &mut dyn GameHost) -> usize {
        if self.transport_role.is_none() {
            return 0;
        }
        let mut count = 0;
        loop {
            match self.transport.receive() {
                Ok(Some(packet)) => {
                    count += 1;
                    self.dispatch(host, packet);
                }
                Ok(None) => break,
                Err(err) => {
                    warn!("receive failed: {err}");
                    break;
                }
            }
        }
        count
    }

    /// Validate, decode and handle one received packet.
    pub fn dispatch(&mut self, host: &mut dyn GameHost, mut packet: Packet) {
        self.stats.received += 1;
        if packet.len() < MIN_PACKET_SIZE {
            self.stats.dropped_short += 1;
            debug!("dropping {}-byte packet", packet.len());
            return;
        }
        let source = packet.address(0);
        trace!(
            "recv type {:?} origin {:?} from {source:?}",
            packet.peek_type(),
            packet.peek_origin()
        );
        let message = match Message::decode(&mut packet) {
            Ok(message) => message,
            Err(DecodeError::UnknownPacketType(code)) => {
                self.stats.unknown_type += 1;
                warn!("dropping packet of unknown type {code}");
                return;
            }
            Err(err) => {
                self.stats.malformed += 1;
                warn!("dropping malformed packet: {err}");
                return;
            }
        };
        self.handle(host, message, source);
    }

    pub(crate) fn checked_team(&mut self, raw: u16) -> Option<usize> {
        let team = team_index(raw);
        if team.is_none() {
            self.stats.bad_team += 1;
            debug!("dropping packet for team {raw}");
        }
        team
    }

    fn touch_team(&mut self, team: usize) {
        self.state.teams[team].last_advanced_ms = self.clock.now_ms();
    }

    /// Store a received counter. The team is stamped as advanced only when
    /// the value moved; a peer repeating itself is not making progress.
    fn record_counter(&mut self, team: usize, field: fn(&mut TeamSync) -> &mut u32, value: u32) {
        let slot = field(&mut self.state.teams[team]);
        if *slot != value {
            *slot = value;
            self.touch_team(team);
        }
    }

    /// On a client, adopt the seed and confirm it back to the host. On the
    /// host, a seed coming back is the sender's confirmation.
    fn handle_seed(&mut self, seed: u32, source: Option<SocketAddr>) {
        if !self.is_host {
            debug!("received session seed {seed}");
            self.state.rng_seed = seed;
            self.state.seed_received = true;
            if let Some(address) = source.filter(|&a| self.is_host_address(a)) {
                self.send_to(&Message::RngSeed { seed }, address);
            }
            return;
        }
        let confirmed = source
            .and_then(|a| self.team_at(a))
            .filter(|_| self.state.seed_received && seed == self.state.rng_seed);
        match confirmed {
            Some(team) => {
                self.state.teams[team].seed_acked = true;
                self.touch_team(team);
            }
            None => warn!("ignoring seed {seed} from {source:?}"),
        }
    }

    /// Answer a peer that is still announcing an older barrier index: the
    /// local index was probably lost on its way there.
    fn echo(&mut self, source: Option<SocketAddr>, reply: Message) {
        if let Some(address) = source {
            self.send_to(&reply, address);
        }
    }

    fn handle(&mut self, host: &mut dyn GameHost, message: Message, source: Option<SocketAddr>) {
        let kind = message.kind();
        match message {
            // -- barriers --
            Message::BeginTurn { team, index } => {
                let team = team_or_drop!(self, team);
                self.record_counter(team, |t| &mut t.frame_counter, index);
                let own = self.state.teams[self.player_team].frame_counter;
                if index < own {
                    self.echo(source, Message::BeginTurn {
                        team: self.player_team as u16,
                        index: own,
                    });
                }
            }
            Message::FrameSync { team, counter } => {
                let team = team_or_drop!(self, team);
                self.record_counter(
                    team,
                    |t| &mut t.frame_sync_mirror,
                    counter % FRAME_SYNC_MODULUS,
                );
            }
            Message::EndTurnSync { team, index } => {
                let team = team_or_drop!(self, team);
                self.record_counter(team, |t| &mut t.turn_index, index);
                let own = self.state.teams[self.player_team].turn_index;
                if index < own {
                    self.echo(source, Message::EndTurnSync {
                        team: self.player_team as u16,
                        index: own,
                    });
                }
            }
            Message::TurnChecksum {
                team,
                next_turn_index,
                crc16,
            } => {
                let team = team_or_drop!(self, team);
                self.state.teams[team].crc16 = crc16;
                self.record_counter(team, |t| &mut t.next_turn_index, next_turn_index);
                let own = &self.state.teams[self.player_team];
                if next_turn_index < own.next_turn_index {
                    let reply = Message::TurnChecksum {
                        team: self.player_team as u16,
                        next_turn_index: own.next_turn_index,
                        crc16: own.crc16,
                    };
                    self.echo(source, reply);
                }
            }

            // -- session --
            Message::EndTurn { team } => {
                let team = team_or_drop!(self, team);
                host.on_end_turn(team);
            }
            Message::LeaveRequest {
                team,
                request_id,
                dropped,
            } => {
                let team = team_or_drop!(self, team);
                self.state.teams[team].leave_request_id = request_id;
                self.touch_team(team);
                let own = self.player_team;
                let ack_id = self.state.teams[own].leave_request_id.wrapping_add(1);
                self.state.teams[own].leave_request_id = ack_id;
                // Acknowledge before dropping; the drop forgets the leaver's node.
                self.send(
                    &Message::LeaveAck {
                        team: own as u16,
                        request_id: ack_id,
                    },
                    Delivery::Multicast,
                );
                if dropped {
                    self.drop_team(host, team, DropReason::Left);
                }
            }
            Message::LeaveAck { team, request_id } => {
                let team = team_or_drop!(self, team);
                self.state.teams[team].leave_request_id = request_id;
                self.touch_team(team);
            }
            Message::ReactionToken {
                team,
                active,
                counter,
            } => {
                let team = team_or_drop!(self, team);
                let token = &mut self.state.reaction_token;
                if counter > token.counter {
                    token.team = team;
                    token.active = active;
                    token.counter = counter;
                }
            }

            // -- game state --
            Message::UnitOrder { unit, order } => {
                let level = order.cascade_level();
                self.with_unit(host, unit, kind, |u| {
                    let mut payload = u.order_payload();
                    payload.merge_level(level, &order);
                    u.apply_order_payload(&payload);
                });
            }
            Message::TeamEconomy { team, economy } => {
                let team = team_or_drop!(self, team);
                host.apply_team_economy(team, economy);
            }
            Message::TeamUnitValues {
                team,
                unit_type,
                values,
            } => {
                let team = team_or_drop!(self, team);
                host.apply_team_unit_values(team, unit_type, values);
            }
            Message::Complex { team, data } => {
                let team = team_or_drop!(self, team);
                host.apply_complex(team, data);
            }
            Message::MissionSupplies { team, supplies } => {
                let team = team_or_drop!(self, team);
                self.state.teams[team].supplies_received = true;
                self.touch_team(team);
                host.apply_mission_supplies(team, supplies);
            }
            Message::ClearSupplies { team } => {
                let team = team_or_drop!(self, team);
                self.state.teams[team].supplies_received = false;
                host.clear_mission_supplies(team);
            }
            Message::RngSeed { seed } => self.handle_seed(seed, source),
            Message::DeployUnit {
                team,
                unit_type,
                grid_x,
                grid_y,
            } => {
                let team = team_or_drop!(self, team);
                host.deploy_unit(team, unit_type, grid_x, grid_y);
            }
            Message::RemoteSave {
                team,
                file_name,
                title,
            } => {
                let team = team_or_drop!(self, team);
                host.remote_save(team, &file_name, &title);
            }
            Message::GameRules { rules, .. } => {
                self.lobby.settings = rules.settings.clone();
                host.apply_game_rules(rules);
            }
            Message::Chat { team, text } => {
                let team = team_or_drop!(self, team);
                host.show_chat(team, &text);
            }
            Message::UnitBaseValues { unit, values } => {
                self.with_unit(host, unit, kind, |u| u.apply_base_values(&values));
            }
            Message::ComplexTransfer { team, transfer } => {
                let team = team_or_drop!(self, team);
                host.complex_transfer(team, transfer);
            }
            Message::UnitState { unit, data } => {
                self.with_unit(host, unit, kind, |u| u.apply_state(&data));
            }
            Message::Clan { team, clan } => {
                let team = team_or_drop!(self, team);
                host.apply_clan(team, clan);
            }
            Message::UnitPath { unit, path } => {
                self.with_unit(host, unit, kind, |u| u.apply_path(&path));
            }
            Message::DesyncDialog { team } => {
                let team = team_or_drop!(self, team);
                host.show_desync_dialog(team);
            }
            Message::Unpause { team } => {
                team_or_drop!(self, team);
                self.state.unpause_event = true;
            }
            Message::PathBlocked { unit, blocked } => {
                self.with_unit(host, unit, kind, |u| u.set_path_blocked(blocked));
            }
            Message::UnitName { unit, name } => {
                self.with_unit(host, unit, kind, |u| u.set_name(&name));
            }
            Message::EmergencyStop { unit } => {
                self.with_unit(host, unit, kind, |u| u.emergency_stop());
            }

            // -- desync --
            Message::DesyncProbe { unit, snapshot } => {
                self.state.desync_probes.push_back((unit, snapshot));
            }
            Message::DesyncAck { team, diverged } => {
                let team = team_or_drop!(self, team);
                let entry = &mut self.state.teams[team];
                entry.desync_acked = true;
                entry.desync_diverged = diverged;
                self.touch_team(team);
            }
            Message::DesyncAnalysisDone { team } => {
                team_or_drop!(self, team);
                self.state.desync_analysis_done = true;
            }
            Message::RestartAfterDesync { team } => {
                team_or_drop!(self, team);
                self.state.restart_after_desync = true;
            }

            // -- lobby --
            lobby @ (Message::Discover { .. }
            | Message::HostAnnounce { .. }
            | Message::Register { .. }
            | Message::RegisterAccept { .. }
            | Message::LeaveLobby { .. }
            | Message::StartGame { .. }
            | Message::StartAck { .. }
            | Message::LobbyChat { .. }
            | Message::ConnectionEstablished { .. }
            | Message::TeamSlot { .. }
            | Message::PlayerName { .. }
            | Message::Settings { .. }) => self.handle_lobby(lobby, source),
        }
        self.stats.handled += 1;
    }

    fn with_unit(
        &mut self,
        host: &mut dyn GameHost,
        unit: UnitId,
        kind: PacketType,
        apply: impl FnOnce(&mut dyn RemoteUnit),
    ) {
        match host.unit(unit) {
            Some(found) => apply(found),
            None => {
                self.stats.unknown_unit += 1;
                warn!("{kind:?} packet for unknown {unit}");
                host.show_message(&format!("remote update for unknown {unit}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TeamKind;
    use crate::clock::ManualClock;
    use crate::test_support::{
        ScriptedHost, ScriptedUnit, in_game_remote, peer_at, peer_remote_with_clock,
    };
    use skirmish_protocol::{CascadeLevel, OrderKind, OrderPayload, TeamEconomy};

    fn packet(message: &Message) -> Packet {
        message.encode()
    }

    #[test]
    fn short_packets_are_dropped_and_dispatch_continues() {
        let (mut remote, _network) = in_game_remote(2);
        let mut host = ScriptedHost::default();

        remote.dispatch(&mut host, Packet::from_bytes(vec![]));
        remote.dispatch(&mut host, Packet::from_bytes(vec![0]));
        remote.dispatch(&mut host, Packet::from_bytes(vec![0, 1]));
        remote.dispatch(
            &mut host,
            packet(&Message::BeginTurn { team: 1, index: 4 }),
        );

        let stats = remote.stats();
        assert_eq!(stats.received, 4);
        assert_eq!(stats.dropped_short, 3);
        assert_eq!(stats.handled, 1);
        assert_eq!(remote.state().teams[1].frame_counter, 4);
    }

    #[test]
    fn unknown_and_truncated_packets_are_counted() {
        let (mut remote, _network) = in_game_remote(2);
        let mut host = ScriptedHost::default();

        remote.dispatch(&mut host, Packet::from_bytes(vec![2, 0, 0]));
        remote.dispatch(&mut host, Packet::from_bytes(vec![200, 0, 0, 9]));
        // BeginTurn with a two-byte index instead of four.
        remote.dispatch(&mut host, Packet::from_bytes(vec![0, 1, 0, 7, 0]));

        let stats = remote.stats();
        assert_eq!(stats.unknown_type, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.handled, 0);
    }

    #[test]
    fn out_of_range_team_is_dropped() {
        let (mut remote, _network) = in_game_remote(2);
        let mut host = ScriptedHost::default();
        remote.dispatch(&mut host, packet(&Message::BeginTurn { team: 4, index: 9 }));
        remote.dispatch(&mut host, packet(&Message::Chat { team: 77, text: "hi".into() }));
        assert_eq!(remote.stats().bad_team, 2);
        assert!(host.chats.is_empty());
    }

    #[test]
    fn unit_order_merges_only_the_received_level() {
        let (mut remote, _network) = in_game_remote(2);
        let mut host = ScriptedHost::default();
        let original = OrderPayload {
            orders: OrderKind::Build,
            build_queue: vec![7, 8],
            build_rate: 3,
            raw_mining: 9,
            ..OrderPayload::default()
        };
        host.units.insert(
            UnitId(40),
            ScriptedUnit {
                payload: original.clone(),
                ..ScriptedUnit::default()
            },
        );

        let received = OrderPayload {
            orders: OrderKind::Move,
            state: 2,
            target_grid_x: 31,
            target_grid_y: 12,
            build_queue: vec![1],
            ..OrderPayload::default()
        };
        assert_eq!(received.cascade_level(), CascadeLevel::Targeted);
        remote.dispatch(
            &mut host,
            packet(&Message::UnitOrder {
                unit: UnitId(40),
                order: received,
            }),
        );

        let unit = &host.units[&UnitId(40)];
        assert_eq!(unit.payload.orders, OrderKind::Move);
        assert_eq!(unit.payload.target_grid_x, 31);
        // Builder and Miner fields were not on the wire.
        assert_eq!(unit.payload.build_queue, vec![7, 8]);
        assert_eq!(unit.payload.build_rate, 3);
        assert_eq!(unit.payload.raw_mining, 9);
    }

    #[test]
    fn unknown_unit_is_reported_to_the_player() {
        let (mut remote, _network) = in_game_remote(2);
        let mut host = ScriptedHost::default();
        remote.dispatch(
            &mut host,
            packet(&Message::UnitName {
                unit: UnitId(999),
                name: "Ghost".into(),
            }),
        );
        assert_eq!(remote.stats().unknown_unit, 1);
        assert_eq!(host.messages.len(), 1);
        assert!(host.messages[0].contains("unit#999"));
    }

    #[test]
    fn game_state_messages_reach_the_host() {
        let (mut remote, _network) = in_game_remote(2);
        let mut host = ScriptedHost::default();
        let economy = TeamEconomy {
            gold: 120,
            team_name: "Blue".into(),
            ..TeamEconomy::default()
        };
        remote.dispatch(
            &mut host,
            packet(&Message::TeamEconomy {
                team: 1,
                economy: economy.clone(),
            }),
        );
        remote.dispatch(&mut host, packet(&Message::Chat { team: 1, text: "gg".into() }));
        remote.dispatch(&mut host, packet(&Message::Unpause { team: 1 }));

        assert_eq!(host.economies, vec![(1, economy)]);
        assert_eq!(host.chats, vec![(1, "gg".to_string())]);
        assert!(remote.state().unpause_event);
    }

    #[test]
    fn client_adopts_the_seed_from_the_host() {
        let (mut remote, _network) = peer_remote_with_clock(3, ManualClock::new(0));
        let mut host = ScriptedHost::default();
        let host_address = peer_at(0, 11, true).address;
        let seed = Message::RngSeed { seed: 77 }.encode();
        remote.dispatch(&mut host, Packet::from_wire(seed.as_bytes().to_vec(), host_address));
        assert_eq!(remote.rng_seed(), 77);
        assert!(remote.state().seed_received);
    }

    #[test]
    fn host_counts_a_returned_seed_as_confirmation() {
        let (mut remote, _network) = in_game_remote(3);
        let mut host = ScriptedHost::default();
        remote.send_rng_seed(4242);
        let from_team_2 = peer_at(2, 13, false).address;

        let wrong = Message::RngSeed { seed: 1 }.encode();
        remote.dispatch(&mut host, Packet::from_wire(wrong.as_bytes().to_vec(), from_team_2));
        assert_eq!(remote.rng_seed(), 4242);
        assert!(!remote.state().teams[2].seed_acked);

        let echoed = Message::RngSeed { seed: 4242 }.encode();
        remote.dispatch(&mut host, Packet::from_wire(echoed.as_bytes().to_vec(), from_team_2));
        assert!(remote.state().teams[2].seed_acked);
        assert!(!remote.state().teams[1].seed_acked);
    }

    #[test]
    fn reaction_token_only_moves_forward() {
        let (mut remote, _network) = in_game_remote(3);
        let mut host = ScriptedHost::default();
        remote.dispatch(
            &mut host,
            packet(&Message::ReactionToken { team: 2, active: true, counter: 5 }),
        );
        remote.dispatch(
            &mut host,
            packet(&Message::ReactionToken { team: 1, active: false, counter: 4 }),
        );
        let token = remote.state().reaction_token;
        assert_eq!((token.team, token.active, token.counter), (2, true, 5));
    }

    #[test]
    fn dropping_leave_request_eliminates_the_sender() {
        let (mut remote, _network) = in_game_remote(3);
        let mut host = ScriptedHost::default();
        remote.dispatch(
            &mut host,
            packet(&Message::LeaveRequest { team: 2, request_id: 1, dropped: true }),
        );
        assert_eq!(remote.team_kind(2), TeamKind::Eliminated);
        assert_eq!(host.dropped, vec![(2, DropReason::Left)]);
        assert_eq!(remote.state().teams[0].leave_request_id, 1);
    }

    #[test]
    fn desync_probes_queue_in_order() {
        let (mut remote, _network) = in_game_remote(2);
        let mut host = ScriptedHost::default();
        for id in [5, 6] {
            remote.dispatch(
                &mut host,
                packet(&Message::DesyncProbe {
                    unit: UnitId(id),
                    snapshot: Default::default(),
                }),
            );
        }
        let queued: Vec<u16> = remote.state().desync_probes.iter().map(|(u, _)| u.0).collect();
        assert_eq!(queued, vec![5, 6]);
    }
}
