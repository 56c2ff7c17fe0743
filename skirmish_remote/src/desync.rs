// Desync detection and analysis.
//
// Detection: at the end of each turn every peer enters `check_desync` with a
// checksum of its simulation state. It is a turn barrier on the checksum
// index (packet 45) and afterwards compares the checksum every remote team
// reported for the same index.
//
// Analysis runs only after a mismatch and only for diagnostics; nothing is
// repaired. The host walks its unit lists in `UnitList::ANALYSIS_ORDER`,
// skipping mining stations, and for each unit sends its `DesyncSnapshot`
// (packet 23) and waits until every live remote team acknowledged it
// (packet 24). Peers compare each received snapshot against their own copy
// of the unit. The first divergent unit gets a field-by-field log; later
// ones get a single line so the log stays readable. The host finishes with
// packet 49, and both sides then ask the game for an emergency debug save.

use log::{info, warn};
use skirmish_protocol::{DesyncSnapshot, FieldDiff, Message, UnitId};

use crate::cancel::CancellationToken;
use crate::error::RemoteError;
use crate::host::{GameHost, UnitList};
use crate::remote::{Delivery, Remote};

/// One unit found to differ during analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitDivergence {
    pub unit: UnitId,
    /// Field differences (local vs. host), filled on the peer side.
    pub fields: Vec<FieldDiff>,
    /// Teams that acknowledged the probe as diverged, filled on the host side.
    pub reported_by: Vec<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesyncReport {
    pub units_compared: usize,
    pub divergent: Vec<UnitDivergence>,
    /// Units named in a probe that do not exist locally.
    pub unknown_units: Vec<UnitId>,
}

impl DesyncReport {
    pub fn is_clean(&self) -> bool {
        self.divergent.is_empty() && self.unknown_units.is_empty()
    }
}

impl Remote {
    /// Checksum barrier. `team` is the local team and `crc16` its state
    /// checksum for the turn being closed. Returns false if any remote team
    /// at the same index reported a different checksum.
    pub fn check_desync(
        &mut self,
        host: &mut dyn GameHost,
        team: usize,
        crc16: u16,
        cancel: &CancellationToken,
    ) -> Result<bool, RemoteError> {
        let own = &mut self.state.teams[team];
        own.next_turn_index = own.next_turn_index.wrapping_add(1);
        own.crc16 = crc16;
        let index = own.next_turn_index;
        self.turn_barrier(
            host,
            cancel,
            team,
            index,
            |t| t.next_turn_index,
            move |team, next_turn_index| Message::TurnChecksum {
                team,
                next_turn_index,
                crc16,
            },
        )?;

        let mismatched: Vec<(usize, u16)> = self
            .state
            .remote_teams()
            .map(|t| (t, &self.state.teams[t]))
            .filter(|(_, sync)| sync.next_turn_index == index && sync.crc16 != crc16)
            .map(|(t, sync)| (t, sync.crc16))
            .collect();
        for (other, theirs) in &mismatched {
            warn!(
                "turn checksum mismatch at index {index}: local {crc16:#06x}, team {other} {theirs:#06x}"
            );
        }
        Ok(mismatched.is_empty())
    }

    /// Compare unit state unit by unit with every peer. Must be entered by
    /// all peers; the host drives it.
    pub fn analyze_desync(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
    ) -> Result<DesyncReport, RemoteError> {
        info!("starting desync analysis");
        let report = if self.is_host {
            self.probe_units(host, cancel)
        } else {
            self.answer_probes(host, cancel)
        };
        // Probes arriving after the host finished belong to no analysis.
        self.state.desync_probes.clear();
        let report = report?;
        host.debug_save(&self.config.desync_save_file, &self.config.desync_save_title);
        info!(
            "desync analysis done: {} unit(s), {} divergent, {} unknown",
            report.units_compared,
            report.divergent.len(),
            report.unknown_units.len()
        );
        Ok(report)
    }

    /// Drain packets and report whether a peer asked to restart after a
    /// desync (packet 51).
    pub fn check_restart_after_desync(&mut self, host: &mut dyn GameHost) -> bool {
        self.process_incoming(host);
        std::mem::take(&mut self.state.restart_after_desync)
    }

    fn probe_units(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
    ) -> Result<DesyncReport, RemoteError> {
        let mut report = DesyncReport::default();
        let outcome = self.probe_lists(host, cancel, &mut report);
        self.send(
            &Message::DesyncAnalysisDone {
                team: self.player_team as u16,
            },
            Delivery::Multicast,
        );
        outcome.map(|()| report)
    }

    fn probe_lists(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
        report: &mut DesyncReport,
    ) -> Result<(), RemoteError> {
        for list in UnitList::ANALYSIS_ORDER {
            for id in host.unit_ids(list) {
                let Some(snapshot) = host
                    .unit(id)
                    .filter(|u| !u.is_mining_station())
                    .map(|u| u.desync_snapshot())
                else {
                    continue;
                };
                for team in &mut self.state.teams {
                    team.desync_acked = false;
                    team.desync_diverged = false;
                }
                self.send(&Message::DesyncProbe { unit: id, snapshot }, Delivery::Multicast);
                report.units_compared += 1;
                self.await_probe_acks(host, cancel)?;

                let reported_by: Vec<usize> = self
                    .state
                    .remote_teams()
                    .filter(|&t| self.state.teams[t].desync_diverged)
                    .collect();
                if !reported_by.is_empty() {
                    warn!("{id} diverged on team(s) {reported_by:?}");
                    report.divergent.push(UnitDivergence {
                        unit: id,
                        fields: Vec::new(),
                        reported_by,
                    });
                }
            }
        }
        Ok(())
    }

    fn await_probe_acks(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError> {
        let start = self.now_ms();
        self.state.pending_notified = 0;
        loop {
            self.process_incoming(host);
            let waiting =
                self.await_remote_teams(host, start, |state, team| !state.teams[team].desync_acked);
            if !waiting {
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            host.process_tick();
        }
    }

    fn answer_probes(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
    ) -> Result<DesyncReport, RemoteError> {
        let mut report = DesyncReport::default();
        loop {
            self.process_incoming(host);
            while let Some((unit, theirs)) = self.state.desync_probes.pop_front() {
                let diverged = self.compare_probe(host, unit, &theirs, &mut report);
                self.send(
                    &Message::DesyncAck {
                        team: self.player_team as u16,
                        diverged,
                    },
                    Delivery::Multicast,
                );
            }
            if std::mem::take(&mut self.state.desync_analysis_done) {
                return Ok(report);
            }
            if cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            host.process_tick();
        }
    }

    /// Compare one probe with the local unit. Returns true when it differs
    /// or the unit is unknown here.
    fn compare_probe(
        &mut self,
        host: &mut dyn GameHost,
        unit: UnitId,
        theirs: &DesyncSnapshot,
        report: &mut DesyncReport,
    ) -> bool {
        report.units_compared += 1;
        let Some(ours) = host.unit(unit).map(|u| u.desync_snapshot()) else {
            warn!("desync probe for unknown {unit}");
            self.stats.unknown_unit += 1;
            host.show_message(&format!("desync: {unit} does not exist locally"));
            report.unknown_units.push(unit);
            return true;
        };
        let fields = ours.diff(theirs);
        if fields.is_empty() {
            return false;
        }
        if report.divergent.is_empty() {
            warn!("{unit} is out of sync:");
            for diff in &fields {
                warn!("  {}: local {} host {}", diff.field, diff.local, diff.remote);
            }
        } else {
            warn!("{unit} is out of sync ({} field(s))", fields.len());
        }
        report.divergent.push(UnitDivergence {
            unit,
            fields,
            reported_by: Vec::new(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::state::TeamKind;
    use crate::test_support::{
        ScriptedHost, ScriptedUnit, in_game_remote_with_clock, peer_remote_with_clock,
    };

    fn unit_with(hits: u16) -> ScriptedUnit {
        ScriptedUnit {
            snapshot: DesyncSnapshot {
                hits,
                grid_x: 4,
                grid_y: 9,
                ..DesyncSnapshot::default()
            },
            ..ScriptedUnit::default()
        }
    }

    #[test]
    fn matching_checksums_report_in_sync() {
        let (mut remote, _network) = in_game_remote_with_clock(3, ManualClock::new(0));
        let mut host = ScriptedHost::default();
        for team in [1, 2] {
            remote.dispatch(
                &mut host,
                Message::TurnChecksum { team, next_turn_index: 1, crc16: 0xBEEF }.encode(),
            );
        }
        let in_sync = remote
            .check_desync(&mut host, 0, 0xBEEF, &CancellationToken::new())
            .unwrap();
        assert!(in_sync);
    }

    #[test]
    fn differing_checksum_reports_desync() {
        let (mut remote, _network) = in_game_remote_with_clock(3, ManualClock::new(0));
        let mut host = ScriptedHost::default();
        remote.dispatch(
            &mut host,
            Message::TurnChecksum { team: 1, next_turn_index: 1, crc16: 0xBEEF }.encode(),
        );
        remote.dispatch(
            &mut host,
            Message::TurnChecksum { team: 2, next_turn_index: 1, crc16: 0x1234 }.encode(),
        );
        let in_sync = remote
            .check_desync(&mut host, 0, 0xBEEF, &CancellationToken::new())
            .unwrap();
        assert!(!in_sync);
    }

    #[test]
    fn peer_compares_probes_until_done() {
        let (mut remote, _network) = peer_remote_with_clock(2, ManualClock::new(0));
        assert!(!remote.is_host());
        assert_eq!(remote.player_team(), 1);
        let mut host = ScriptedHost::default();
        host.units.insert(UnitId(21), unit_with(10));
        host.units.insert(UnitId(22), unit_with(10));
        host.units.insert(UnitId(23), unit_with(10));

        let probes = [
            (21, unit_with(10).snapshot),
            (22, unit_with(7).snapshot),
            (23, unit_with(3).snapshot),
            (99, unit_with(10).snapshot),
        ];
        for (id, snapshot) in probes {
            remote.dispatch(
                &mut host,
                Message::DesyncProbe { unit: UnitId(id), snapshot }.encode(),
            );
        }
        remote.dispatch(&mut host, Message::DesyncAnalysisDone { team: 0 }.encode());

        let report = remote
            .analyze_desync(&mut host, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.units_compared, 4);
        let divergent: Vec<u16> = report.divergent.iter().map(|d| d.unit.0).collect();
        assert_eq!(divergent, vec![22, 23]);
        assert_eq!(report.divergent[0].fields.len(), 1);
        assert_eq!(report.divergent[0].fields[0].field, "hits");
        assert_eq!(report.unknown_units, vec![UnitId(99)]);
        assert_eq!(host.saves, vec![("save.dbg".to_string(), "debug save".to_string())]);
        // The completion signal is consumed.
        assert!(!remote.state().desync_analysis_done);
        assert!(remote.state().desync_probes.is_empty());
    }

    #[test]
    fn stray_probes_do_not_outlive_an_analysis() {
        let (mut remote, _network) = in_game_remote_with_clock(2, ManualClock::new(0));
        let mut host = ScriptedHost::default();
        remote.dispatch(
            &mut host,
            Message::DesyncProbe {
                unit: UnitId(40),
                snapshot: unit_with(1).snapshot,
            }
            .encode(),
        );
        assert_eq!(remote.state().desync_probes.len(), 1);

        // Nothing to probe on this side, so the host finishes at once.
        let report = remote
            .analyze_desync(&mut host, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.units_compared, 0);
        assert!(remote.state().desync_probes.is_empty());
    }

    #[test]
    fn host_probe_skips_mining_stations_and_drops_silent_peer() {
        let clock = ManualClock::new(0);
        let (mut remote, _network) = in_game_remote_with_clock(2, clock.clone());
        let mut host = ScriptedHost::ticking(clock, 500);
        host.units.insert(UnitId(30), unit_with(5));
        host.units.insert(
            UnitId(31),
            ScriptedUnit {
                mining_station: true,
                ..unit_with(5)
            },
        );
        host.lists.insert(UnitList::Stationary, vec![UnitId(30), UnitId(31)]);

        let report = remote
            .analyze_desync(&mut host, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.units_compared, 1);
        assert!(report.is_clean());
        assert_eq!(remote.team_kind(1), TeamKind::Disconnected);
        assert_eq!(host.saves.len(), 1);
    }

    #[test]
    fn restart_signal_is_consumed() {
        let (mut remote, _network) = in_game_remote_with_clock(2, ManualClock::new(0));
        let mut host = ScriptedHost::default();
        remote.dispatch(&mut host, Message::RestartAfterDesync { team: 1 }.encode());
        assert!(remote.check_restart_after_desync(&mut host));
        assert!(!remote.check_restart_after_desync(&mut host));
    }
}
