// Synchronization barriers and the peer timeout policy.
//
// Two kinds of barrier keep peers in lockstep:
// - **Frame sync** (`synchronize`, packet 01): a soft per-tick barrier on a
//   counter modulo 64. Each peer announces its counter; a remote team whose
//   last announced value is still one behind the local counter is waited
//   for. Announcements repeat every `frame_sync_resend_ms`, and immediately
//   after each advance.
// - **Turn barriers** (`wait_begin_turn_acknowledge` packet 00,
//   `wait_end_turn_acknowledge` packet 52, and the checksum barrier in
//   `desync.rs`, packet 45): unbounded indices, incremented locally on entry
//   and rebroadcast every `ping_period_ms` until every live remote team has
//   reached the same index.
//
// While waiting, a team silent for `response_pending_ms` is reported once
// through `GameHost::on_peer_pending`; a team silent for longer than
// `response_timeout_ms` is dropped (`Remote::drop_team`). Silence is
// measured from the later of the wait's start and the team's last counter
// change, so a peer is never timed out for quiet periods between barriers.
//
// Every blocking loop iteration drains packets, checks the exit condition,
// checks the cancellation token and then yields one tick to the game.

use log::{debug, info, warn};
use skirmish_protocol::Message;

use crate::cancel::CancellationToken;
use crate::error::RemoteError;
use crate::host::GameHost;
use crate::remote::{Delivery, Remote};
use crate::state::{DropReason, SessionState, TeamSync};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// Check once and return `Pending` if peers are behind.
    Async,
    /// Keep ticking until every peer has caught up or been dropped.
    Blocking,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// Frame sync does not apply right now (local game, or the host turned
    /// it off); nothing was done.
    Idle,
    /// At least one remote team is behind.
    Pending,
    /// Every remote team caught up; the counter advanced.
    Advanced,
}

impl Remote {
    /// Per-tick frame sync barrier.
    pub fn synchronize(
        &mut self,
        host: &mut dyn GameHost,
        mode: SyncMode,
        cancel: &CancellationToken,
    ) -> Result<SyncStatus, RemoteError> {
        if !self.is_network_game || !host.frame_sync_enabled() {
            let now = self.now_ms();
            self.state.suspend_frame_sync(now);
            return Ok(SyncStatus::Idle);
        }
        loop {
            self.process_incoming(host);
            self.send_frame_sync_if_due();
            let now = self.now_ms();
            let wait_start = *self.state.sync_wait_start_ms.get_or_insert(now);
            let waiting =
                self.await_remote_teams(host, wait_start, |state, team| {
                    state.is_frame_sync_behind(team)
                });
            if !waiting {
                self.state.advance_frame_sync();
                return Ok(SyncStatus::Advanced);
            }
            if mode == SyncMode::Async {
                return Ok(SyncStatus::Pending);
            }
            if cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            host.process_tick();
        }
    }

    /// Drive the session from the UI loop: drain packets every call, and run
    /// a frame sync at most once per `ui_frame_period_ms`.
    pub fn ui_process_tick(
        &mut self,
        host: &mut dyn GameHost,
        mode: SyncMode,
        cancel: &CancellationToken,
    ) -> Result<SyncStatus, RemoteError> {
        self.process_incoming(host);
        let now = self.now_ms();
        let due = self
            .last_ui_tick_ms
            .is_none_or(|last| now.saturating_sub(last) >= self.config.ui_frame_period_ms);
        if !due {
            return Ok(SyncStatus::Idle);
        }
        self.last_ui_tick_ms = Some(now);
        self.synchronize(host, mode, cancel)
    }

    /// Begin-turn barrier (packet 00).
    pub fn wait_begin_turn_acknowledge(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError> {
        let own = &mut self.state.teams[self.player_team];
        own.frame_counter = own.frame_counter.wrapping_add(1);
        let index = own.frame_counter;
        debug!("begin-turn barrier {index}");
        self.turn_barrier(
            host,
            cancel,
            self.player_team,
            index,
            |team| team.frame_counter,
            |team, index| Message::BeginTurn { team, index },
        )
    }

    /// End-turn barrier (packet 52).
    pub fn wait_end_turn_acknowledge(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError> {
        let own = &mut self.state.teams[self.player_team];
        own.turn_index = own.turn_index.wrapping_add(1);
        let index = own.turn_index;
        debug!("end-turn barrier {index}");
        self.turn_barrier(
            host,
            cancel,
            self.player_team,
            index,
            |team| team.turn_index,
            |team, index| Message::EndTurnSync { team, index },
        )
    }

    /// Wait until every live remote team reports `read(team) >= index`,
    /// announcing `announce(local_team, index)` every ping period.
    pub(crate) fn turn_barrier(
        &mut self,
        host: &mut dyn GameHost,
        cancel: &CancellationToken,
        local_team: usize,
        index: u32,
        read: fn(&TeamSync) -> u32,
        announce: impl Fn(u16, u32) -> Message,
    ) -> Result<(), RemoteError> {
        let start = self.now_ms();
        let mut last_sent: Option<u64> = None;
        self.state.pending_notified = 0;
        loop {
            self.process_incoming(host);
            let now = self.now_ms();
            if last_sent.is_none_or(|sent| now.saturating_sub(sent) >= self.config.ping_period_ms)
            {
                self.send(&announce(local_team as u16, index), Delivery::Multicast);
                last_sent = Some(now);
            }
            let waiting = self.await_remote_teams(host, start, |state, team| {
                read(&state.teams[team]) < index
            });
            if !waiting {
                self.state.pending_notified = 0;
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            host.process_tick();
        }
    }

    fn send_frame_sync_if_due(&mut self) {
        let now = self.now_ms();
        let due = self.state.frame_sync_resend
            || self
                .state
                .last_frame_sync_sent_ms
                .is_none_or(|sent| now.saturating_sub(sent) >= self.config.frame_sync_resend_ms);
        if !due {
            return;
        }
        let message = Message::FrameSync {
            team: self.player_team as u16,
            counter: self.state.frame_sync_counter,
        };
        self.send(&message, Delivery::Multicast);
        self.state.frame_sync_resend = false;
        self.state.last_frame_sync_sent_ms = Some(now);
    }

    /// Apply the pending and timeout rules to every live remote team for
    /// which `behind` holds. Returns true while any of them is still
    /// awaited; dropped teams no longer count.
    pub(crate) fn await_remote_teams(
        &mut self,
        host: &mut dyn GameHost,
        wait_start: u64,
        behind: impl Fn(&SessionState, usize) -> bool,
    ) -> bool {
        let now = self.now_ms();
        let lagging: Vec<usize> = self
            .state
            .remote_teams()
            .filter(|&team| behind(&self.state, team))
            .collect();
        let mut waiting = false;
        for team in lagging {
            let since = wait_start.max(self.state.teams[team].last_advanced_ms);
            let silent = now.saturating_sub(since);
            if silent > self.config.response_timeout_ms {
                warn!("team {team} silent for {silent} ms, dropping");
                self.drop_team(host, team, DropReason::TimedOut);
                continue;
            }
            waiting = true;
            if silent >= self.config.response_pending_ms && self.state.mark_pending_notified(team) {
                info!("waiting for team {team} ({silent} ms)");
                host.on_peer_pending(team);
            }
        }
        waiting
    }
}
