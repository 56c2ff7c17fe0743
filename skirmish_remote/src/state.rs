// Per-session synchronization state.
//
// Everything the barriers, the dispatcher and the desync detector share lives
// in one `SessionState` owned by a `Remote`. Per-team values are indexed by
// team slot (0..MAX_TEAM_COUNT); the local team's entry holds the values this
// peer last sent, the others hold what was last received.
//
// Counter semantics:
// - `frame_counter` is the begin-turn index (packet 00), unbounded.
// - `frame_sync_mirror` is the last per-tick frame sync value received
//   (packet 01). It starts at 63 so that a team counts as "behind" until its
//   first frame sync for counter 0 arrives.
// - `turn_index` is the end-turn index (packet 52), unbounded.
// - `next_turn_index` / `crc16` come from turn checksum packets (45).
//
// `last_advanced_ms` is stamped whenever any of a team's counters changes and
// is what the response timeout is measured against.

use std::collections::VecDeque;

use skirmish_protocol::{DesyncSnapshot, MAX_TEAM_COUNT, UnitId};

/// Modulus of the per-tick frame sync counter.
pub const FRAME_SYNC_MODULUS: u32 = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TeamKind {
    /// Slot not taken.
    #[default]
    None,
    /// The local player.
    Player,
    /// A live remote peer.
    Remote,
    /// Dropped while other remote teams remained.
    Eliminated,
    /// The last remote team, dropped; the match continues as local play.
    Disconnected,
}

/// Why a remote team left the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Silent for longer than the response timeout.
    TimedOut,
    /// Announced its own departure (packet 07).
    Left,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeamSync {
    pub kind: TeamKind,
    pub frame_counter: u32,
    pub frame_sync_mirror: u32,
    pub turn_index: u32,
    pub next_turn_index: u32,
    pub crc16: u16,
    pub leave_request_id: u8,
    pub last_advanced_ms: u64,
    pub supplies_received: bool,
    /// The team confirmed the session seed picked by the host.
    pub seed_acked: bool,
    pub desync_acked: bool,
    pub desync_diverged: bool,
}

impl Default for TeamSync {
    fn default() -> Self {
        Self {
            kind: TeamKind::None,
            frame_counter: 0,
            frame_sync_mirror: FRAME_SYNC_MODULUS - 1,
            turn_index: 0,
            next_turn_index: 0,
            crc16: 0,
            leave_request_id: 0,
            last_advanced_ms: 0,
            supplies_received: false,
            seed_acked: false,
            desync_acked: false,
            desync_diverged: false,
        }
    }
}

/// The delayed-reaction token: which team currently resolves reaction fire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReactionToken {
    pub team: usize,
    pub active: bool,
    pub counter: u32,
}

#[derive(Clone, Debug)]
pub struct SessionState {
    pub teams: [TeamSync; MAX_TEAM_COUNT],
    /// Local per-tick frame sync counter, modulo `FRAME_SYNC_MODULUS`.
    pub frame_sync_counter: u32,
    /// Send the frame sync counter on the next `synchronize` call without
    /// waiting for the resend period.
    pub frame_sync_resend: bool,
    pub last_frame_sync_sent_ms: Option<u64>,
    /// When the current soft-barrier wait started, if one is in progress.
    pub sync_wait_start_ms: Option<u64>,
    /// Teams already reported as pending during the current wait (bitmask).
    pub pending_notified: u8,
    pub rng_seed: u32,
    pub seed_received: bool,
    pub reaction_token: ReactionToken,
    /// Desync probes received and not yet compared.
    pub desync_probes: VecDeque<(UnitId, DesyncSnapshot)>,
    pub desync_analysis_done: bool,
    pub restart_after_desync: bool,
    pub unpause_event: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            teams: Default::default(),
            frame_sync_counter: 0,
            frame_sync_resend: true,
            last_frame_sync_sent_ms: None,
            sync_wait_start_ms: None,
            pending_notified: 0,
            rng_seed: 0,
            seed_received: false,
            reaction_token: ReactionToken::default(),
            desync_probes: VecDeque::new(),
            desync_analysis_done: false,
            restart_after_desync: false,
            unpause_event: false,
        }
    }
}

impl SessionState {
    /// Clear all counters and signals. Team kinds are cleared too; callers
    /// re-derive them from the lobby roster.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Indices of teams that are live remote peers.
    pub fn remote_teams(&self) -> impl Iterator<Item = usize> + '_ {
        self.teams
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind == TeamKind::Remote)
            .map(|(i, _)| i)
    }

    pub fn remote_team_count(&self) -> usize {
        self.remote_teams().count()
    }

    /// A remote team is behind on the frame sync barrier when its mirror is
    /// still one step before the local counter.
    pub fn is_frame_sync_behind(&self, team: usize) -> bool {
        let previous = (self.frame_sync_counter + FRAME_SYNC_MODULUS - 1) % FRAME_SYNC_MODULUS;
        self.teams[team].frame_sync_mirror == previous
    }

    /// Step the frame sync counter after a completed barrier.
    pub fn advance_frame_sync(&mut self) {
        self.frame_sync_counter = (self.frame_sync_counter + 1) % FRAME_SYNC_MODULUS;
        self.frame_sync_resend = true;
        self.sync_wait_start_ms = None;
        self.pending_notified = 0;
    }

    /// Forget any soft-barrier wait in progress while frame sync does not
    /// apply, so silence is measured afresh once it does again.
    pub fn suspend_frame_sync(&mut self, now_ms: u64) {
        self.frame_sync_resend = true;
        self.sync_wait_start_ms = None;
        self.pending_notified = 0;
        self.touch_all(now_ms);
    }

    /// Stamp every live team as just heard from. Used when a match starts so
    /// the first barrier does not time out on stale timestamps.
    pub fn touch_all(&mut self, now_ms: u64) {
        for team in &mut self.teams {
            team.last_advanced_ms = now_ms;
        }
    }

    pub(crate) fn mark_pending_notified(&mut self, team: usize) -> bool {
        let bit = 1u8 << team;
        let first = self.pending_notified & bit == 0;
        self.pending_notified |= bit;
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_team_is_behind_on_counter_zero() {
        let state = SessionState::default();
        assert!(state.is_frame_sync_behind(1));
    }

    #[test]
    fn frame_sync_counter_wraps_at_64() {
        let mut state = SessionState::default();
        for _ in 0..63 {
            state.advance_frame_sync();
        }
        assert_eq!(state.frame_sync_counter, 63);
        state.teams[1].frame_sync_mirror = 62;
        assert!(state.is_frame_sync_behind(1));
        state.teams[1].frame_sync_mirror = 63;
        assert!(!state.is_frame_sync_behind(1));

        state.advance_frame_sync();
        assert_eq!(state.frame_sync_counter, 0);
        // Mirror 63 is now one behind counter 0.
        assert!(state.is_frame_sync_behind(1));
        state.teams[1].frame_sync_mirror = 0;
        assert!(!state.is_frame_sync_behind(1));
    }

    #[test]
    fn a_team_ahead_is_not_behind() {
        let mut state = SessionState::default();
        state.advance_frame_sync();
        state.teams[2].frame_sync_mirror = 2;
        assert!(!state.is_frame_sync_behind(2));
    }

    #[test]
    fn pending_notification_is_once_per_wait() {
        let mut state = SessionState::default();
        assert!(state.mark_pending_notified(3));
        assert!(!state.mark_pending_notified(3));
        assert!(state.mark_pending_notified(0));
        state.advance_frame_sync();
        assert!(state.mark_pending_notified(3));
    }

    #[test]
    fn suspending_frame_sync_clears_the_wait() {
        let mut state = SessionState::default();
        state.frame_sync_resend = false;
        state.sync_wait_start_ms = Some(500);
        state.mark_pending_notified(1);
        state.suspend_frame_sync(40_000);
        assert!(state.frame_sync_resend);
        assert_eq!(state.sync_wait_start_ms, None);
        assert_eq!(state.pending_notified, 0);
        assert!(state.teams.iter().all(|t| t.last_advanced_ms == 40_000));
    }

    #[test]
    fn remote_teams_lists_only_live_peers() {
        let mut state = SessionState::default();
        state.teams[0].kind = TeamKind::Player;
        state.teams[1].kind = TeamKind::Remote;
        state.teams[2].kind = TeamKind::Eliminated;
        state.teams[3].kind = TeamKind::Remote;
        assert_eq!(state.remote_teams().collect::<Vec<_>>(), vec![1, 3]);
        state.reset();
        assert_eq!(state.remote_team_count(), 0);
        assert_eq!(state.teams[1].frame_sync_mirror, 63);
    }
}
