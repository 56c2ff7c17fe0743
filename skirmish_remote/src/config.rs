// Tunables for a remote session.
//
// `RemoteConfig` is plain data with serde derives so it can be loaded from a
// JSON file next to the game's other settings. Every field has a default;
// a JSON document only needs to name the fields it overrides. Timeouts are in
// milliseconds of the session `Clock`.

use serde::{Deserialize, Serialize};
use skirmish_protocol::PROTOCOL_VERSION;

/// Default UDP port for hosts; clients bind an ephemeral port.
pub const DEFAULT_UDP_PORT: u16 = 31554;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Name shown to other peers in the lobby.
    pub player_name: String,
    pub protocol_version: u32,
    pub udp_port: u16,
    /// A peer silent for longer than this is dropped from the match.
    pub response_timeout_ms: u64,
    /// After this long the UI is told a peer is slow.
    pub response_pending_ms: u64,
    /// Rebroadcast period for turn barrier indices.
    pub ping_period_ms: u64,
    /// Rebroadcast period for the per-tick frame sync counter.
    pub frame_sync_resend_ms: u64,
    /// Minimum spacing between frame syncs driven from the UI loop.
    pub ui_frame_period_ms: u64,
    /// How long a leaving peer waits for acknowledgements.
    pub leave_timeout_ms: u64,
    /// Emergency save written after a desync analysis.
    pub desync_save_file: String,
    pub desync_save_title: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            player_name: "Player".into(),
            protocol_version: PROTOCOL_VERSION,
            udp_port: DEFAULT_UDP_PORT,
            response_timeout_ms: 30_000,
            response_pending_ms: 3_000,
            ping_period_ms: 3_000,
            frame_sync_resend_ms: 500,
            ui_frame_period_ms: 1000 / 24,
            leave_timeout_ms: 5_000,
            desync_save_file: "save.dbg".into(),
            desync_save_title: "debug save".into(),
        }
    }
}

impl RemoteConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = RemoteConfig::default();
        assert_eq!(config.response_timeout_ms, 30_000);
        assert_eq!(config.response_pending_ms, 3_000);
        assert_eq!(config.frame_sync_resend_ms, 500);
        assert_eq!(config.ui_frame_period_ms, 41);
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            RemoteConfig::from_json(r#"{"player_name": "Ursula", "response_timeout_ms": 500}"#)
                .unwrap();
        assert_eq!(config.player_name, "Ursula");
        assert_eq!(config.response_timeout_ms, 500);
        assert_eq!(config.ping_period_ms, 3_000);
    }

    #[test]
    fn json_roundtrip() {
        let config = RemoteConfig {
            udp_port: 4000,
            ..RemoteConfig::default()
        };
        let back = RemoteConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
