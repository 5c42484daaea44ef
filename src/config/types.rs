// cardlink configuration types
// All settings with sensible defaults so a missing or partial file still works

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub signaling: SignalingConfig,
    #[serde(default)]
    pub lobby: LobbyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalingConfig {
    // Base URL of the signaling relay (HTTP)
    pub relay_url: String,

    // Interval between session polls in milliseconds
    pub poll_interval_ms: u64,

    // Session lifetime granted by the relay, in seconds
    pub session_ttl_secs: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:8080".to_string(),
            poll_interval_ms: 1000,
            session_ttl_secs: 300, // 5 minutes covers the slowest handshakes
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LobbyConfig {
    // Default match format: "standard", "commander", "draft"
    pub default_format: String,

    // Player count bounds for a lobby
    pub max_players: usize,
    pub min_players: usize,

    // Number of chat messages kept for re-render
    pub chat_history_limit: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            default_format: "standard".to_string(),
            max_players: 4,
            min_players: 2,
            chat_history_limit: 100,
        }
    }
}
