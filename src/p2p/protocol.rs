// cardlink peer protocol definition
// Typed messages exchanged over an established peer channel. The envelope is
// JSON: {"type": ..., "senderId": ..., "timestamp": ..., "payload": ...}

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::ids::now_ms;
use crate::lobby::GameLobby;

/// Wire envelope. `senderId` and `timestamp` are stamped by the sending
/// service, never by application code, so per-sender ordering is at least
/// locally consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMessage {
    pub sender_id: String,
    pub timestamp: u64,
    #[serde(flatten)]
    pub payload: MessagePayload,
}

impl ProtocolMessage {
    /// Build a stamped envelope.
    pub fn new(sender_id: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            sender_id: sender_id.into(),
            timestamp: now_ms(),
            payload,
        }
    }

    /// Serialize for transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize an inbound frame. Unknown types and malformed payloads
    /// both surface as ProtocolError; the caller drops them.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The message type determines the payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum MessagePayload {
    /// Application-level hello from a freshly connected peer. Registers the
    /// sender as a Player once the host accepts.
    ConnectionRequest {
        player_name: String,
        game_code: String,
    },

    /// Host's admission reply, carrying the current lobby.
    ConnectionAccept {
        host_name: String,
        lobby: GameLobby,
    },

    /// Authoritative lobby snapshot from the host. Supersedes any local
    /// optimistic state.
    GameStateSync { lobby: GameLobby },

    /// A player's lobby action, applied host-side.
    PlayerAction { action: PlayerAction },

    Chat { text: String },

    Emote { emote: String },

    /// Surfaced to the receiver's error state, never fatal to the channel.
    Error { code: String, message: String },
}

/// Lobby actions a non-host player can request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PlayerAction {
    SetReady { ready: bool },
    /// Full card list travels along so the host can run format validation.
    DeckSelected {
        deck_id: String,
        deck_name: String,
        cards: Vec<String>,
    },
    Concede,
}
