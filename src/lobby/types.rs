// Lobby data model: players, statuses, format, deck bindings
// GameLobby is serialized whole as the game-state-sync payload, so every
// field here is part of the wire shape (camelCase)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a lobby. Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LobbyStatus {
    /// Host is still configuring; not yet joinable.
    Setup,
    /// Open for registration.
    Open,
    /// Game started; membership is frozen.
    InProgress,
    /// Torn down by the host or by losing all peers.
    Closed,
}

/// Per-player readiness within a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerStatus {
    NotReady,
    Ready,
    /// Peer channel dropped while the game was in progress.
    Disconnected,
}

/// Supported match formats. Drives deck validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameFormat {
    Standard,
    Commander,
    Draft,
}

impl GameFormat {
    /// Parse a config string; unknown values fall back to Standard.
    pub fn parse_or_default(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "commander" => GameFormat::Commander,
            "draft" => GameFormat::Draft,
            _ => GameFormat::Standard,
        }
    }
}

impl fmt::Display for GameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameFormat::Standard => "standard",
            GameFormat::Commander => "commander",
            GameFormat::Draft => "draft",
        };
        write!(f, "{}", name)
    }
}

/// A deck bound to a player slot. Binding can succeed with an invalid deck;
/// validity only gates game start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckBinding {
    pub deck_id: String,
    pub deck_name: String,
    pub card_count: usize,
    pub is_valid: bool,
}

/// One registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub status: PlayerStatus,
    pub joined_at: u64,
    pub deck: Option<DeckBinding>,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, joined_at: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: PlayerStatus::NotReady,
            joined_at,
            deck: None,
        }
    }

    /// Ready with a valid deck bound.
    pub fn is_start_ready(&self) -> bool {
        self.status == PlayerStatus::Ready && self.has_valid_deck()
    }

    pub fn has_valid_deck(&self) -> bool {
        self.deck.as_ref().map(|d| d.is_valid).unwrap_or(false)
    }
}

/// Player count bounds and format for a new lobby.
#[derive(Debug, Clone, Copy)]
pub struct LobbySettings {
    pub format: GameFormat,
    pub max_players: usize,
    pub min_players: usize,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            format: GameFormat::Standard,
            max_players: 4,
            min_players: 2,
        }
    }
}

/// The lobby model. The host's copy is the source of truth; client copies
/// are projections replaced wholesale by game-state-sync messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameLobby {
    pub game_code: String,
    pub format: GameFormat,
    pub status: LobbyStatus,
    pub host_id: String,
    pub max_players: usize,
    pub min_players: usize,
    /// Ordered by join time.
    pub players: Vec<Player>,
}

impl GameLobby {
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }
}

/// A deck as handed over for validation. Card semantics live in the rules
/// engine; here a deck is just an identified list of card names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: String,
    pub name: String,
    pub cards: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_status_wire_tags() {
        let json = serde_json::to_string(&LobbyStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let json = serde_json::to_string(&PlayerStatus::NotReady).unwrap();
        assert_eq!(json, "\"not-ready\"");
    }

    #[test]
    fn test_player_start_readiness() {
        let mut p = Player::new("p-1", "Ari", 0);
        assert!(!p.is_start_ready());

        p.status = PlayerStatus::Ready;
        assert!(!p.is_start_ready()); // no deck yet

        p.deck = Some(DeckBinding {
            deck_id: "d-1".into(),
            deck_name: "Mono Red".into(),
            card_count: 60,
            is_valid: false,
        });
        assert!(!p.is_start_ready()); // deck bound but invalid

        p.deck.as_mut().unwrap().is_valid = true;
        assert!(p.is_start_ready());
    }

    #[test]
    fn test_format_parse_fallback() {
        assert_eq!(GameFormat::parse_or_default("commander"), GameFormat::Commander);
        assert_eq!(GameFormat::parse_or_default("unknown"), GameFormat::Standard);
    }

    #[test]
    fn test_lobby_serializes_camel_case() {
        let lobby = GameLobby {
            game_code: "KWRTXQ".into(),
            format: GameFormat::Standard,
            status: LobbyStatus::Open,
            host_id: "p-host".into(),
            max_players: 4,
            min_players: 2,
            players: vec![Player::new("p-host", "Noor", 10)],
        };
        let json: serde_json::Value = serde_json::to_value(&lobby).unwrap();
        assert_eq!(json["gameCode"], "KWRTXQ");
        assert_eq!(json["maxPlayers"], 4);
        assert_eq!(json["players"][0]["joinedAt"], 10);
    }
}
