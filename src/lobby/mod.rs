// Lobby module: host-authoritative lobby model and the P2P controller that
// composes signaling, peer messaging, and lobby state

pub mod controller;
pub mod manager;
pub mod types;

pub use controller::{ChatEntry, LobbyEvent, P2pLobbyController};
pub use manager::{DeckUpdateOutcome, LobbyManager};
pub use types::{
    Deck, DeckBinding, GameFormat, GameLobby, LobbySettings, LobbyStatus, Player, PlayerStatus,
};
