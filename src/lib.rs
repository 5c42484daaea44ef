// cardlink: peer-to-peer lobby and signaling layer for a real-time card game
// Handshake negotiation through a polling relay, a typed message protocol
// over established peer channels, and host-authoritative lobby replication

pub mod config;
pub mod error;
pub mod ids;
pub mod lobby;
pub mod p2p;
pub mod signaling;
pub mod validate;

pub use error::{ChannelError, ControlError, LobbyError, ProtocolError, SignalingError};
pub use lobby::{GameLobby, LobbyEvent, LobbyManager, P2pLobbyController};
pub use p2p::{MessagePayload, P2pEvent, P2pService, PeerChannel, ProtocolMessage};
pub use signaling::{
    HandshakePhase, HttpRelay, Role, SessionRelay, SignalingClient, SignalingStore,
};
pub use validate::{DeckValidation, DeckValidator, FormatSizeValidator};
