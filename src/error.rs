// Error types for the cardlink networking stack
// Signaling, peer-channel, and lobby failures are kept as separate taxonomies
// because they surface to different callers (state controller vs. lobby UI)

use thiserror::Error;

use crate::lobby::LobbyStatus;

/// Errors on the signaling path: relay contract violations, expiry, misuse.
#[derive(Debug, Clone, Error)]
pub enum SignalingError {
    /// Create/join rejected by the relay (rate limit, bad request, ...).
    #[error("relay rejected request: {message}")]
    Relay { message: String },

    /// Game code unknown, or the session was deleted server-side.
    #[error("session not found")]
    SessionNotFound,

    /// The session passed its hard expiry. Terminal: never retried.
    #[error("session expired")]
    SessionExpired,

    /// A client already joined this session.
    #[error("session already has a client")]
    SessionFull,

    /// Requested game code is still bound to a joinable session.
    #[error("game code already in use")]
    CodeTaken,

    /// Operation attempted with no live session (caller misuse).
    #[error("no active session")]
    NoActiveSession,

    /// Offer/answer written by the wrong side of the handshake.
    #[error("operation not permitted for this role")]
    RoleMismatch,

    /// Offer or answer was already set; each is written at most once.
    #[error("{field} already set for this session")]
    AlreadySet { field: &'static str },

    /// Network-level failure talking to the relay (transient).
    #[error("relay transport error: {0}")]
    Transport(String),
}

impl SignalingError {
    /// Stable identifier carried in relay error bodies.
    pub fn wire_code(&self) -> &'static str {
        match self {
            SignalingError::Relay { .. } => "relay_error",
            SignalingError::SessionNotFound => "session_not_found",
            SignalingError::SessionExpired => "session_expired",
            SignalingError::SessionFull => "session_full",
            SignalingError::CodeTaken => "code_taken",
            SignalingError::NoActiveSession => "no_active_session",
            SignalingError::RoleMismatch => "role_mismatch",
            SignalingError::AlreadySet { field: "offer" } => "offer_already_set",
            SignalingError::AlreadySet { .. } => "answer_already_set",
            SignalingError::Transport(_) => "transport_error",
        }
    }

    /// Reconstruct a typed error from a relay error body.
    pub fn from_wire(code: &str, message: &str) -> Self {
        match code {
            "session_not_found" => SignalingError::SessionNotFound,
            "session_expired" => SignalingError::SessionExpired,
            "session_full" => SignalingError::SessionFull,
            "code_taken" => SignalingError::CodeTaken,
            "no_active_session" => SignalingError::NoActiveSession,
            "role_mismatch" => SignalingError::RoleMismatch,
            "offer_already_set" => SignalingError::AlreadySet { field: "offer" },
            "answer_already_set" => SignalingError::AlreadySet { field: "answer" },
            _ => SignalingError::Relay {
                message: message.to_string(),
            },
        }
    }

    /// True for errors that can never resolve by waiting or retrying.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SignalingError::SessionNotFound | SignalingError::SessionExpired
        )
    }
}

/// Errors sending over an established peer channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Target peer is not attached to the service.
    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    /// The underlying channel was closed by the remote side.
    #[error("peer channel closed")]
    Closed,

    /// Outbound message failed to serialize.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A malformed inbound frame. Logged and dropped, never fatal to the channel.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Combined failure type for controller operations that cross the lobby,
/// channel, and signaling layers.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Lobby(#[from] LobbyError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Signaling(#[from] SignalingError),
}

/// Expected business outcomes of lobby mutations.
/// These are results, not exceptions: the UI renders specific guidance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LobbyError {
    #[error("lobby is full")]
    LobbyFull,

    #[error("player already in lobby: {0}")]
    DuplicatePlayer(String),

    #[error("no such player: {0}")]
    UnknownPlayer(String),

    /// Membership changes require an open lobby.
    #[error("lobby is not open")]
    NotOpen,

    #[error("invalid lobby status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: LobbyStatus, to: LobbyStatus },

    /// Start requirements not met (readiness, deck validity, player count).
    #[error("lobby is not ready to start")]
    NotReadyToStart,

    /// The caller is not the lobby host.
    #[error("only the host may perform this operation")]
    NotHost,
}
