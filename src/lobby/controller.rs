// End-to-end lobby flow over P2P
// Composes the lobby authority, the polling signaling client, and the peer
// message service into the create/join/chat/start flow the application uses.
// All state mutation happens on the caller's event loop via next_event().

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ControlError, LobbyError, SignalingError};
use crate::ids::{generate_player_id, normalize_game_code, now_ms};
use crate::lobby::manager::{DeckUpdateOutcome, LobbyManager};
use crate::lobby::types::{
    Deck, DeckBinding, GameFormat, GameLobby, LobbySettings, LobbyStatus, PlayerStatus,
};
use crate::p2p::protocol::{MessagePayload, PlayerAction, ProtocolMessage};
use crate::p2p::service::{P2pEvent, P2pService};
use crate::p2p::transport::PeerChannel;
use crate::signaling::client::{SignalingClient, SignalingEvent};
use crate::signaling::relay::SessionRelay;
use crate::signaling::session::{Role, SessionUpdate};
use crate::signaling::state::{HandshakeEvent, HandshakePhase, SignalingController};
use crate::validate::DeckValidator;

/// One chat line kept for re-render.
#[derive(Debug, Clone)]
pub struct ChatEntry {
    pub sender_id: String,
    pub text: String,
    pub timestamp: u64,
}

/// Events surfaced to the application shell.
#[derive(Debug)]
pub enum LobbyEvent {
    /// Handshake progress for the current signaling session.
    PhaseChanged(HandshakePhase),
    /// New counterpart contributions (offer/answer/candidates) for the
    /// shell's transport layer to act on.
    SignalingUpdate(SessionUpdate),
    LobbyUpdated(GameLobby),
    GameStarted(GameLobby),
    ChatReceived(ChatEntry),
    EmoteReceived { sender_id: String, emote: String },
    ActionReceived { sender_id: String, action: PlayerAction },
    PeerLeft { peer_id: String },
    Error(String),
}

pub struct P2pLobbyController {
    role: Role,
    local_id: String,
    local_name: String,
    settings: LobbySettings,
    chat_limit: usize,
    game_code: Option<String>,

    /// Host only: the authoritative lobby.
    manager: Option<LobbyManager>,
    /// Client only: read-mostly projection, replaced by inbound snapshots.
    lobby_view: Option<GameLobby>,
    validator: Arc<dyn DeckValidator>,

    signaling: SignalingClient,
    signaling_rx: mpsc::UnboundedReceiver<SignalingEvent>,
    signaling_open: bool,
    handshake: SignalingController,
    _phase_rx: watch::Receiver<HandshakePhase>,
    last_update: Option<SessionUpdate>,
    /// Host: a fresh session is needed for the next joining peer.
    needs_rearm: bool,

    p2p: P2pService,
    p2p_rx: mpsc::UnboundedReceiver<P2pEvent>,
    p2p_open: bool,

    chat_log: VecDeque<ChatEntry>,
    pending: VecDeque<LobbyEvent>,
}

impl P2pLobbyController {
    /// Create a lobby and register its game code with the relay.
    pub async fn host_game(
        relay: Arc<dyn SessionRelay>,
        config: &Config,
        host_name: &str,
        validator: Arc<dyn DeckValidator>,
    ) -> Result<Self, SignalingError> {
        let local_id = generate_player_id();
        let settings = settings_from(config);
        let manager = LobbyManager::create(settings, &local_id, host_name, Arc::clone(&validator));
        let game_code = manager.game_code().to_string();

        let (mut signaling, signaling_rx) = SignalingClient::new(
            relay,
            Duration::from_millis(config.signaling.poll_interval_ms),
        );
        let (mut handshake, phase_rx) = SignalingController::new();
        let mut pending = VecDeque::new();

        if let Some(phase) = handshake.apply(HandshakeEvent::CreateRequested) {
            pending.push_back(LobbyEvent::PhaseChanged(phase));
        }
        signaling
            .create_session_with_code(&local_id, host_name, Some(game_code.clone()))
            .await?;
        if let Some(phase) = handshake.apply(HandshakeEvent::SessionCreated) {
            pending.push_back(LobbyEvent::PhaseChanged(phase));
        }

        let (p2p, p2p_rx) = P2pService::new(local_id.clone());
        Ok(Self {
            role: Role::Host,
            local_id,
            local_name: host_name.to_string(),
            settings,
            chat_limit: config.lobby.chat_history_limit,
            game_code: Some(game_code),
            manager: Some(manager),
            lobby_view: None,
            validator,
            signaling,
            signaling_rx,
            signaling_open: true,
            handshake,
            _phase_rx: phase_rx,
            last_update: None,
            needs_rearm: false,
            p2p,
            p2p_rx,
            p2p_open: true,
            chat_log: VecDeque::new(),
            pending,
        })
    }

    /// Resolve a shared code and register as the joining client.
    pub async fn join_game(
        relay: Arc<dyn SessionRelay>,
        config: &Config,
        game_code: &str,
        player_name: &str,
        validator: Arc<dyn DeckValidator>,
    ) -> Result<Self, SignalingError> {
        let local_id = generate_player_id();
        let code = normalize_game_code(game_code);

        let (mut signaling, mut signaling_rx) = SignalingClient::new(
            relay,
            Duration::from_millis(config.signaling.poll_interval_ms),
        );
        let (mut handshake, phase_rx) = SignalingController::new();
        let mut pending = VecDeque::new();

        if let Some(phase) = handshake.apply(HandshakeEvent::JoinRequested) {
            pending.push_back(LobbyEvent::PhaseChanged(phase));
        }
        signaling
            .join_session(&code, &local_id, player_name)
            .await?;

        // The join response is queued as the first update; use it to decide
        // whether signaling exchange is already underway
        let mut last_update = None;
        let mut has_offer = false;
        if let Ok(SignalingEvent::Update(update)) = signaling_rx.try_recv() {
            has_offer = update.offer.is_some();
            last_update = Some(update.clone());
            pending.push_back(LobbyEvent::SignalingUpdate(update));
        }
        if let Some(phase) = handshake.apply(HandshakeEvent::SessionJoined { has_offer }) {
            pending.push_back(LobbyEvent::PhaseChanged(phase));
        }

        let (p2p, p2p_rx) = P2pService::new(local_id.clone());
        Ok(Self {
            role: Role::Client,
            local_id,
            local_name: player_name.to_string(),
            settings: settings_from(config),
            chat_limit: config.lobby.chat_history_limit,
            game_code: Some(code),
            manager: None,
            lobby_view: None,
            validator,
            signaling,
            signaling_rx,
            signaling_open: true,
            handshake,
            _phase_rx: phase_rx,
            last_update,
            needs_rearm: false,
            p2p,
            p2p_rx,
            p2p_open: true,
            chat_log: VecDeque::new(),
            pending,
        })
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn game_code(&self) -> Option<&str> {
        self.game_code.as_deref()
    }

    pub fn phase(&self) -> HandshakePhase {
        self.handshake.phase()
    }

    /// The current lobby: authoritative on the host, projection on a client.
    pub fn lobby(&self) -> Option<&GameLobby> {
        match self.role {
            Role::Host => self.manager.as_ref().map(|m| m.lobby()),
            Role::Client => self.lobby_view.as_ref(),
        }
    }

    pub fn chat_history(&self) -> impl Iterator<Item = &ChatEntry> {
        self.chat_log.iter()
    }

    pub fn can_start_game(&self) -> bool {
        self.manager.as_ref().map(|m| m.can_start_game()).unwrap_or(false)
    }

    pub fn can_force_start(&self) -> bool {
        self.manager.as_ref().map(|m| m.can_force_start()).unwrap_or(false)
    }

    // ── Transport plumbing ─────────────────────────────────────────────

    /// Pass-through for the host's offer.
    pub async fn send_offer(&self, sdp: &str) -> Result<(), SignalingError> {
        self.signaling.send_offer(sdp).await
    }

    /// Pass-through for the client's answer. The answer existing is one of
    /// the two facts that make the handshake "connected".
    pub async fn send_answer(&mut self, sdp: &str) -> Result<(), SignalingError> {
        self.signaling.send_answer(sdp).await?;
        if let Some(phase) = self.handshake.apply(HandshakeEvent::AnswerReceived) {
            self.push_phase(phase);
        }
        Ok(())
    }

    pub async fn send_ice_candidate(&self, candidate: &str) -> Result<(), SignalingError> {
        self.signaling.send_ice_candidate(candidate).await
    }

    /// Hand over an established peer channel. On a client this announces us
    /// to the host with a connection-request.
    pub fn attach_peer(&mut self, peer_id: &str, channel: PeerChannel) {
        self.p2p.attach_peer(peer_id, channel);
        if let Some(phase) = self.handshake.apply(HandshakeEvent::PeerChannelReady) {
            self.push_phase(phase);
        }
        if self.role == Role::Client {
            let request = MessagePayload::ConnectionRequest {
                player_name: self.local_name.clone(),
                game_code: self.game_code.clone().unwrap_or_default(),
            };
            if let Err(err) = self.p2p.send_to(peer_id, request) {
                warn!("connection request to {} failed: {}", peer_id, err);
            }
        }
    }

    // ── Event loop ─────────────────────────────────────────────────────

    /// Drive the controller. The application shell awaits this in its loop;
    /// every internal state change happens inside, so no locking is needed
    /// anywhere in the lobby layer.
    pub async fn next_event(&mut self) -> Option<LobbyEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            self.maybe_rearm().await;
            if !self.pending.is_empty() {
                continue;
            }
            if !self.signaling_open && !self.p2p_open {
                return None;
            }

            // Receive first, handle after: the handlers need &mut self,
            // which the pending select branches must not be holding
            enum Incoming {
                Signaling(Option<SignalingEvent>),
                P2p(Option<P2pEvent>),
            }
            let incoming = tokio::select! {
                event = self.signaling_rx.recv(), if self.signaling_open => Incoming::Signaling(event),
                event = self.p2p_rx.recv(), if self.p2p_open => Incoming::P2p(event),
            };
            match incoming {
                Incoming::Signaling(Some(event)) => self.on_signaling_event(event),
                Incoming::Signaling(None) => self.signaling_open = false,
                Incoming::P2p(Some(event)) => self.on_p2p_event(event),
                Incoming::P2p(None) => self.p2p_open = false,
            }
        }
    }

    // ── Local actions ──────────────────────────────────────────────────

    pub fn send_chat(&mut self, text: &str) -> Result<(), ControlError> {
        self.p2p.broadcast(MessagePayload::Chat {
            text: text.to_string(),
        })?;
        // Local echo so the sender's history matches everyone else's
        self.record_chat(self.local_id.clone(), text.to_string(), now_ms());
        Ok(())
    }

    pub fn send_emote(&self, emote: &str) -> Result<(), ControlError> {
        self.p2p.broadcast(MessagePayload::Emote {
            emote: emote.to_string(),
        })?;
        Ok(())
    }

    /// Flip own readiness. Host-side this mutates the lobby directly; a
    /// client sends the action and echoes it optimistically until the next
    /// authoritative sync.
    pub fn set_ready(&mut self, ready: bool) -> Result<(), ControlError> {
        let status = if ready {
            PlayerStatus::Ready
        } else {
            PlayerStatus::NotReady
        };
        match self.role {
            Role::Host => {
                let local_id = self.local_id.clone();
                let manager = self.manager.as_mut().ok_or(LobbyError::NotOpen)?;
                manager.update_player_status(&local_id, status)?;
                self.broadcast_sync();
                Ok(())
            }
            Role::Client => {
                let local_id = self.local_id.clone();
                if let Some(lobby) = self.lobby_view.as_mut() {
                    if let Some(player) = lobby.players.iter_mut().find(|p| p.id == local_id) {
                        player.status = status;
                    }
                }
                self.p2p.broadcast(MessagePayload::PlayerAction {
                    action: PlayerAction::SetReady { ready },
                })?;
                Ok(())
            }
        }
    }

    /// Bind own deck. The full card list travels to the host, which runs
    /// the authoritative validation; a client validates locally for
    /// immediate UI feedback.
    pub fn bind_deck(&mut self, deck: &Deck) -> Result<DeckUpdateOutcome, ControlError> {
        match self.role {
            Role::Host => {
                let local_id = self.local_id.clone();
                let manager = self.manager.as_mut().ok_or(LobbyError::NotOpen)?;
                let outcome = manager.update_player_deck(&local_id, deck)?;
                self.broadcast_sync();
                Ok(outcome)
            }
            Role::Client => {
                let format = self
                    .lobby_view
                    .as_ref()
                    .map(|l| l.format)
                    .unwrap_or(self.settings.format);
                let validation = self.validator.validate(deck, format);

                let local_id = self.local_id.clone();
                if let Some(lobby) = self.lobby_view.as_mut() {
                    if let Some(player) = lobby.players.iter_mut().find(|p| p.id == local_id) {
                        player.deck = Some(DeckBinding {
                            deck_id: deck.id.clone(),
                            deck_name: deck.name.clone(),
                            card_count: deck.cards.len(),
                            is_valid: validation.is_valid,
                        });
                    }
                }
                self.p2p.broadcast(MessagePayload::PlayerAction {
                    action: PlayerAction::DeckSelected {
                        deck_id: deck.id.clone(),
                        deck_name: deck.name.clone(),
                        cards: deck.cards.clone(),
                    },
                })?;
                Ok(DeckUpdateOutcome {
                    is_valid: validation.is_valid,
                    errors: validation.errors,
                    warnings: validation.warnings,
                })
            }
        }
    }

    /// Host only. Flips the lobby to in-progress and broadcasts the
    /// snapshot every client transitions on.
    pub fn start_game(&mut self, force: bool) -> Result<(), ControlError> {
        if self.role != Role::Host {
            return Err(LobbyError::NotHost.into());
        }
        let manager = self.manager.as_mut().ok_or(LobbyError::NotOpen)?;
        let allowed = if force {
            manager.can_force_start()
        } else {
            manager.can_start_game()
        };
        if !allowed {
            return Err(LobbyError::NotReadyToStart.into());
        }

        manager.update_status(LobbyStatus::InProgress)?;
        let snapshot = manager.snapshot();
        self.p2p.broadcast(MessagePayload::GameStateSync {
            lobby: snapshot.clone(),
        })?;
        self.pending.push_back(LobbyEvent::GameStarted(snapshot));
        // Membership is frozen; no further joiners, so no further session
        self.needs_rearm = false;
        self.signaling.close_session();
        Ok(())
    }

    /// Tear everything down. Poll timer and peer channels are released
    /// synchronously with this call; nothing survives it.
    pub fn leave_game(&mut self) {
        if self.role == Role::Host {
            if let Some(manager) = self.manager.as_mut() {
                if manager.update_status(LobbyStatus::Closed).is_ok() {
                    let _ = self.p2p.broadcast(MessagePayload::GameStateSync {
                        lobby: manager.snapshot(),
                    });
                }
            }
        }
        self.needs_rearm = false;
        self.signaling.close_session();
        self.p2p.shutdown();
    }

    // ── Internal event handling ────────────────────────────────────────

    fn on_signaling_event(&mut self, event: SignalingEvent) {
        if let Some(phase) = self.handshake.handle_signaling_event(&event, self.role) {
            self.push_phase(phase);
        }
        if let SignalingEvent::Update(update) = event {
            // Polls repeat the same view; only surface news to the shell
            if self.last_update.as_ref() != Some(&update) {
                self.last_update = Some(update.clone());
                self.pending.push_back(LobbyEvent::SignalingUpdate(update));
            }
        }
    }

    fn on_p2p_event(&mut self, event: P2pEvent) {
        match event {
            P2pEvent::PeerConnected { peer_id } => {
                debug!("peer {} channel up", peer_id);
            }
            P2pEvent::PeerDisconnected { peer_id } => self.on_peer_gone(peer_id),
            P2pEvent::Message { peer_id, message } => self.on_message(peer_id, message),
            P2pEvent::RemoteError {
                peer_id,
                code,
                message,
            } => {
                self.pending.push_back(LobbyEvent::Error(format!(
                    "peer {}: {} ({})",
                    peer_id, message, code
                )));
            }
        }
    }

    fn on_message(&mut self, peer_id: String, message: ProtocolMessage) {
        let sender_id = message.sender_id.clone();
        match &message.payload {
            MessagePayload::ConnectionRequest {
                player_name,
                game_code,
            } => {
                self.on_connection_request(&peer_id, &sender_id, player_name, game_code);
            }
            MessagePayload::ConnectionAccept { lobby, .. } => {
                if self.role == Role::Client {
                    self.lobby_view = Some(lobby.clone());
                    self.pending.push_back(LobbyEvent::LobbyUpdated(lobby.clone()));
                }
            }
            MessagePayload::GameStateSync { lobby } => self.on_sync(lobby.clone()),
            MessagePayload::PlayerAction { action } => {
                self.on_player_action(&peer_id, &sender_id, action.clone());
            }
            MessagePayload::Chat { text } => {
                self.record_chat(sender_id.clone(), text.clone(), message.timestamp);
                self.pending.push_back(LobbyEvent::ChatReceived(ChatEntry {
                    sender_id,
                    text: text.clone(),
                    timestamp: message.timestamp,
                }));
                // Star topology: guests only see the host, so the host
                // forwards guest chatter with original attribution
                if self.role == Role::Host {
                    let _ = self.p2p.relay_except(&peer_id, &message);
                }
            }
            MessagePayload::Emote { emote } => {
                self.pending.push_back(LobbyEvent::EmoteReceived {
                    sender_id,
                    emote: emote.clone(),
                });
                if self.role == Role::Host {
                    let _ = self.p2p.relay_except(&peer_id, &message);
                }
            }
            // Converted to RemoteError by the service before it gets here
            MessagePayload::Error { .. } => {}
        }
    }

    fn on_connection_request(
        &mut self,
        peer_id: &str,
        sender_id: &str,
        player_name: &str,
        game_code: &str,
    ) {
        if self.role != Role::Host {
            warn!("ignoring connection request on non-host endpoint");
            return;
        }
        let Some(manager) = self.manager.as_mut() else {
            return;
        };
        if game_code != manager.game_code() {
            let _ = self.p2p.send_to(
                peer_id,
                MessagePayload::Error {
                    code: "unknown-game".into(),
                    message: format!("no lobby with code {}", game_code),
                },
            );
            return;
        }

        match manager.add_player(sender_id, player_name) {
            Ok(()) => {
                let snapshot = manager.snapshot();
                let _ = self.p2p.send_to(
                    peer_id,
                    MessagePayload::ConnectionAccept {
                        host_name: self.local_name.clone(),
                        lobby: snapshot.clone(),
                    },
                );
                let _ = self.p2p.broadcast(MessagePayload::GameStateSync {
                    lobby: snapshot.clone(),
                });
                self.pending.push_back(LobbyEvent::LobbyUpdated(snapshot));
            }
            Err(LobbyError::DuplicatePlayer(_)) => {
                // Duplicate connect: admission already happened, re-send
                // the accept and change nothing
                let snapshot = manager.snapshot();
                let _ = self.p2p.send_to(
                    peer_id,
                    MessagePayload::ConnectionAccept {
                        host_name: self.local_name.clone(),
                        lobby: snapshot,
                    },
                );
            }
            Err(err) => {
                let code = match err {
                    LobbyError::LobbyFull => "lobby-full",
                    LobbyError::NotOpen => "lobby-closed",
                    _ => "join-rejected",
                };
                warn!("rejecting {}: {}", sender_id, err);
                let _ = self.p2p.send_to(
                    peer_id,
                    MessagePayload::Error {
                        code: code.into(),
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    fn on_player_action(&mut self, peer_id: &str, sender_id: &str, action: PlayerAction) {
        self.pending.push_back(LobbyEvent::ActionReceived {
            sender_id: sender_id.to_string(),
            action: action.clone(),
        });
        if self.role != Role::Host {
            return;
        }
        let Some(manager) = self.manager.as_mut() else {
            return;
        };

        let result = match &action {
            PlayerAction::SetReady { ready } => {
                let status = if *ready {
                    PlayerStatus::Ready
                } else {
                    PlayerStatus::NotReady
                };
                manager.update_player_status(sender_id, status)
            }
            PlayerAction::DeckSelected {
                deck_id,
                deck_name,
                cards,
            } => {
                let deck = Deck {
                    id: deck_id.clone(),
                    name: deck_name.clone(),
                    cards: cards.clone(),
                };
                manager.update_player_deck(sender_id, &deck).map(|_| ())
            }
            PlayerAction::Concede => match manager.lobby().status {
                LobbyStatus::Open => manager.remove_player(sender_id).map(|_| ()),
                _ => manager.update_player_status(sender_id, PlayerStatus::Disconnected),
            },
        };

        match result {
            Ok(()) => self.broadcast_sync(),
            Err(err) => {
                warn!("action from {} rejected: {}", sender_id, err);
                let _ = self.p2p.send_to(
                    peer_id,
                    MessagePayload::Error {
                        code: "action-rejected".into(),
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    fn on_sync(&mut self, lobby: GameLobby) {
        if self.role == Role::Host {
            // The host is the writer; its own snapshots never loop back
            return;
        }
        let was_in_progress = self
            .lobby_view
            .as_ref()
            .map(|l| l.status == LobbyStatus::InProgress)
            .unwrap_or(false);
        let started = lobby.status == LobbyStatus::InProgress && !was_in_progress;

        // Authoritative: supersedes any optimistic local echo
        self.lobby_view = Some(lobby.clone());
        if started {
            self.pending.push_back(LobbyEvent::GameStarted(lobby));
        } else {
            self.pending.push_back(LobbyEvent::LobbyUpdated(lobby));
        }
    }

    fn on_peer_gone(&mut self, peer_id: String) {
        self.pending.push_back(LobbyEvent::PeerLeft {
            peer_id: peer_id.clone(),
        });
        match self.role {
            Role::Host => {
                let Some(manager) = self.manager.as_mut() else {
                    return;
                };
                let result = match manager.lobby().status {
                    LobbyStatus::Open => manager.remove_player(&peer_id).map(|_| ()),
                    _ => manager.update_player_status(&peer_id, PlayerStatus::Disconnected),
                };
                if result.is_ok() {
                    self.broadcast_sync();
                }
            }
            Role::Client => {
                // The host carried the lobby; without it there is no lobby
                if let Some(lobby) = self.lobby_view.as_mut() {
                    lobby.status = LobbyStatus::Closed;
                    let closed = lobby.clone();
                    self.pending.push_back(LobbyEvent::LobbyUpdated(closed));
                }
                self.pending
                    .push_back(LobbyEvent::Error("host disconnected".into()));
            }
        }
    }

    /// Host: once a peer's handshake completes, its session is consumed.
    /// Open a fresh session under the same code so the next peer can join.
    /// The consumed record stays on the relay until it expires; the code is
    /// reclaimable because its client already joined.
    async fn maybe_rearm(&mut self) {
        if !self.needs_rearm || self.role != Role::Host {
            self.needs_rearm = false;
            return;
        }
        let joinable = self
            .manager
            .as_ref()
            .map(|m| m.lobby().status == LobbyStatus::Open && !m.lobby().is_full())
            .unwrap_or(false);
        let Some(code) = self.game_code.clone() else {
            self.needs_rearm = false;
            return;
        };
        if !joinable {
            self.needs_rearm = false;
            return;
        }

        match self
            .signaling
            .create_session_with_code(&self.local_id, &self.local_name, Some(code))
            .await
        {
            Ok(_) => {
                self.needs_rearm = false;
                self.last_update = None;
                let (handshake, phase_rx) = SignalingController::new();
                self.handshake = handshake;
                self._phase_rx = phase_rx;
                self.handshake.apply(HandshakeEvent::CreateRequested);
                if let Some(phase) = self.handshake.apply(HandshakeEvent::SessionCreated) {
                    self.push_phase(phase);
                }
            }
            Err(SignalingError::Transport(err)) => {
                // Transient; the flag stays set and the next pass retries
                warn!("session re-arm deferred: {}", err);
            }
            Err(err) => {
                self.needs_rearm = false;
                warn!("could not reopen session for new peers: {}", err);
                self.pending.push_back(LobbyEvent::Error(format!(
                    "could not reopen lobby for new peers: {}",
                    err
                )));
            }
        }
    }

    fn push_phase(&mut self, phase: HandshakePhase) {
        if phase == HandshakePhase::Connected && self.role == Role::Host {
            self.needs_rearm = true;
        }
        let failed = match &phase {
            HandshakePhase::Failed(message) => Some(message.clone()),
            _ => None,
        };
        self.pending.push_back(LobbyEvent::PhaseChanged(phase));
        if let Some(message) = failed {
            self.pending.push_back(LobbyEvent::Error(message));
        }
    }

    /// Host helper: broadcast the current snapshot and notify the shell.
    fn broadcast_sync(&mut self) {
        let Some(manager) = self.manager.as_ref() else {
            return;
        };
        let snapshot = manager.snapshot();
        if let Err(err) = self.p2p.broadcast(MessagePayload::GameStateSync {
            lobby: snapshot.clone(),
        }) {
            warn!("state sync broadcast failed: {}", err);
        }
        self.pending.push_back(LobbyEvent::LobbyUpdated(snapshot));
    }

    fn record_chat(&mut self, sender_id: String, text: String, timestamp: u64) {
        self.chat_log.push_back(ChatEntry {
            sender_id,
            text,
            timestamp,
        });
        while self.chat_log.len() > self.chat_limit {
            self.chat_log.pop_front();
        }
    }
}

fn settings_from(config: &Config) -> LobbySettings {
    LobbySettings {
        format: GameFormat::parse_or_default(&config.lobby.default_format),
        max_players: config.lobby.max_players,
        min_players: config.lobby.min_players,
    }
}
