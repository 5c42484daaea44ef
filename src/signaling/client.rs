// Polling signaling client: drives the asymmetric host/client handshake
// against the relay. Owns the poll timer; events flow to the caller over an
// mpsc channel returned at construction.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::SignalingError;
use crate::signaling::relay::SessionRelay;
use crate::signaling::session::{
    CreateSessionRequest, JoinSessionRequest, Role, SessionUpdate,
};

/// What the caller holds after create/join.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub game_code: String,
    pub expires_at: u64,
}

/// Events emitted by the polling loop.
#[derive(Debug)]
pub enum SignalingEvent {
    /// The accumulated counterpart view after a successful poll.
    Update(SessionUpdate),
    /// A failed poll. `SessionExpired` is terminal and stops the loop;
    /// anything else is transient and polling continues.
    Error(SignalingError),
}

pub struct SignalingClient {
    relay: Arc<dyn SessionRelay>,
    poll_interval: Duration,
    event_tx: mpsc::UnboundedSender<SignalingEvent>,
    role: Option<Role>,
    session: Option<SessionInfo>,
    poll_task: Option<JoinHandle<()>>,
}

impl SignalingClient {
    /// Create a client and the receiving end of its event stream.
    pub fn new(
        relay: Arc<dyn SessionRelay>,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SignalingEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let client = Self {
            relay,
            poll_interval,
            event_tx,
            role: None,
            session: None,
            poll_task: None,
        };
        (client, event_rx)
    }

    /// Register a new session as host and begin polling for the client's
    /// contributions. Rejections are surfaced to the caller, never retried.
    pub async fn create_session(
        &mut self,
        host_id: &str,
        host_name: &str,
    ) -> Result<SessionInfo, SignalingError> {
        self.create_session_with_code(host_id, host_name, None).await
    }

    /// Like `create_session` but pins the game code. Used when fanning out
    /// one session per peer pair behind a single shareable code.
    pub async fn create_session_with_code(
        &mut self,
        host_id: &str,
        host_name: &str,
        game_code: Option<String>,
    ) -> Result<SessionInfo, SignalingError> {
        // A fresh attempt must never inherit the previous attempt's timer
        self.destroy();

        let created = self
            .relay
            .create(CreateSessionRequest {
                host_id: host_id.to_string(),
                host_name: host_name.to_string(),
                offer: None,
                game_code,
            })
            .await?;

        let info = SessionInfo {
            session_id: created.session_id,
            game_code: created.game_code,
            expires_at: created.expires_at,
        };
        self.role = Some(Role::Host);
        self.session = Some(info.clone());
        self.spawn_poll_task(Role::Host, info.session_id.clone(), SessionUpdate::default());
        Ok(info)
    }

    /// Resolve a game code, register as its client, and begin polling for
    /// the host's contributions. The join response itself is delivered as
    /// the first update.
    pub async fn join_session(
        &mut self,
        game_code: &str,
        client_id: &str,
        client_name: &str,
    ) -> Result<SessionInfo, SignalingError> {
        self.destroy();

        let joined = self
            .relay
            .join(JoinSessionRequest {
                game_code: game_code.to_string(),
                client_id: client_id.to_string(),
                client_name: client_name.to_string(),
            })
            .await?;

        let info = SessionInfo {
            session_id: joined.session_id.clone(),
            game_code: game_code.to_string(),
            expires_at: joined.expires_at,
        };
        let initial = SessionUpdate::from_join(&joined);
        let _ = self.event_tx.send(SignalingEvent::Update(initial.clone()));

        self.role = Some(Role::Client);
        self.session = Some(info.clone());
        self.spawn_poll_task(Role::Client, info.session_id.clone(), initial);
        Ok(info)
    }

    /// Host-side: publish the offer.
    pub async fn send_offer(&self, sdp: &str) -> Result<(), SignalingError> {
        let (role, session_id) = self.require_session()?;
        if role != Role::Host {
            return Err(SignalingError::RoleMismatch);
        }
        self.relay.send_offer(&session_id, sdp).await
    }

    /// Client-side: publish the answer.
    pub async fn send_answer(&self, sdp: &str) -> Result<(), SignalingError> {
        let (role, session_id) = self.require_session()?;
        if role != Role::Client {
            return Err(SignalingError::RoleMismatch);
        }
        self.relay.send_answer(&session_id, sdp).await
    }

    /// Append a candidate to this side's own list. Safe to repeat: the
    /// consumer tolerates duplicates.
    pub async fn send_ice_candidate(&self, candidate: &str) -> Result<(), SignalingError> {
        let (role, session_id) = self.require_session()?;
        self.relay.add_candidate(&session_id, role, candidate).await
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Best-effort relay deletion. Local state is cleared and the poll
    /// timer cancelled before any network result comes back, so this can
    /// never hang the caller.
    pub fn close_session(&mut self) {
        let session = self.session.take();
        self.role = None;
        self.abort_poll_task();

        if let Some(info) = session {
            let relay = Arc::clone(&self.relay);
            tokio::spawn(async move {
                if let Err(err) = relay.remove(&info.session_id).await {
                    debug!("session {} teardown ignored: {}", info.session_id, err);
                }
            });
        }
    }

    /// Cancel the poll timer and forget the session without touching the
    /// relay. Idempotent.
    pub fn destroy(&mut self) {
        self.session = None;
        self.role = None;
        self.abort_poll_task();
    }

    fn abort_poll_task(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }

    fn require_session(&self) -> Result<(Role, String), SignalingError> {
        match (self.role, &self.session) {
            (Some(role), Some(info)) => Ok((role, info.session_id.clone())),
            _ => Err(SignalingError::NoActiveSession),
        }
    }

    fn spawn_poll_task(&mut self, role: Role, session_id: String, seed: SessionUpdate) {
        let relay = Arc::clone(&self.relay);
        let event_tx = self.event_tx.clone();
        let poll_interval = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut state = seed;
            let mut ticker = tokio::time::interval(poll_interval);
            // A slow relay response must not cause a burst of catch-up polls
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match relay.fetch(&session_id, role).await {
                    Ok(view) => {
                        state.merge_view(&view, role);
                        if event_tx
                            .send(SignalingEvent::Update(state.clone()))
                            .is_err()
                        {
                            break; // receiver gone, nobody is listening
                        }
                    }
                    Err(err) if err.is_terminal() => {
                        // An expired session can never become valid again:
                        // stop polling after surfacing the error exactly once
                        warn!("session {} gone, polling stopped", session_id);
                        let _ = event_tx.send(SignalingEvent::Error(
                            SignalingError::SessionExpired,
                        ));
                        break;
                    }
                    Err(err) => {
                        // Transient: surface once per occurrence, keep polling
                        let _ = event_tx.send(SignalingEvent::Error(err));
                    }
                }
            }
        });
        self.poll_task = Some(task);
    }
}

impl Drop for SignalingClient {
    fn drop(&mut self) {
        self.abort_poll_task();
    }
}
