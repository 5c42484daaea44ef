// Session relay contract and its HTTP implementation
// The polling client is generic over SessionRelay so tests can drive it
// against the in-memory store without a network

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SignalingError;
use crate::signaling::session::{
    CandidateRequest, CreateSessionRequest, JoinSessionRequest, RelayErrorBody, Role,
    SessionCreated, SessionJoined, SessionView, SignalRequest,
};

/// The relay operations the signaling client depends on, one per endpoint
/// of the session store contract.
#[async_trait]
pub trait SessionRelay: Send + Sync {
    async fn create(&self, req: CreateSessionRequest) -> Result<SessionCreated, SignalingError>;

    async fn join(&self, req: JoinSessionRequest) -> Result<SessionJoined, SignalingError>;

    async fn send_offer(&self, session_id: &str, sdp: &str) -> Result<(), SignalingError>;

    async fn send_answer(&self, session_id: &str, sdp: &str) -> Result<(), SignalingError>;

    async fn add_candidate(
        &self,
        session_id: &str,
        role: Role,
        candidate: &str,
    ) -> Result<(), SignalingError>;

    /// Role-filtered read of the session record.
    async fn fetch(&self, session_id: &str, role: Role) -> Result<SessionView, SignalingError>;

    /// Best-effort teardown.
    async fn remove(&self, session_id: &str) -> Result<(), SignalingError>;
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::Host => "host",
        Role::Client => "client",
    }
}

/// HTTP client side of the relay contract.
pub struct HttpRelay {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRelay {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-2xx response back into a typed error via the body's code.
    async fn decode_error(resp: reqwest::Response) -> SignalingError {
        let status = resp.status();
        match resp.json::<RelayErrorBody>().await {
            Ok(body) => SignalingError::from_wire(&body.code, &body.error),
            // No parseable body: fall back to the status line alone
            Err(_) => match status.as_u16() {
                404 => SignalingError::SessionNotFound,
                409 => SignalingError::SessionFull,
                _ => SignalingError::Relay {
                    message: status.to_string(),
                },
            },
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, SignalingError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))?;
        if resp.status().is_success() {
            resp.json::<T>()
                .await
                .map_err(|e| SignalingError::Transport(e.to_string()))
        } else {
            Err(Self::decode_error(resp).await)
        }
    }

    async fn post_unit<B>(&self, path: &str, body: &B) -> Result<(), SignalingError>
    where
        B: Serialize + Sync,
    {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::decode_error(resp).await)
        }
    }
}

#[async_trait]
impl SessionRelay for HttpRelay {
    async fn create(&self, req: CreateSessionRequest) -> Result<SessionCreated, SignalingError> {
        self.post_json("/sessions", &req).await
    }

    async fn join(&self, req: JoinSessionRequest) -> Result<SessionJoined, SignalingError> {
        self.post_json("/sessions/join", &req).await
    }

    async fn send_offer(&self, session_id: &str, sdp: &str) -> Result<(), SignalingError> {
        let req = SignalRequest {
            session_id: session_id.to_string(),
            payload: sdp.to_string(),
        };
        self.post_unit("/sessions/offer", &req).await
    }

    async fn send_answer(&self, session_id: &str, sdp: &str) -> Result<(), SignalingError> {
        let req = SignalRequest {
            session_id: session_id.to_string(),
            payload: sdp.to_string(),
        };
        self.post_unit("/sessions/answer", &req).await
    }

    async fn add_candidate(
        &self,
        session_id: &str,
        role: Role,
        candidate: &str,
    ) -> Result<(), SignalingError> {
        let req = CandidateRequest {
            session_id: session_id.to_string(),
            role,
            candidate: candidate.to_string(),
        };
        self.post_unit("/sessions/candidates", &req).await
    }

    async fn fetch(&self, session_id: &str, role: Role) -> Result<SessionView, SignalingError> {
        let resp = self
            .http
            .get(self.url("/sessions"))
            .query(&[("sessionId", session_id), ("role", role_str(role))])
            .send()
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))?;
        if resp.status().is_success() {
            resp.json::<SessionView>()
                .await
                .map_err(|e| SignalingError::Transport(e.to_string()))
        } else {
            Err(Self::decode_error(resp).await)
        }
    }

    async fn remove(&self, session_id: &str) -> Result<(), SignalingError> {
        let resp = self
            .http
            .delete(self.url("/sessions"))
            .query(&[("sessionId", session_id)])
            .send()
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::decode_error(resp).await)
        }
    }
}
