// In-memory session store: the reference implementation of the relay contract
// Backs the signaling-server binary and substitutes for it in tests.
// Expiry is lazy: an expired record is evicted the next time it is touched,
// with a periodic sweep for records nobody reads again.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::SignalingError;
use crate::ids::{generate_game_code, generate_session_id, now_ms};
use crate::signaling::relay::SessionRelay;
use crate::signaling::session::{
    CreateSessionRequest, JoinSessionRequest, Role, SessionCreated, SessionJoined, SessionView,
    SignalingSession,
};

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<String, SignalingSession>,
    /// game code -> session id of the newest joinable session for that code
    codes: HashMap<String, String>,
}

impl StoreInner {
    /// Look up a live session, evicting it if expired.
    fn live_session_mut(
        &mut self,
        session_id: &str,
        now: u64,
    ) -> Result<&mut SignalingSession, SignalingError> {
        let expired = match self.sessions.get(session_id) {
            Some(session) => session.is_expired(now),
            None => return Err(SignalingError::SessionNotFound),
        };
        if expired {
            self.evict(session_id);
            return Err(SignalingError::SessionNotFound);
        }
        // Checked above; the map cannot have lost the key in between
        self.sessions
            .get_mut(session_id)
            .ok_or(SignalingError::SessionNotFound)
    }

    fn evict(&mut self, session_id: &str) {
        if let Some(session) = self.sessions.remove(session_id) {
            // Only release the code if it still points at this session
            if self.codes.get(&session.game_code) == Some(&session.session_id) {
                self.codes.remove(&session.game_code);
            }
        }
    }
}

/// Relay-side session storage.
pub struct SignalingStore {
    inner: RwLock<StoreInner>,
    ttl_ms: u64,
}

impl SignalingStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    pub async fn create(
        &self,
        req: CreateSessionRequest,
    ) -> Result<SessionCreated, SignalingError> {
        let now = now_ms();
        let mut inner = self.inner.write().await;

        let game_code = match req.game_code {
            Some(code) => {
                // A code may be reused once its current session stops being
                // joinable (client already joined, or expired). A still-open
                // session keeps exclusive hold of it.
                if let Some(existing_id) = inner.codes.get(&code) {
                    let joinable = inner
                        .sessions
                        .get(existing_id)
                        .map(|s| !s.is_expired(now) && !s.has_client())
                        .unwrap_or(false);
                    if joinable {
                        return Err(SignalingError::CodeTaken);
                    }
                }
                code
            }
            None => loop {
                let code = generate_game_code();
                if !inner.codes.contains_key(&code) {
                    break code;
                }
            },
        };

        let session = SignalingSession {
            session_id: generate_session_id(),
            game_code: game_code.clone(),
            host_id: req.host_id,
            host_name: req.host_name,
            client_id: None,
            client_name: None,
            offer: req.offer,
            answer: None,
            host_candidates: Vec::new(),
            client_candidates: Vec::new(),
            created_at: now,
            expires_at: now + self.ttl_ms,
        };
        let created = SessionCreated {
            session_id: session.session_id.clone(),
            game_code: game_code.clone(),
            expires_at: session.expires_at,
        };

        info!(
            "session {} created by {} (code {})",
            session.session_id, session.host_id, game_code
        );
        inner.codes.insert(game_code, session.session_id.clone());
        inner.sessions.insert(session.session_id.clone(), session);
        Ok(created)
    }

    pub async fn join(&self, req: JoinSessionRequest) -> Result<SessionJoined, SignalingError> {
        let now = now_ms();
        let mut inner = self.inner.write().await;

        let session_id = inner
            .codes
            .get(&req.game_code)
            .cloned()
            .ok_or(SignalingError::SessionNotFound)?;
        let session = inner.live_session_mut(&session_id, now)?;
        if session.has_client() {
            return Err(SignalingError::SessionFull);
        }

        session.client_id = Some(req.client_id.clone());
        session.client_name = Some(req.client_name);
        info!(
            "client {} joined session {} (code {})",
            req.client_id, session.session_id, session.game_code
        );

        Ok(SessionJoined {
            session_id: session.session_id.clone(),
            host_id: session.host_id.clone(),
            host_name: session.host_name.clone(),
            offer: session.offer.clone(),
            host_candidates: session.host_candidates.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
        })
    }

    pub async fn set_offer(&self, session_id: &str, sdp: &str) -> Result<(), SignalingError> {
        let mut inner = self.inner.write().await;
        let session = inner.live_session_mut(session_id, now_ms())?;
        if session.offer.is_some() {
            return Err(SignalingError::AlreadySet { field: "offer" });
        }
        session.offer = Some(sdp.to_string());
        debug!("offer stored for session {}", session_id);
        Ok(())
    }

    pub async fn set_answer(&self, session_id: &str, sdp: &str) -> Result<(), SignalingError> {
        let mut inner = self.inner.write().await;
        let session = inner.live_session_mut(session_id, now_ms())?;
        if session.answer.is_some() {
            return Err(SignalingError::AlreadySet { field: "answer" });
        }
        session.answer = Some(sdp.to_string());
        debug!("answer stored for session {}", session_id);
        Ok(())
    }

    /// Append a candidate to the writer's own list. No write-side dedupe:
    /// delivery is at-least-once and the consumer filters duplicates.
    pub async fn add_candidate(
        &self,
        session_id: &str,
        role: Role,
        candidate: &str,
    ) -> Result<(), SignalingError> {
        let mut inner = self.inner.write().await;
        let session = inner.live_session_mut(session_id, now_ms())?;
        match role {
            Role::Host => session.host_candidates.push(candidate.to_string()),
            Role::Client => session.client_candidates.push(candidate.to_string()),
        }
        Ok(())
    }

    pub async fn fetch(
        &self,
        session_id: &str,
        role: Role,
    ) -> Result<SessionView, SignalingError> {
        let mut inner = self.inner.write().await;
        let session = inner.live_session_mut(session_id, now_ms())?;
        Ok(session.view_for(role))
    }

    pub async fn remove(&self, session_id: &str) {
        let mut inner = self.inner.write().await;
        inner.evict(session_id);
        debug!("session {} removed", session_id);
    }

    /// Drop every expired record. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = now_ms();
        let mut inner = self.inner.write().await;
        let expired: Vec<String> = inner
            .sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.session_id.clone())
            .collect();
        for session_id in &expired {
            inner.evict(session_id);
        }
        if !expired.is_empty() {
            info!("purged {} expired sessions", expired.len());
        }
        expired.len()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

#[async_trait]
impl SessionRelay for SignalingStore {
    async fn create(&self, req: CreateSessionRequest) -> Result<SessionCreated, SignalingError> {
        SignalingStore::create(self, req).await
    }

    async fn join(&self, req: JoinSessionRequest) -> Result<SessionJoined, SignalingError> {
        SignalingStore::join(self, req).await
    }

    async fn send_offer(&self, session_id: &str, sdp: &str) -> Result<(), SignalingError> {
        self.set_offer(session_id, sdp).await
    }

    async fn send_answer(&self, session_id: &str, sdp: &str) -> Result<(), SignalingError> {
        self.set_answer(session_id, sdp).await
    }

    async fn add_candidate(
        &self,
        session_id: &str,
        role: Role,
        candidate: &str,
    ) -> Result<(), SignalingError> {
        SignalingStore::add_candidate(self, session_id, role, candidate).await
    }

    async fn fetch(&self, session_id: &str, role: Role) -> Result<SessionView, SignalingError> {
        SignalingStore::fetch(self, session_id, role).await
    }

    async fn remove(&self, session_id: &str) -> Result<(), SignalingError> {
        SignalingStore::remove(self, session_id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_req() -> CreateSessionRequest {
        CreateSessionRequest {
            host_id: "p-host".into(),
            host_name: "Noor".into(),
            offer: Some("offer-sdp".into()),
            game_code: None,
        }
    }

    fn join_req(code: &str) -> JoinSessionRequest {
        JoinSessionRequest {
            game_code: code.into(),
            client_id: "p-client".into(),
            client_name: "Ari".into(),
        }
    }

    fn store() -> SignalingStore {
        SignalingStore::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_created_session_is_immediately_joinable() {
        let store = store();
        let created = store.create(create_req()).await.unwrap();

        let joined = store.join(join_req(&created.game_code)).await.unwrap();
        assert_eq!(joined.session_id, created.session_id);
        assert_eq!(joined.host_name, "Noor");
        assert_eq!(joined.offer.as_deref(), Some("offer-sdp"));
    }

    #[tokio::test]
    async fn test_join_unknown_code_is_not_found() {
        let store = store();
        let err = store.join(join_req("ZZZZZZ")).await.unwrap_err();
        assert!(matches!(err, SignalingError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_second_join_is_rejected() {
        let store = store();
        let created = store.create(create_req()).await.unwrap();
        store.join(join_req(&created.game_code)).await.unwrap();

        let err = store.join(join_req(&created.game_code)).await.unwrap_err();
        assert!(matches!(err, SignalingError::SessionFull));
    }

    #[tokio::test]
    async fn test_offer_and_answer_set_at_most_once() {
        let store = store();
        let mut req = create_req();
        req.offer = None;
        let created = store.create(req).await.unwrap();

        store.set_offer(&created.session_id, "offer-1").await.unwrap();
        let err = store
            .set_offer(&created.session_id, "offer-2")
            .await
            .unwrap_err();
        assert!(matches!(err, SignalingError::AlreadySet { field: "offer" }));

        store.set_answer(&created.session_id, "answer-1").await.unwrap();
        let err = store
            .set_answer(&created.session_id, "answer-2")
            .await
            .unwrap_err();
        assert!(matches!(err, SignalingError::AlreadySet { field: "answer" }));
    }

    #[tokio::test]
    async fn test_candidates_are_partitioned_by_role() {
        let store = store();
        let created = store.create(create_req()).await.unwrap();
        let sid = &created.session_id;

        store.add_candidate(sid, Role::Host, "hc1").await.unwrap();
        store.add_candidate(sid, Role::Client, "cc1").await.unwrap();

        // Host sees the client's list, client sees the host's
        let host_view = store.fetch(sid, Role::Host).await.unwrap();
        assert_eq!(host_view.peer_candidates, vec!["cc1"]);
        let client_view = store.fetch(sid, Role::Client).await.unwrap();
        assert_eq!(client_view.peer_candidates, vec!["hc1"]);
    }

    #[tokio::test]
    async fn test_duplicate_candidates_are_kept_verbatim() {
        // At-least-once delivery: the consumer dedupes, the store does not
        let store = store();
        let created = store.create(create_req()).await.unwrap();
        let sid = &created.session_id;

        store.add_candidate(sid, Role::Host, "hc1").await.unwrap();
        store.add_candidate(sid, Role::Host, "hc1").await.unwrap();

        let view = store.fetch(sid, Role::Client).await.unwrap();
        assert_eq!(view.peer_candidates, vec!["hc1", "hc1"]);
    }

    #[tokio::test]
    async fn test_expired_session_vanishes_on_next_touch() {
        let store = SignalingStore::new(Duration::ZERO);
        let created = store.create(create_req()).await.unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let err = store
            .fetch(&created.session_id, Role::Host)
            .await
            .unwrap_err();
        assert!(matches!(err, SignalingError::SessionNotFound));

        let err = store.join(join_req(&created.game_code)).await.unwrap_err();
        assert!(matches!(err, SignalingError::SessionNotFound));
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_purge_sweeps_expired_records() {
        let store = SignalingStore::new(Duration::ZERO);
        store.create(create_req()).await.unwrap();
        store.create(create_req()).await.unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.purge_expired().await, 2);
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_requested_code_conflicts_only_while_joinable() {
        let store = store();
        let mut req = create_req();
        req.game_code = Some("KWRTXQ".into());
        let first = store.create(req.clone()).await.unwrap();
        assert_eq!(first.game_code, "KWRTXQ");

        // Still joinable: the code is held exclusively
        let err = store.create(req.clone()).await.unwrap_err();
        assert!(matches!(err, SignalingError::CodeTaken));

        // Once a client joined, the host may re-arm the same code for the
        // next peer pair
        store.join(join_req("KWRTXQ")).await.unwrap();
        let second = store.create(req).await.unwrap();
        assert_eq!(second.game_code, "KWRTXQ");
        assert_ne!(second.session_id, first.session_id);

        // The first session stays addressable by id for its pair
        let view = store.fetch(&first.session_id, Role::Host).await.unwrap();
        assert_eq!(view.client_id.as_deref(), Some("p-client"));
    }

    #[tokio::test]
    async fn test_remove_frees_the_code() {
        let store = store();
        let created = store.create(create_req()).await.unwrap();
        SignalingStore::remove(&store, &created.session_id).await;

        let err = store.join(join_req(&created.game_code)).await.unwrap_err();
        assert!(matches!(err, SignalingError::SessionNotFound));
    }
}
