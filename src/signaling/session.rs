// Signaling session record and the wire shapes of the relay contract
// The relay holds one session per in-progress handshake: exactly one host,
// at most one client, fields partitioned by writer

use serde::{Deserialize, Serialize};

/// Which side of the handshake the caller is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Client,
}

/// The relay-owned session record.
/// Host writes offer/host_candidates, client writes answer/client_candidates;
/// identity fields are set once and immutable afterwards.
#[derive(Debug, Clone)]
pub struct SignalingSession {
    pub session_id: String,
    pub game_code: String,
    pub host_id: String,
    pub host_name: String,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub offer: Option<String>,
    pub answer: Option<String>,
    pub host_candidates: Vec<String>,
    pub client_candidates: Vec<String>,
    pub created_at: u64,
    pub expires_at: u64,
}

impl SignalingSession {
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }

    /// True once a client has joined; the session is no longer joinable.
    pub fn has_client(&self) -> bool {
        self.client_id.is_some()
    }

    /// Project the record down to the fields relevant to `role`.
    /// A host polls for client-contributed fields and vice versa; a side
    /// never needs its own writes echoed back.
    pub fn view_for(&self, role: Role) -> SessionView {
        match role {
            Role::Host => SessionView {
                session_id: self.session_id.clone(),
                game_code: self.game_code.clone(),
                host_id: self.host_id.clone(),
                host_name: self.host_name.clone(),
                client_id: self.client_id.clone(),
                client_name: self.client_name.clone(),
                offer: None,
                answer: self.answer.clone(),
                peer_candidates: self.client_candidates.clone(),
                expires_at: self.expires_at,
            },
            Role::Client => SessionView {
                session_id: self.session_id.clone(),
                game_code: self.game_code.clone(),
                host_id: self.host_id.clone(),
                host_name: self.host_name.clone(),
                client_id: None,
                client_name: None,
                offer: self.offer.clone(),
                answer: None,
                peer_candidates: self.host_candidates.clone(),
                expires_at: self.expires_at,
            },
        }
    }
}

// ── Wire DTOs ──────────────────────────────────────────────────────────

/// `POST /sessions`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub host_id: String,
    pub host_name: String,
    /// Offer may be supplied at create time or sent shortly after.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer: Option<String>,
    /// Requested code. Used by a host fanning out one session per peer while
    /// keeping a single shareable code; omitted for a fresh allocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
    pub game_code: String,
    pub expires_at: u64,
}

/// `POST /sessions/join`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionRequest {
    pub game_code: String,
    pub client_id: String,
    pub client_name: String,
}

/// Join response: everything the host contributed so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionJoined {
    pub session_id: String,
    pub host_id: String,
    pub host_name: String,
    pub offer: Option<String>,
    pub host_candidates: Vec<String>,
    pub created_at: u64,
    pub expires_at: u64,
}

/// `POST /sessions/offer` and `POST /sessions/answer`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRequest {
    pub session_id: String,
    pub payload: String,
}

/// `POST /sessions/candidates`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRequest {
    pub session_id: String,
    pub role: Role,
    pub candidate: String,
}

/// Role-filtered poll response (`GET /sessions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub game_code: String,
    pub host_id: String,
    pub host_name: String,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub offer: Option<String>,
    pub answer: Option<String>,
    /// The counterpart's candidate list, verbatim (may contain duplicates).
    pub peer_candidates: Vec<String>,
    pub expires_at: u64,
}

/// Error body returned by the relay alongside a non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayErrorBody {
    pub error: String,
    pub code: String,
}

// ── Client-side merged state ───────────────────────────────────────────

/// Accumulated view of the counterpart's contributions, built up from
/// successive polls. Merging is idempotent: the latest response is taken as
/// authoritative and duplicate candidates are filtered on arrival, so
/// overlapping in-flight polls and at-least-once candidate delivery are
/// both harmless.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub peer_id: Option<String>,
    pub peer_name: Option<String>,
    pub offer: Option<String>,
    pub answer: Option<String>,
    pub peer_candidates: Vec<String>,
}

impl SessionUpdate {
    /// Fold a poll response into the accumulated state.
    /// Returns true if anything new was learned.
    pub fn merge_view(&mut self, view: &SessionView, role: Role) -> bool {
        let mut changed = false;

        let (peer_id, peer_name) = match role {
            // The host learns about the joining client
            Role::Host => (view.client_id.as_ref(), view.client_name.as_ref()),
            // The client already knows the host from join, but merge anyway
            Role::Client => (Some(&view.host_id), Some(&view.host_name)),
        };

        if self.peer_id.is_none() {
            if let Some(id) = peer_id {
                self.peer_id = Some(id.clone());
                self.peer_name = peer_name.cloned();
                changed = true;
            }
        }
        if self.offer.is_none() && view.offer.is_some() {
            self.offer = view.offer.clone();
            changed = true;
        }
        if self.answer.is_none() && view.answer.is_some() {
            self.answer = view.answer.clone();
            changed = true;
        }
        for candidate in &view.peer_candidates {
            if !self.peer_candidates.contains(candidate) {
                self.peer_candidates.push(candidate.clone());
                changed = true;
            }
        }

        changed
    }

    /// Seed the accumulated state from a join response.
    pub fn from_join(joined: &SessionJoined) -> Self {
        let mut update = SessionUpdate {
            peer_id: Some(joined.host_id.clone()),
            peer_name: Some(joined.host_name.clone()),
            offer: joined.offer.clone(),
            answer: None,
            peer_candidates: Vec::new(),
        };
        for candidate in &joined.host_candidates {
            if !update.peer_candidates.contains(candidate) {
                update.peer_candidates.push(candidate.clone());
            }
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SignalingSession {
        SignalingSession {
            session_id: "s-abc".into(),
            game_code: "KWRTXQ".into(),
            host_id: "p-host".into(),
            host_name: "Noor".into(),
            client_id: Some("p-client".into()),
            client_name: Some("Ari".into()),
            offer: Some("offer-sdp".into()),
            answer: Some("answer-sdp".into()),
            host_candidates: vec!["hc1".into(), "hc2".into()],
            client_candidates: vec!["cc1".into()],
            created_at: 1_000,
            expires_at: 2_000,
        }
    }

    #[test]
    fn test_view_is_partitioned_by_role() {
        let s = session();

        let host_view = s.view_for(Role::Host);
        assert_eq!(host_view.client_id.as_deref(), Some("p-client"));
        assert_eq!(host_view.answer.as_deref(), Some("answer-sdp"));
        assert!(host_view.offer.is_none());
        assert_eq!(host_view.peer_candidates, vec!["cc1"]);

        let client_view = s.view_for(Role::Client);
        assert_eq!(client_view.offer.as_deref(), Some("offer-sdp"));
        assert!(client_view.answer.is_none());
        assert_eq!(client_view.peer_candidates, vec!["hc1", "hc2"]);
    }

    #[test]
    fn test_expiry_is_strict() {
        let s = session();
        assert!(!s.is_expired(2_000));
        assert!(s.is_expired(2_001));
    }

    #[test]
    fn test_merge_dedupes_candidates() {
        let s = session();
        let view = s.view_for(Role::Host);

        let mut update = SessionUpdate::default();
        assert!(update.merge_view(&view, Role::Host));
        // Same view again: nothing new, no duplicate candidates
        assert!(!update.merge_view(&view, Role::Host));
        assert_eq!(update.peer_candidates, vec!["cc1"]);
        assert_eq!(update.peer_id.as_deref(), Some("p-client"));
    }

    #[test]
    fn test_merge_is_accumulative_across_polls() {
        let mut s = session();
        s.answer = None;
        s.client_candidates = vec!["cc1".into()];

        let mut update = SessionUpdate::default();
        update.merge_view(&s.view_for(Role::Host), Role::Host);
        assert!(update.answer.is_none());

        s.answer = Some("answer-sdp".into());
        s.client_candidates.push("cc2".into());
        assert!(update.merge_view(&s.view_for(Role::Host), Role::Host));
        assert_eq!(update.answer.as_deref(), Some("answer-sdp"));
        assert_eq!(update.peer_candidates, vec!["cc1", "cc2"]);
    }

    #[test]
    fn test_create_request_omits_empty_optionals() {
        let req = CreateSessionRequest {
            host_id: "p-host".into(),
            host_name: "Noor".into(),
            offer: None,
            game_code: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("offer"));
        assert!(!json.contains("gameCode"));
        assert!(json.contains("hostId"));
    }
}
