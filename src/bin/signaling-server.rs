// Signaling relay server
// Holds session records and exchanges handshake metadata between peers.
// Game data never passes through here.
//
// Usage: cargo run --bin signaling-server

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::info;

use cardlink::config::{load_config, Config};
use cardlink::error::SignalingError;
use cardlink::signaling::{
    CandidateRequest, CreateSessionRequest, JoinSessionRequest, RelayErrorBody, Role,
    SignalRequest, SignalingStore,
};

/// How often abandoned sessions are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

type SharedStore = Arc<SignalingStore>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionQuery {
    session_id: String,
    role: Role,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteQuery {
    session_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = load_config().unwrap_or_else(|_| Config::default());
    let ttl = Duration::from_secs(config.signaling.session_ttl_secs);
    let store: SharedStore = Arc::new(SignalingStore::new(ttl));

    // Lazy eviction covers sessions that are still being read; the sweep
    // catches the ones nobody touches again
    let sweeper = Arc::clone(&store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            sweeper.purge_expired().await;
        }
    });

    let app = Router::new()
        .route(
            "/sessions",
            post(create_session).get(fetch_session).delete(delete_session),
        )
        .route("/sessions/join", post(join_session))
        .route("/sessions/offer", post(send_offer))
        .route("/sessions/answer", post(send_answer))
        .route("/sessions/candidates", post(add_candidate))
        .with_state(store);

    let addr = "0.0.0.0:8080";
    let listener = TcpListener::bind(addr).await?;
    info!("🚀 Signaling relay listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn create_session(
    State(store): State<SharedStore>,
    Json(req): Json<CreateSessionRequest>,
) -> Response {
    match store.create(req).await {
        Ok(created) => Json(created).into_response(),
        Err(err) => error_response(err),
    }
}

async fn join_session(
    State(store): State<SharedStore>,
    Json(req): Json<JoinSessionRequest>,
) -> Response {
    match store.join(req).await {
        Ok(joined) => Json(joined).into_response(),
        Err(err) => error_response(err),
    }
}

async fn send_offer(
    State(store): State<SharedStore>,
    Json(req): Json<SignalRequest>,
) -> Response {
    match store.set_offer(&req.session_id, &req.payload).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn send_answer(
    State(store): State<SharedStore>,
    Json(req): Json<SignalRequest>,
) -> Response {
    match store.set_answer(&req.session_id, &req.payload).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn add_candidate(
    State(store): State<SharedStore>,
    Json(req): Json<CandidateRequest>,
) -> Response {
    match store
        .add_candidate(&req.session_id, req.role, &req.candidate)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn fetch_session(
    State(store): State<SharedStore>,
    Query(query): Query<SessionQuery>,
) -> Response {
    match store.fetch(&query.session_id, query.role).await {
        Ok(view) => Json(view).into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_session(
    State(store): State<SharedStore>,
    Query(query): Query<DeleteQuery>,
) -> Response {
    store.remove(&query.session_id).await;
    StatusCode::OK.into_response()
}

fn error_response(err: SignalingError) -> Response {
    let status = match &err {
        SignalingError::SessionNotFound | SignalingError::SessionExpired => StatusCode::NOT_FOUND,
        SignalingError::SessionFull
        | SignalingError::CodeTaken
        | SignalingError::AlreadySet { .. } => StatusCode::CONFLICT,
        SignalingError::NoActiveSession | SignalingError::RoleMismatch => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = RelayErrorBody {
        error: err.to_string(),
        code: err.wire_code().to_string(),
    };
    (status, Json(body)).into_response()
}
