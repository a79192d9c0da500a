//! Streamable HTTP transport (JSON responses only).
//!
//! `POST /http` carries one JSON-RPC message per request. An `initialize`
//! without an `Mcp-Session-Id` header opens a session whose id comes back in
//! that header; requests without the header are handled statelessly.
//! Sessions idle for longer than the configured TTL are swept.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{debug, info};

use super::AppState;
use crate::protocol::JsonRpcResponse;
use crate::server::parse_message;
use crate::session::{Session, SessionKind, SessionRegistry};

pub const SESSION_HEADER: &str = "mcp-session-id";

pub fn routes() -> Router<AppState> {
    Router::new().route("/http", post(post_http).delete(delete_http))
}

async fn post_http(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let req = match parse_message(&body) {
        Ok(r) => r,
        Err(resp) => return (StatusCode::BAD_REQUEST, Json(resp)).into_response(),
    };

    let (session, created) = match headers.get(SESSION_HEADER).map(|v| v.to_str()) {
        Some(Ok(id)) => match state.sessions.get(id, SessionKind::Http) {
            Some(s) => {
                s.touch();
                (s, false)
            }
            None => {
                debug!(session = %id, "Request for unknown session");
                return (StatusCode::NOT_FOUND, "Session not found").into_response();
            }
        },
        Some(Err(_)) => {
            return (StatusCode::BAD_REQUEST, "Invalid Mcp-Session-Id header").into_response();
        }
        None if req.method == "initialize" => (Arc::new(Session::http()), true),
        None => (Arc::new(Session::stateless()), false),
    };

    let resp = state.server.handle_request(&session, req).await;
    let register = created && resp.as_ref().is_some_and(JsonRpcResponse::is_success);

    let mut response = match resp {
        Some(r) => (StatusCode::OK, Json(r)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };

    if register {
        if let Ok(value) = HeaderValue::from_str(session.id()) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(SESSION_HEADER), value);
            info!(session = %session.id(), "HTTP session opened");
            state.sessions.insert(session);
        }
    }

    response
}

async fn delete_http(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let Some(id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) else {
        return StatusCode::BAD_REQUEST;
    };

    if state.sessions.remove(id, SessionKind::Http).is_some() {
        info!(session = %id, "HTTP session closed");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// How often the idle sweep runs for a given TTL.
pub fn sweep_interval(ttl: Duration) -> Duration {
    (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
}

/// Periodically drop HTTP sessions idle for at least `ttl`. Runs until aborted.
pub async fn sweep_idle_sessions(sessions: Arc<SessionRegistry>, ttl: Duration) {
    let mut ticker = tokio::time::interval(sweep_interval(ttl));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let evicted = sessions.evict_idle(SessionKind::Http, ttl);
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Expired idle HTTP sessions");
        }
    }
}
