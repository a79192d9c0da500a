//! Legacy MCP HTTP+SSE transport.
//!
//! A client opens `GET /sse` and receives an `endpoint` event naming the URL
//! to POST requests to. Replies arrive on the open stream as `message` events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::AppState;
use crate::protocol::JsonRpcResponse;
use crate::session::{Session, SessionKind, SessionRegistry};

/// Replies buffered per SSE session before `POST /messages` waits.
const SSE_CHANNEL_CAPACITY: usize = 64;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sse", get(connect))
        .route("/messages", post(post_message))
}

/// Removes its session from the registry when the SSE stream is dropped.
struct SessionGuard {
    id: String,
    sessions: Arc<SessionRegistry>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.sessions.remove(&self.id, SessionKind::Sse).is_some() {
            info!(session = %self.id, "SSE client disconnected");
        }
    }
}

async fn connect(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(SSE_CHANNEL_CAPACITY);
    let session = Arc::new(Session::with_outbound(tx));
    let id = session.id().to_string();
    state.sessions.insert(session);
    info!(session = %id, "SSE client connected");

    let endpoint = Event::default()
        .event("endpoint")
        .data(endpoint_url(state.server.config().public_url.as_deref(), &id));

    let guard = SessionGuard {
        id,
        sessions: state.sessions.clone(),
    };
    let messages = ReceiverStream::new(rx).map(move |resp| {
        let _held = &guard;
        Ok::<_, Infallible>(message_event(&resp))
    });

    let stream = tokio_stream::once(Ok::<_, Infallible>(endpoint)).chain(messages);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// URL clients POST requests to; relative when no public URL is configured.
pub fn endpoint_url(public_url: Option<&str>, session_id: &str) -> String {
    format!(
        "{}/messages?sessionId={session_id}",
        public_url.unwrap_or_default()
    )
}

fn message_event(resp: &JsonRpcResponse) -> Event {
    Event::default()
        .event("message")
        .json_data(resp)
        .unwrap_or_else(|e| {
            warn!("Cannot encode SSE message: {e}");
            Event::default().comment("encoding error")
        })
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId", alias = "session_id")]
    session_id: Option<String>,
}

async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let Some(id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "Missing sessionId").into_response();
    };
    let Some(session) = state.sessions.get(&id, SessionKind::Sse) else {
        debug!(session = %id, "Message for unknown session");
        return (StatusCode::NOT_FOUND, "Could not find session").into_response();
    };

    if let Some(resp) = state.server.handle_message(&session, &body).await {
        if let Err(e) = session.send(resp).await {
            warn!(session = %id, "Dropping reply: {e}");
            return (StatusCode::GONE, "Session stream closed").into_response();
        }
    }

    (StatusCode::ACCEPTED, "Accepted").into_response()
}
