//! Network surfaces: SSE, streamable HTTP, and the stdio fallback.

pub mod auth;
pub mod http;
pub mod sse;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::get;
use axum::{middleware, Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ServerError;
use crate::handlers::health::{HealthReport, VersionInfo};
use crate::server::{McpServer, MAX_MESSAGE_BYTES};
use crate::session::SessionRegistry;
use crate::shutdown;

/// Shared state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub server: Arc<McpServer>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(server: McpServer) -> Self {
        Self {
            server: Arc::new(server),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

/// Build the HTTP router for the configured transport.
///
/// `/health` and `/version` are always mounted and never authenticated.
pub fn router(state: AppState) -> Router {
    let transport = state.server.config().transport;

    let mut mcp = Router::new();
    if transport.serves_sse() {
        mcp = mcp.merge(sse::routes());
    }
    if transport.serves_http() {
        mcp = mcp.merge(http::routes());
    }
    if transport.is_network() {
        mcp = mcp.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));
    }

    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .merge(mcp)
        .layer(DefaultBodyLimit::max(MAX_MESSAGE_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport::since(state.server.started()))
}

async fn version() -> Json<VersionInfo> {
    Json(VersionInfo::current())
}

/// Run the server on its configured transport until EOF or a shutdown signal.
pub async fn serve(server: McpServer) -> Result<(), ServerError> {
    let config = server.config().clone();

    if !config.transport.is_network() {
        info!("fast-time-server serving MCP on stdio");
        return tokio::select! {
            res = server.run_stdio() => res,
            _ = shutdown::wait_for_signal() => Ok(()),
        };
    }

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!(addr = %addr, transport = ?config.transport, "fast-time-server listening");
    if config.transport.serves_sse() {
        info!("SSE endpoints: GET /sse, POST /messages");
    }
    if config.transport.serves_http() {
        info!("Streamable HTTP endpoint: POST /http");
    }
    if config.auth_token.is_some() {
        info!("Bearer authentication enabled on MCP routes");
    }

    let state = AppState::new(server);
    let sessions = state.sessions.clone();
    let sweeper = config.transport.serves_http().then(|| {
        tokio::spawn(http::sweep_idle_sessions(
            sessions.clone(),
            config.session_ttl,
        ))
    });

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown::wait_for_signal().await;
            sessions.clear();
        })
        .await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    served?;

    info!("Server stopped");
    Ok(())
}
