//! Per-client protocol state shared by all transports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::protocol::JsonRpcResponse;

/// Transport a session was opened on. A session id only resolves on the
/// surface that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Stdio,
    Sse,
    Http,
}

/// One MCP client conversation.
///
/// `outbound` is set only for transports that push replies on a separate
/// channel (SSE).
#[derive(Debug)]
pub struct Session {
    id: String,
    kind: SessionKind,
    initialized: AtomicBool,
    outbound: Option<mpsc::Sender<JsonRpcResponse>>,
    last_seen: Mutex<Instant>,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("session has no outbound channel")]
    NoChannel,
    #[error("session stream closed")]
    Closed,
}

impl Session {
    /// Fresh stdio session that must complete `initialize` before anything else.
    pub fn new() -> Self {
        Self::of_kind(SessionKind::Stdio)
    }

    /// Streamable HTTP session, addressed by the `Mcp-Session-Id` header.
    pub fn http() -> Self {
        Self::of_kind(SessionKind::Http)
    }

    /// SSE session whose replies are pushed into `outbound`.
    pub fn with_outbound(outbound: mpsc::Sender<JsonRpcResponse>) -> Self {
        Self {
            outbound: Some(outbound),
            ..Self::of_kind(SessionKind::Sse)
        }
    }

    /// One-shot HTTP session for clients that skip the handshake.
    pub fn stateless() -> Self {
        Self {
            id: String::new(),
            initialized: AtomicBool::new(true),
            ..Self::of_kind(SessionKind::Http)
        }
    }

    fn of_kind(kind: SessionKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            initialized: AtomicBool::new(false),
            outbound: None,
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Record client activity.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub async fn send(&self, response: JsonRpcResponse) -> Result<(), SendError> {
        let tx = self.outbound.as_ref().ok_or(SendError::NoChannel)?;
        tx.send(response).await.map_err(|_| SendError::Closed)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Live sessions keyed by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.lock().insert(session.id().to_string(), session);
    }

    /// Look up a session opened on `kind`; ids from other transports miss.
    pub fn get(&self, id: &str, kind: SessionKind) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .get(id)
            .filter(|s| s.kind() == kind)
            .cloned()
    }

    /// Remove a session opened on `kind`.
    pub fn remove(&self, id: &str, kind: SessionKind) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.lock();
        if sessions.get(id).is_some_and(|s| s.kind() == kind) {
            sessions.remove(id)
        } else {
            None
        }
    }

    /// Drop `kind` sessions with no activity for at least `max_idle`.
    /// Returns how many were removed.
    pub fn evict_idle(&self, kind: SessionKind, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.kind() != kind || s.idle_for() < max_idle);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session. SSE streams end once their sender is gone.
    pub fn clear(&self) {
        let drained: Vec<_> = self.sessions.lock().drain().collect();
        tracing::debug!(count = drained.len(), "Closed all sessions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sessions_start_uninitialized() {
        let session = Session::new();
        assert!(!session.is_initialized());
        session.mark_initialized();
        assert!(session.is_initialized());
    }

    #[test]
    fn stateless_sessions_skip_handshake() {
        assert!(Session::stateless().is_initialized());
    }

    #[test]
    fn registry_lifecycle() {
        let registry = SessionRegistry::new();
        let session = Arc::new(Session::new());
        let id = session.id().to_string();

        registry.insert(session);
        assert!(registry.get(&id, SessionKind::Stdio).is_some());
        assert!(registry.remove(&id, SessionKind::Stdio).is_some());
        assert!(registry.get(&id, SessionKind::Stdio).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn ids_do_not_cross_transports() {
        let (tx, _rx) = mpsc::channel(1);
        let registry = SessionRegistry::new();
        let sse = Arc::new(Session::with_outbound(tx));
        let id = sse.id().to_string();
        registry.insert(sse);

        assert!(registry.get(&id, SessionKind::Http).is_none());
        assert!(registry.remove(&id, SessionKind::Http).is_none());
        assert!(registry.get(&id, SessionKind::Sse).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_http_sessions_are_evicted() {
        let (tx, _rx) = mpsc::channel(1);
        let registry = SessionRegistry::new();
        let stale = Arc::new(Session::http());
        let active = Arc::new(Session::http());
        let stale_id = stale.id().to_string();
        let active_id = active.id().to_string();
        registry.insert(stale);
        registry.insert(active.clone());
        registry.insert(Arc::new(Session::with_outbound(tx)));

        tokio::time::advance(Duration::from_secs(50)).await;
        active.touch();
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(registry.evict_idle(SessionKind::Http, Duration::from_secs(60)), 1);
        assert!(registry.get(&stale_id, SessionKind::Http).is_none());
        assert!(registry.get(&active_id, SessionKind::Http).is_some());
        assert_eq!(registry.len(), 2, "SSE sessions live as long as their stream");
    }

    #[tokio::test]
    async fn send_without_channel_fails() {
        let session = Session::new();
        let resp = JsonRpcResponse::success(None, serde_json::json!({}));
        assert!(matches!(session.send(resp).await, Err(SendError::NoChannel)));
    }

    #[tokio::test]
    async fn clear_closes_outbound_streams() {
        let (tx, mut rx) = mpsc::channel(1);
        let registry = SessionRegistry::new();
        registry.insert(Arc::new(Session::with_outbound(tx)));
        registry.clear();
        assert!(rx.recv().await.is_none());
    }
}
