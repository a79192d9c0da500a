use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handlers;
use crate::metrics::ToolMetrics;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::session::Session;

/// Maximum bytes per JSON-RPC message (1 MiB).
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Transport-independent MCP request handling.
///
/// Transports hand raw messages to [`McpServer::handle_message`] together
/// with the [`Session`] they belong to; the server enforces the handshake and
/// routes to the tool and resource handlers.
pub struct McpServer {
    config: ServerConfig,
    clock: Arc<dyn Clock>,
    metrics: ToolMetrics,
    started: Instant,
}

impl McpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            metrics: handlers::tool_metrics(),
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ToolMetrics {
        &self.metrics
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Decode and handle one raw message.
    pub async fn handle_message(&self, session: &Session, raw: &[u8]) -> Option<JsonRpcResponse> {
        match parse_message(raw) {
            Ok(req) => self.handle_request(session, req).await,
            Err(resp) => Some(resp),
        }
    }

    /// Handle one decoded request. Returns `None` when no reply is due.
    pub async fn handle_request(
        &self,
        session: &Session,
        req: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        // Validate jsonrpc version
        if req.jsonrpc != "2.0" {
            if req.is_notification() {
                return None;
            }
            return Some(JsonRpcResponse::error(
                req.id.clone(),
                JsonRpcError::invalid_request(),
            ));
        }

        // Initialization gate: only `initialize` is allowed before handshake completes
        if !session.is_initialized() && req.method != "initialize" {
            if req.is_notification() {
                return None;
            }
            return Some(JsonRpcResponse::error(
                req.id.clone(),
                JsonRpcError::invalid_request_with("Server not initialized"),
            ));
        }

        let resp = handlers::dispatch(&req, &self.config, self.clock.as_ref(), &self.metrics).await;

        if req.is_notification() {
            return None;
        }

        if req.method == "initialize" && resp.as_ref().is_some_and(JsonRpcResponse::is_success) {
            session.mark_initialized();
            debug!(session = session.id(), "Session initialized");
        }
        resp
    }

    /// Serve newline-delimited JSON-RPC over stdin/stdout until EOF.
    pub async fn run_stdio(&self) -> Result<(), ServerError> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let session = Session::new();
        let mut raw = Vec::new();

        loop {
            let n = read_line_bounded(&mut reader, &mut raw).await?;
            if n == 0 {
                debug!("stdin closed");
                break;
            }

            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            if let Some(resp) = self.handle_message(&session, &raw).await {
                write_response(&mut stdout, &resp).await?;
            }
        }

        Ok(())
    }
}

/// Read one newline-terminated line into `buf`, keeping at most
/// `MAX_MESSAGE_BYTES + 1` bytes. The remainder of an over-long line is
/// consumed and discarded so the next read starts on a fresh message.
///
/// Returns the number of bytes kept; 0 means EOF.
pub(crate) async fn read_line_bounded<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = MAX_MESSAGE_BYTES as u64 + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;

    if n > MAX_MESSAGE_BYTES && buf.last() != Some(&b'\n') {
        loop {
            let chunk = reader.fill_buf().await?;
            if chunk.is_empty() {
                break;
            }
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    reader.consume(pos + 1);
                    break;
                }
                None => {
                    let len = chunk.len();
                    reader.consume(len);
                }
            }
        }
    }

    Ok(n)
}

/// Decode a raw JSON-RPC message, producing a ready-made error reply on failure.
pub fn parse_message(raw: &[u8]) -> Result<JsonRpcRequest, JsonRpcResponse> {
    if raw.len() > MAX_MESSAGE_BYTES {
        warn!(
            "Message too large: {} bytes (limit {MAX_MESSAGE_BYTES})",
            raw.len()
        );
        return Err(JsonRpcResponse::error(None, JsonRpcError::parse_error()));
    }

    let trimmed = match std::str::from_utf8(raw) {
        Ok(s) => s.trim(),
        Err(_) => return Err(JsonRpcResponse::error(None, JsonRpcError::parse_error())),
    };

    serde_json::from_str(trimmed).map_err(|e| {
        debug!("Parse error: {e}");
        JsonRpcResponse::error(None, JsonRpcError::parse_error())
    })
}

async fn write_response(
    stdout: &mut tokio::io::Stdout,
    resp: &JsonRpcResponse,
) -> Result<(), ServerError> {
    let out = serde_json::to_string(resp)?;
    stdout.write_all(out.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn over_long_line_is_truncated_and_skipped() {
        let mut input = vec![b'x'; MAX_MESSAGE_BYTES * 2];
        input.push(b'\n');
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n");
        let mut reader: &[u8] = &input;
        let mut buf = Vec::new();

        let n = read_line_bounded(&mut reader, &mut buf).await.unwrap();
        assert_eq!(n, MAX_MESSAGE_BYTES + 1);
        assert!(parse_message(&buf).is_err());

        read_line_bounded(&mut reader, &mut buf).await.unwrap();
        assert_eq!(parse_message(&buf).unwrap().method, "ping");

        assert_eq!(read_line_bounded(&mut reader, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn short_lines_pass_through() {
        let mut reader: &[u8] = b"a\nbc\n";
        let mut buf = Vec::new();
        assert_eq!(read_line_bounded(&mut reader, &mut buf).await.unwrap(), 2);
        assert_eq!(buf, b"a\n");
        assert_eq!(read_line_bounded(&mut reader, &mut buf).await.unwrap(), 3);
        assert_eq!(buf, b"bc\n");
    }
}
