//! Message-level tests for `McpServer`: framing, the initialization gate,
//! and notification handling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::Value;

use fast_time_server::clock::FixedClock;
use fast_time_server::config::ServerConfig;
use fast_time_server::protocol::{JsonRpcResponse, RpcId};
use fast_time_server::server::{McpServer, MAX_MESSAGE_BYTES};
use fast_time_server::session::Session;

fn test_server() -> McpServer {
    let config = ServerConfig {
        tool_timeout: Duration::from_secs(5),
        ..ServerConfig::default()
    };
    let clock = FixedClock(Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap());
    McpServer::with_clock(config, Arc::new(clock))
}

async fn send(server: &McpServer, session: &Session, raw: &str) -> Option<JsonRpcResponse> {
    server.handle_message(session, raw.as_bytes()).await
}

const INITIALIZE: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#;

#[tokio::test]
async fn requests_before_initialize_are_rejected() {
    let server = test_server();
    let session = Session::new();

    let resp = send(&server, &session, r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#)
        .await
        .unwrap();
    let err = resp.error.unwrap();
    assert_eq!(err.code, -32600);
    assert_eq!(err.message, "Server not initialized");
    assert_eq!(resp.id, Some(RpcId::Number(7)));
}

#[tokio::test]
async fn notifications_before_initialize_are_dropped() {
    let server = test_server();
    let session = Session::new();

    let resp = send(&server, &session, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
    assert!(resp.is_none());
}

#[tokio::test]
async fn initialize_opens_the_gate() {
    let server = test_server();
    let session = Session::new();

    let resp = send(&server, &session, INITIALIZE).await.unwrap();
    assert!(resp.is_success());
    assert!(session.is_initialized());

    let resp = send(&server, &session, r#"{"jsonrpc":"2.0","id":"two","method":"ping"}"#)
        .await
        .unwrap();
    assert_eq!(resp.id, Some(RpcId::Str("two".into())));
    assert_eq!(resp.result.unwrap(), serde_json::json!({}));
}

#[tokio::test]
async fn full_tool_round_trip() {
    let server = test_server();
    let session = Session::new();
    send(&server, &session, INITIALIZE).await.unwrap();

    let call = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"get_system_time","arguments":{"timezone":"Europe/Berlin"}}}"#;
    let resp = send(&server, &session, call).await.unwrap();
    let result = resp.result.unwrap();
    assert_eq!(result["content"][0]["text"], "2025-01-15T13:00:00+01:00");
}

#[tokio::test]
async fn notifications_never_get_a_reply() {
    let server = test_server();
    let session = Session::stateless();

    let resp = send(&server, &session, r#"{"jsonrpc":"2.0","method":"ping"}"#).await;
    assert!(resp.is_none());

    let resp = send(&server, &session, r#"{"jsonrpc":"2.0","method":"no/such/method"}"#).await;
    assert!(resp.is_none());
}

#[tokio::test]
async fn wrong_jsonrpc_version() {
    let server = test_server();
    let session = Session::stateless();

    let resp = send(&server, &session, r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#)
        .await
        .unwrap();
    assert_eq!(resp.error.unwrap().code, -32600);

    // Still a notification, so still no reply.
    let resp = send(&server, &session, r#"{"jsonrpc":"1.0","method":"ping"}"#).await;
    assert!(resp.is_none());
}

#[tokio::test]
async fn initialize_as_notification_does_not_open_the_gate() {
    let server = test_server();
    let session = Session::new();

    let resp = send(&server, &session, r#"{"jsonrpc":"2.0","method":"initialize","params":{}}"#).await;
    assert!(resp.is_none());
    assert!(!session.is_initialized());

    let resp = send(&server, &session, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
        .await
        .unwrap();
    assert_eq!(resp.error.unwrap().code, -32600);
}

#[tokio::test]
async fn malformed_json_is_parse_error_with_null_id() {
    let server = test_server();
    let session = Session::stateless();

    let resp = send(&server, &session, "{\"jsonrpc\":").await.unwrap();
    assert_eq!(resp.error.as_ref().unwrap().code, -32700);
    assert!(resp.id.is_none());

    let encoded: Value = serde_json::to_value(&resp).unwrap();
    assert!(encoded.get("result").is_none());
}

#[tokio::test]
async fn invalid_utf8_is_parse_error() {
    let server = test_server();
    let session = Session::stateless();

    let resp = server
        .handle_message(&session, &[0xff, 0xfe, b'{', b'}'])
        .await
        .unwrap();
    assert_eq!(resp.error.unwrap().code, -32700);
}

#[tokio::test]
async fn oversized_message_is_parse_error() {
    let server = test_server();
    let session = Session::stateless();

    let raw = vec![b' '; MAX_MESSAGE_BYTES + 1];
    let resp = server.handle_message(&session, &raw).await.unwrap();
    assert_eq!(resp.error.unwrap().code, -32700);
}

#[tokio::test]
async fn stateless_session_skips_handshake() {
    let server = test_server();
    let session = Session::stateless();

    let resp = send(&server, &session, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .await
        .unwrap();
    assert!(resp.is_success());
}
