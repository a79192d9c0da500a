//! MCP time server.
//!
//! Exposes `get_system_time` and `convert_time` tools plus timezone and
//! tool-metrics resources over JSON-RPC 2.0, served on stdio, HTTP+SSE, streamable
//! HTTP, or SSE and HTTP together on one port.

pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod timezone;
pub mod transport;

pub mod schema;
