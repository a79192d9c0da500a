use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::SERVER_NAME;
use crate::protocol::LATEST_PROTOCOL_VERSION;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub uptime_seconds: u64,
}

impl HealthReport {
    pub fn since(started: Instant) -> Self {
        Self {
            status: "healthy".into(),
            uptime_seconds: started.elapsed().as_secs(),
        }
    }
}

/// Body of `GET /version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
    pub mcp_version: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            name: SERVER_NAME.into(),
            version: env!("CARGO_PKG_VERSION").into(),
            mcp_version: LATEST_PROTOCOL_VERSION.into(),
        }
    }
}
