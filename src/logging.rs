//! Structured logging setup.
//!
//! Logs always go to stderr: in stdio mode stdout carries the protocol.

use std::io;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogLevel, ServerConfig};

/// Build the filter: `RUST_LOG` wins, otherwise the configured level.
fn env_filter(level: LogLevel) -> EnvFilter {
    if level == LogLevel::None {
        return EnvFilter::new(level.as_filter());
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

/// Install the global subscriber. Returns an error if one is already set.
pub fn init(config: &ServerConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = env_filter(config.log_level);

    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(false)
                    .with_writer(io::stderr),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(false)
                    .with_writer(io::stderr),
            )
            .try_init()?;
    }

    tracing::debug!(level = config.log_level.as_filter(), json = config.log_json, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_disables_everything() {
        assert_eq!(env_filter(LogLevel::None).to_string(), "off");
    }
}
