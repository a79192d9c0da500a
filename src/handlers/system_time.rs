use crate::clock::Clock;
use crate::protocol::{GetSystemTimeParams, McpErrorResponse, ToolResult};
use crate::timezone::{format_in, parse_timezone};

/// Handle a `get_system_time` tool call.
///
/// Reports the clock's current instant in the requested zone (UTC by default).
pub async fn handle(params: GetSystemTimeParams, clock: &dyn Clock) -> ToolResult {
    let zone = match parse_timezone(params.timezone.as_deref().unwrap_or_default()) {
        Ok(z) => z,
        Err(err) => {
            tracing::debug!(error = %err, "get_system_time rejected timezone");
            return McpErrorResponse::from(err).into();
        }
    };

    ToolResult::text(format_in(clock.now(), zone))
}
