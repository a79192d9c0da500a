use crate::protocol::{ConvertTimeParams, McpErrorResponse, ToolResult};
use crate::timezone;

/// Handle a `convert_time` tool call.
pub async fn handle(params: ConvertTimeParams) -> ToolResult {
    match timezone::convert(&params.time, &params.source_timezone, &params.target_timezone) {
        Ok(converted) => ToolResult::text(converted),
        Err(err) => {
            tracing::debug!(
                time = %params.time,
                source = %params.source_timezone,
                target = %params.target_timezone,
                error = %err,
                "convert_time failed"
            );
            McpErrorResponse::from(err).into()
        }
    }
}
