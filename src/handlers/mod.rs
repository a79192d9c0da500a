pub mod convert_time;
pub mod health;
pub mod resources;
pub mod system_time;

use std::future::Future;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::ServerConfig;
use crate::metrics::ToolMetrics;
use crate::protocol::{
    negotiate_protocol_version, ConvertTimeParams, GetSystemTimeParams, InitializeParams,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpErrorCode, McpErrorResponse,
    ReadResourceParams, ToolCallParams, ToolResult,
};
use crate::schema;

pub const SERVER_NAME: &str = "fast-time-server";

pub const GET_SYSTEM_TIME: &str = "get_system_time";
pub const CONVERT_TIME: &str = "convert_time";

/// Metrics table covering every advertised tool.
pub fn tool_metrics() -> ToolMetrics {
    ToolMetrics::new(&[GET_SYSTEM_TIME, CONVERT_TIME])
}

/// Dispatch a JSON-RPC request to the appropriate handler.
///
/// Returns `None` for notifications (no response required).
pub async fn dispatch(
    req: &JsonRpcRequest,
    config: &ServerConfig,
    clock: &dyn Clock,
    metrics: &ToolMetrics,
) -> Option<JsonRpcResponse> {
    match req.method.as_str() {
        "initialize" => {
            let params: Option<InitializeParams> = req
                .params
                .as_ref()
                .and_then(|v| serde_json::from_value(v.clone()).ok());
            let requested = params.as_ref().and_then(|p| p.protocol_version.as_deref());
            let version = negotiate_protocol_version(requested);

            if let Some(client) = params.as_ref().and_then(|p| p.client_info.as_ref()) {
                info!(
                    client = client.name.as_deref().unwrap_or("unknown"),
                    client_version = client.version.as_deref().unwrap_or("unknown"),
                    protocol = version,
                    "Client initializing"
                );
            }

            let result = json!({
                "protocolVersion": version,
                "capabilities": {
                    "tools": {},
                    "resources": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            });
            Some(JsonRpcResponse::success(req.id.clone(), result))
        }

        "notifications/initialized" => None,

        "ping" => Some(JsonRpcResponse::success(req.id.clone(), json!({}))),

        "tools/list" => Some(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": tool_definitions() }),
        )),

        "tools/call" => {
            let params: ToolCallParams = match &req.params {
                Some(v) => match serde_json::from_value(v.clone()) {
                    Ok(p) => p,
                    Err(e) => {
                        return Some(JsonRpcResponse::error(
                            req.id.clone(),
                            JsonRpcError::invalid_params(format!(
                                "Invalid tools/call params: {e}"
                            )),
                        ));
                    }
                },
                None => {
                    return Some(JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_params("Missing params for tools/call"),
                    ));
                }
            };

            let started = Instant::now();
            let tool_result = call_tool_with_timeout(
                &params.name,
                dispatch_tool_call(&params, clock),
                config.tool_timeout,
            )
            .await;
            metrics.record(&params.name, started.elapsed(), !tool_result.is_error, clock.now());

            match serde_json::to_value(&tool_result) {
                Ok(result) => Some(JsonRpcResponse::success(req.id.clone(), result)),
                Err(e) => Some(JsonRpcResponse::error(
                    req.id.clone(),
                    JsonRpcError::internal_error(format!("Cannot encode tool result: {e}")),
                )),
            }
        }

        "resources/list" => Some(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "resources": resources::list() }),
        )),

        "resources/read" => {
            let params: ReadResourceParams = match req
                .params
                .as_ref()
                .map(|v| serde_json::from_value(v.clone()))
            {
                Some(Ok(p)) => p,
                Some(Err(e)) => {
                    return Some(JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_params(format!("Invalid resources/read params: {e}")),
                    ));
                }
                None => {
                    return Some(JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_params("Missing params for resources/read"),
                    ));
                }
            };

            match resources::read(&params.uri, clock.now(), metrics) {
                Ok(content) => Some(JsonRpcResponse::success(
                    req.id.clone(),
                    json!({ "contents": [content] }),
                )),
                Err(err) => Some(JsonRpcResponse::error(req.id.clone(), err.into())),
            }
        }

        _ => Some(JsonRpcResponse::error(
            req.id.clone(),
            JsonRpcError::method_not_found(&req.method),
        )),
    }
}

/// Run a tool call, bounded by `timeout`. Expiry yields a `timeout` tool error.
pub async fn call_tool_with_timeout<F>(tool: &str, call: F, timeout: Duration) -> ToolResult
where
    F: Future<Output = ToolResult>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(tool, "Tool call timed out after {} seconds", timeout.as_secs());
            McpErrorResponse::canonical(McpErrorCode::Timeout).into()
        }
    }
}

async fn dispatch_tool_call(params: &ToolCallParams, clock: &dyn Clock) -> ToolResult {
    debug!(tool = %params.name, "Tool call");

    match params.name.as_str() {
        GET_SYSTEM_TIME => {
            let args: GetSystemTimeParams =
                match parse_arguments(GET_SYSTEM_TIME, params.arguments.as_ref()) {
                    Ok(a) => a,
                    Err(err) => return err.into(),
                };
            system_time::handle(args, clock).await
        }

        CONVERT_TIME => {
            let args: ConvertTimeParams =
                match parse_arguments(CONVERT_TIME, params.arguments.as_ref()) {
                    Ok(a) => a,
                    Err(err) => return err.into(),
                };
            convert_time::handle(args).await
        }

        _ => ToolResult::error(format!("Unknown tool: {}", params.name)),
    }
}

/// Validate tool arguments against the advertised input schema, then decode.
///
/// Absent arguments are treated as an empty object.
fn parse_arguments<T: DeserializeOwned>(
    tool: &str,
    arguments: Option<&Value>,
) -> Result<T, McpErrorResponse> {
    let arguments = arguments.cloned().unwrap_or_else(|| json!({}));

    if let Some(input_schema) = input_schema(tool) {
        if let Err(e) = schema::validate_value(&input_schema, &arguments) {
            debug!(tool, error = %e, "Rejected tool arguments");
            return Err(McpErrorResponse::new(
                McpErrorCode::InvalidArguments,
                format!("Invalid arguments for {tool}: {e}"),
            ));
        }
    }

    serde_json::from_value(arguments).map_err(|e| {
        McpErrorResponse::new(
            McpErrorCode::InvalidArguments,
            format!("Invalid arguments for {tool}: {e}"),
        )
    })
}

/// JSON Schema for a tool's `arguments` object.
pub fn input_schema(tool: &str) -> Option<Value> {
    match tool {
        GET_SYSTEM_TIME => Some(json!({
            "type": "object",
            "properties": {
                "timezone": {
                    "type": "string",
                    "description": "IANA timezone name (e.g. 'America/New_York', 'Europe/London'). Defaults to UTC."
                }
            },
            "additionalProperties": false
        })),
        CONVERT_TIME => Some(json!({
            "type": "object",
            "required": ["time", "source_timezone", "target_timezone"],
            "properties": {
                "time": {
                    "type": "string",
                    "description": "RFC 3339 timestamp, or local 'YYYY-MM-DD HH:MM[:SS]' read in source_timezone",
                    "minLength": 1
                },
                "source_timezone": {
                    "type": "string",
                    "description": "IANA timezone of the input time"
                },
                "target_timezone": {
                    "type": "string",
                    "description": "IANA timezone to convert into"
                }
            },
            "additionalProperties": false
        })),
        _ => None,
    }
}

/// Tool descriptors returned by `tools/list`.
pub fn tool_definitions() -> Value {
    json!([
        {
            "name": GET_SYSTEM_TIME,
            "description": "Get the current system time in the given timezone",
            "inputSchema": input_schema(GET_SYSTEM_TIME)
        },
        {
            "name": CONVERT_TIME,
            "description": "Convert a time from one timezone to another",
            "inputSchema": input_schema(CONVERT_TIME)
        }
    ])
}
