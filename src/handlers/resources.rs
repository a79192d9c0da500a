use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::metrics::ToolMetrics;
use crate::protocol::{McpErrorCode, McpErrorResponse, ResourceContent};
use crate::timezone::{format_in, offset_at, parse_timezone};

pub const TIMEZONE_INFO_URI: &str = "timezone://info";
pub const WORLD_TIMES_URI: &str = "time://current/world";
pub const TOOL_METRICS_URI: &str = "metrics://tools";

const JSON_MIME: &str = "application/json";

/// Zones listed by `timezone://info`: (IANA id, display name).
const WELL_KNOWN_ZONES: &[(&str, &str)] = &[
    ("UTC", "Coordinated Universal Time"),
    ("America/New_York", "Eastern Time"),
    ("America/Chicago", "Central Time"),
    ("America/Denver", "Mountain Time"),
    ("America/Los_Angeles", "Pacific Time"),
    ("America/Sao_Paulo", "Brasilia Time"),
    ("Europe/London", "British Time"),
    ("Europe/Paris", "Central European Time"),
    ("Europe/Moscow", "Moscow Time"),
    ("Asia/Dubai", "Gulf Standard Time"),
    ("Asia/Kolkata", "India Standard Time"),
    ("Asia/Shanghai", "China Standard Time"),
    ("Asia/Tokyo", "Japan Standard Time"),
    ("Australia/Sydney", "Australian Eastern Time"),
];

/// Cities listed by `time://current/world`: (city, IANA id).
const WORLD_CITIES: &[(&str, &str)] = &[
    ("New York", "America/New_York"),
    ("Los Angeles", "America/Los_Angeles"),
    ("São Paulo", "America/Sao_Paulo"),
    ("London", "Europe/London"),
    ("Paris", "Europe/Paris"),
    ("Dubai", "Asia/Dubai"),
    ("Mumbai", "Asia/Kolkata"),
    ("Shanghai", "Asia/Shanghai"),
    ("Tokyo", "Asia/Tokyo"),
    ("Sydney", "Australia/Sydney"),
];

#[derive(Debug, Serialize)]
struct ZoneInfo {
    id: &'static str,
    name: &'static str,
    offset: String,
}

#[derive(Debug, Serialize)]
struct CityTime {
    city: &'static str,
    timezone: &'static str,
    time: String,
}

/// Resource descriptors returned by `resources/list`.
pub fn list() -> Value {
    json!([
        {
            "uri": TIMEZONE_INFO_URI,
            "name": "Timezone information",
            "description": "Well-known timezones with their current UTC offsets",
            "mimeType": JSON_MIME
        },
        {
            "uri": WORLD_TIMES_URI,
            "name": "Current world times",
            "description": "Current time in major cities",
            "mimeType": JSON_MIME
        },
        {
            "uri": TOOL_METRICS_URI,
            "name": "Tool metrics",
            "description": "Invocation counts and response times per tool",
            "mimeType": JSON_MIME
        }
    ])
}

/// Render a resource as of `now`.
pub fn read(
    uri: &str,
    now: DateTime<Utc>,
    metrics: &ToolMetrics,
) -> Result<ResourceContent, McpErrorResponse> {
    let body = match uri {
        TIMEZONE_INFO_URI => json!({ "timezones": zone_info(now) }),
        WORLD_TIMES_URI => json!({
            "utc": format_in(now, chrono_tz::UTC),
            "cities": world_times(now),
        }),
        TOOL_METRICS_URI => serde_json::to_value(metrics.report()).map_err(encode_error)?,
        _ => {
            return Err(McpErrorResponse::new(
                McpErrorCode::UnknownResource,
                format!("Unknown resource: {uri}"),
            ))
        }
    };

    let text = serde_json::to_string(&body).map_err(encode_error)?;

    Ok(ResourceContent {
        uri: uri.to_string(),
        mime_type: JSON_MIME.to_string(),
        text,
    })
}

fn encode_error(e: serde_json::Error) -> McpErrorResponse {
    McpErrorResponse::new(
        McpErrorCode::InternalError,
        format!("Cannot encode resource: {e}"),
    )
}

fn zone_info(now: DateTime<Utc>) -> Vec<ZoneInfo> {
    WELL_KNOWN_ZONES
        .iter()
        .filter_map(|&(id, name)| {
            let zone = parse_timezone(id).ok()?;
            Some(ZoneInfo {
                id,
                name,
                offset: offset_at(now, zone),
            })
        })
        .collect()
}

fn world_times(now: DateTime<Utc>) -> Vec<CityTime> {
    WORLD_CITIES
        .iter()
        .filter_map(|&(city, id)| {
            let zone = parse_timezone(id).ok()?;
            Some(CityTime {
                city,
                timezone: id,
                time: format_in(now, zone),
            })
        })
        .collect()
}
