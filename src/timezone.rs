//! Timezone lookup, timestamp parsing and formatting.
//!
//! All instants are carried as `DateTime<Utc>` and only rendered into a zone
//! at the edge. Output is RFC 3339 with whole seconds and a numeric offset.

use chrono::{DateTime, Datelike, LocalResult, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

use crate::protocol::{McpErrorCode, McpErrorResponse};

/// Naive layouts accepted by [`parse_time_in`], tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
    #[error("cannot parse time '{0}': expected RFC 3339 or YYYY-MM-DD HH:MM[:SS]")]
    InvalidTime(String),
    #[error("local time {time} does not exist in {timezone}")]
    NonexistentLocalTime { time: String, timezone: String },
    #[error("time {time} cannot be expressed as RFC 3339 in {timezone}")]
    Unrepresentable { time: String, timezone: String },
}

impl From<TimeError> for McpErrorResponse {
    fn from(err: TimeError) -> Self {
        let code = match &err {
            TimeError::UnknownTimezone(_) => McpErrorCode::InvalidTimezone,
            TimeError::InvalidTime(_)
            | TimeError::NonexistentLocalTime { .. }
            | TimeError::Unrepresentable { .. } => McpErrorCode::InvalidTime,
        };
        McpErrorResponse::new(code, err.to_string())
    }
}

/// Resolve an IANA zone name. Empty input, `UTC` (any case) and `Z` are UTC.
pub fn parse_timezone(name: &str) -> Result<Tz, TimeError> {
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("utc") || name == "Z" {
        return Ok(chrono_tz::UTC);
    }

    name.parse::<Tz>()
        .map_err(|_| TimeError::UnknownTimezone(name.to_string()))
}

/// Parse `input` as an instant.
///
/// RFC 3339 input carries its own offset and `source` is ignored. Naive input
/// is read as wall-clock time in `source`; a repeated hour resolves to the
/// earlier instant and a skipped hour is an error.
pub fn parse_time_in(input: &str, source: Tz) -> Result<DateTime<Utc>, TimeError> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .ok_or_else(|| TimeError::InvalidTime(input.to_string()))?;

    match source.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(TimeError::NonexistentLocalTime {
            time: input.to_string(),
            timezone: source.name().to_string(),
        }),
    }
}

/// Render `instant` as RFC 3339 in `zone`.
pub fn format_in(instant: DateTime<Utc>, zone: Tz) -> String {
    instant
        .with_timezone(&zone)
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Current UTC offset of `zone` at `instant`, e.g. `+05:30`.
pub fn offset_at(instant: DateTime<Utc>, zone: Tz) -> String {
    instant.with_timezone(&zone).format("%:z").to_string()
}

/// Convert `time` from `source` into `target`, returning RFC 3339 text.
///
/// Results outside years 0000-9999, or at an offset with a seconds part
/// (pre-standard local mean time), are rejected rather than rendered lossily.
pub fn convert(time: &str, source: &str, target: &str) -> Result<String, TimeError> {
    let source = parse_timezone(source)?;
    let target = parse_timezone(target)?;
    let instant = parse_time_in(time, source)?;

    let local = instant.with_timezone(&target);
    let whole_minutes = local.offset().fix().local_minus_utc() % 60 == 0;
    if !(0..=9999).contains(&local.year()) || !whole_minutes {
        return Err(TimeError::Unrepresentable {
            time: time.trim().to_string(),
            timezone: target.name().to_string(),
        });
    }

    Ok(format_in(instant, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_aliases() {
        assert_eq!(parse_timezone("").unwrap(), chrono_tz::UTC);
        assert_eq!(parse_timezone("utc").unwrap(), chrono_tz::UTC);
        assert_eq!(parse_timezone(" Z ").unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn unknown_zone() {
        assert_eq!(
            parse_timezone("Mars/Olympus_Mons"),
            Err(TimeError::UnknownTimezone("Mars/Olympus_Mons".into()))
        );
    }

    #[test]
    fn naive_time_in_source_zone() {
        let out = convert("2025-01-15T09:00:00", "America/New_York", "Europe/London").unwrap();
        assert_eq!(out, "2025-01-15T14:00:00+00:00");
    }

    #[test]
    fn rfc3339_offset_wins_over_source() {
        let out = convert("2025-07-01T12:00:00Z", "Asia/Tokyo", "America/Los_Angeles").unwrap();
        assert_eq!(out, "2025-07-01T05:00:00-07:00");
    }

    #[test]
    fn space_separated_without_seconds() {
        let out = convert("2025-03-01 08:30", "UTC", "Asia/Kolkata").unwrap();
        assert_eq!(out, "2025-03-01T14:00:00+05:30");
    }

    #[test]
    fn ambiguous_local_time_takes_earlier_instant() {
        // 01:30 happens twice in New York on 2025-11-02; first at EDT.
        let out = convert("2025-11-02T01:30:00", "America/New_York", "UTC").unwrap();
        assert_eq!(out, "2025-11-02T05:30:00+00:00");
    }

    #[test]
    fn skipped_local_time_is_error() {
        let err = convert("2025-03-09T02:30:00", "America/New_York", "UTC").unwrap_err();
        assert!(matches!(err, TimeError::NonexistentLocalTime { .. }));
    }

    #[test]
    fn garbage_time() {
        let err = convert("next tuesday", "UTC", "UTC").unwrap_err();
        assert_eq!(err, TimeError::InvalidTime("next tuesday".into()));
    }

    #[test]
    fn result_past_year_9999_is_rejected() {
        let err = convert("9999-12-31T23:00:00Z", "UTC", "Asia/Tokyo").unwrap_err();
        assert!(matches!(err, TimeError::Unrepresentable { .. }));
        let code = McpErrorResponse::from(err).error.code;
        assert_eq!(code, McpErrorCode::InvalidTime);
    }

    #[test]
    fn local_mean_time_offset_is_rejected() {
        // Los Angeles ran on LMT (-07:52:58) before 1883.
        let err = convert("0000-01-01T00:00:00", "UTC", "America/Los_Angeles").unwrap_err();
        assert!(matches!(err, TimeError::Unrepresentable { .. }));
    }

    #[test]
    fn last_representable_second() {
        let out = convert("9999-12-31T23:59:59Z", "Asia/Tokyo", "UTC").unwrap();
        assert_eq!(out, "9999-12-31T23:59:59+00:00");
    }

    #[test]
    fn offset_formatting() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(offset_at(instant, parse_timezone("Asia/Kolkata").unwrap()), "+05:30");
        assert_eq!(offset_at(instant, chrono_tz::UTC), "+00:00");
    }
}
