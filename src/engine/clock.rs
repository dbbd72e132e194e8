//! Wall-clock helpers. Timestamps are ISO-8601 UTC strings with millisecond precision
//! (`2024-05-01T12:00:00.000Z`), which is the format persisted in snapshots and profiles.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

/// Current time as an ISO-8601 UTC timestamp.
pub fn now_iso() -> String {
    format_iso(OffsetDateTime::now_utc())
}

/// Current time in unix milliseconds.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn format_iso(at: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    at.to_offset(time::UtcOffset::UTC)
        .format(&fmt)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Parses an RFC 3339 timestamp into unix seconds.
pub fn parse_unix_seconds(s: &str) -> Option<i64> {
    OffsetDateTime::parse(s.trim(), &Rfc3339)
        .ok()
        .map(|dt| dt.unix_timestamp())
}
