// LogTrail - core/datetime.rs
//
// Timestamp parsing for the DateTime capture group.
//
// A fixed, ordered table of locale-invariant formats is tried in turn; the
// first that parses wins. Timestamps without an offset are taken as UTC.
// Parsing never fails outward: an unparseable value yields the caller's
// fallback (normally "now") and a warning.

use crate::util::logging::preview;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// One accepted timestamp format.
struct DateFormat {
    name: &'static str,
    parse: fn(&str) -> Option<DateTime<Utc>>,
}

/// Accepted formats, in priority order.
const FORMATS: &[DateFormat] = &[
    DateFormat {
        name: "short-date",
        parse: parse_short_date,
    },
    DateFormat {
        name: "comma-millis",
        parse: parse_comma_millis,
    },
    DateFormat {
        name: "round-trip",
        parse: parse_round_trip,
    },
    DateFormat {
        name: "nlog-longdate",
        parse: parse_nlog_longdate,
    },
];

/// 01/02/2024 (invariant short date, midnight)
fn parse_short_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%m/%d/%Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// 2024-01-02 03:04:05,678 (log4net / log4j)
fn parse_comma_millis(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S,%3f")
        .ok()
        .map(|ndt| ndt.and_utc())
}

/// 2024-01-02T03:04:05.6789012+01:00, offset optional
fn parse_round_trip(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

/// 2024-01-02 03:04:05.6789 (NLog ${longdate})
fn parse_nlog_longdate(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|ndt| ndt.and_utc())
}

/// Try every accepted format against `raw` (trimmed).
pub fn try_parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    FORMATS.iter().find_map(|f| {
        let parsed = (f.parse)(trimmed);
        if parsed.is_some() {
            tracing::trace!(format = f.name, value = trimmed, "Timestamp parsed");
        }
        parsed
    })
}

/// Parse `raw`, returning `fallback` when it is blank or matches no format.
pub fn parse_date_time(raw: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    if raw.trim().is_empty() {
        return fallback;
    }
    match try_parse_date_time(raw) {
        Some(dt) => dt,
        None => {
            tracing::warn!(
                value = %preview(raw),
                "Unrecognised timestamp, using fallback"
            );
            fallback
        }
    }
}
