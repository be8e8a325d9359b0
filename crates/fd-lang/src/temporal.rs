//! Text and epoch conversions behind `time()`, `date()` and `datetime()`.
//!
//! All values are milliseconds: since midnight for [`TemporalKind::Time`],
//! since the Unix epoch otherwise. Zone-less inputs are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::ast::TemporalKind;

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse `text` as the given kind. Returns `None` when no accepted format
/// matches.
pub fn parse_temporal(kind: TemporalKind, text: &str) -> Option<i64> {
    let text = text.trim();
    match kind {
        TemporalKind::Time => parse_time_of_day(text)
            .or_else(|| parse_datetime(text).map(|dt| time_of_day_millis(&dt.time()))),
        TemporalKind::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
            .ok()
            .or_else(|| parse_datetime(text).map(|dt| dt.date()))
            .and_then(date_millis),
        TemporalKind::DateTime => parse_datetime(text)
            .map(|dt| dt.and_utc().timestamp_millis())
            .or_else(|| {
                NaiveDate::parse_from_str(text, DATE_FORMAT)
                    .ok()
                    .and_then(date_millis)
            }),
    }
}

/// Interpret an epoch-millisecond number as the given kind.
pub fn from_epoch_millis(kind: TemporalKind, millis: i64) -> Option<i64> {
    let dt = DateTime::from_timestamp_millis(millis)?;
    match kind {
        TemporalKind::Time => Some(time_of_day_millis(&dt.time())),
        TemporalKind::Date => date_millis(dt.date_naive()),
        TemporalKind::DateTime => Some(millis),
    }
}

fn parse_time_of_day(text: &str) -> Option<i64> {
    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(text, f).ok())
        .map(|t| time_of_day_millis(&t))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
}

fn time_of_day_millis(t: &NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight()) * 1000 + i64::from(t.nanosecond() / 1_000_000)
}

fn date_millis(d: NaiveDate) -> Option<i64> {
    Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}
