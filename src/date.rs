use crate::error::ConfigError;
use std::fmt;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

/// Inclusive `[start, end]` range of UTC epoch seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    pub start: i64,
    pub end: i64,
}

impl DateWindow {
    pub fn new(start: i64, end: i64) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvertedWindow {
                start: format_seconds(start),
                end: format_seconds(end),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse both bounds. A date-only `end` covers the whole day (23:59:59).
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        let s = parse_bound(start, false)?;
        let e = parse_bound(end, true)?;
        Self::new(s, e)
    }

    /// Accepts the instant iff `start <= ts <= end`.
    #[inline]
    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts <= self.end
    }
}

impl Default for DateWindow {
    fn default() -> Self {
        // 2021-01-01 00:00:00 ..= 2024-12-31 23:59:59 UTC
        Self { start: 1_609_459_200, end: 1_735_689_599 }
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} ..= {}]", format_seconds(self.start), format_seconds(self.end))
    }
}

/// Parse `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` (UTC) into epoch seconds.
pub fn parse_bound(s: &str, end_of_day: bool) -> Result<i64, ConfigError> {
    let s = s.trim();
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: "date".into(),
        reason: format!("{s:?}: {reason}"),
    };

    if let Ok(dt) = PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")) {
        return Ok(dt.assume_utc().unix_timestamp());
    }
    let date = Date::parse(s, format_description!("[year]-[month]-[day]"))
        .map_err(|_| invalid("expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS"))?;
    let time = if end_of_day {
        Time::from_hms(23, 59, 59).map_err(|e| invalid(&e.to_string()))?
    } else {
        Time::MIDNIGHT
    };
    Ok(PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp())
}

/// `YYYY-MM-DD HH:MM` in UTC, the format of the `created` output column.
/// Returns `None` when the timestamp is outside the representable range.
pub fn format_created(ts: i64) -> Option<String> {
    let dt = OffsetDateTime::from_unix_timestamp(ts).ok()?;
    dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]")).ok()
}

/// `YYYY-MM-DD HH:MM:SS` in UTC, used in progress and log lines.
pub fn format_seconds(ts: i64) -> String {
    OffsetDateTime::from_unix_timestamp(ts)
        .ok()
        .and_then(|dt| dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")).ok())
        .unwrap_or_else(|| ts.to_string())
}
