//! Time parsing and canonical UTC formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ChipError, ChipResult};

/// Canonical timestamp format used for every comparison and query string.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Marker for an open end in an interval.
const OPEN_END: &str = "..";

/// Format a timestamp in the canonical UTC form.
pub fn canonical_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(CANONICAL_FORMAT).to_string()
}

/// Parse an ISO 8601 instant, normalizing it to UTC.
///
/// Accepts RFC 3339 with any offset, a naive date-time (assumed UTC), or a
/// bare date (midnight UTC).
pub fn parse_instant(s: &str) -> ChipResult<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(ChipError::InvalidTime(s.to_string()))
}

/// A closed time interval with optionally open ends.
///
/// A single instant is represented with `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeInterval {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn instant(dt: DateTime<Utc>) -> Self {
        Self::new(Some(dt), Some(dt))
    }

    /// Parse `"instant"` or `"from/to"`, where either side may be `..` (or
    /// empty) for an open end.
    pub fn parse(s: &str) -> ChipResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ChipError::InvalidTime("empty datetime".to_string()));
        }

        let Some((from, to)) = s.split_once('/') else {
            return Ok(Self::instant(parse_instant(s)?));
        };

        let start = parse_open_end(from)?;
        let end = parse_open_end(to)?;

        if start.is_none() && end.is_none() {
            return Err(ChipError::InvalidTime(format!(
                "{}: interval must have at least one bound",
                s
            )));
        }
        if let (Some(a), Some(b)) = (start, end) {
            if a > b {
                return Err(ChipError::InvalidTime(format!("{}: start after end", s)));
            }
        }

        Ok(Self::new(start, end))
    }

    /// Whether `dt` lies within the interval (inclusive on both ends).
    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *dt >= s) && self.end.map_or(true, |e| *dt <= e)
    }
}

fn parse_open_end(s: &str) -> ChipResult<Option<DateTime<Utc>>> {
    let s = s.trim();
    if s.is_empty() || s == OPEN_END {
        Ok(None)
    } else {
        parse_instant(s).map(Some)
    }
}

impl fmt::Display for TimeInterval {
    /// Canonical query form, e.g. `2020-01-01T00:00:00Z/..`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |v: &Option<DateTime<Utc>>| {
            v.as_ref()
                .map(canonical_timestamp)
                .unwrap_or_else(|| OPEN_END.to_string())
        };

        if self.start.is_some() && self.start == self.end {
            write!(f, "{}", side(&self.start))
        } else {
            write!(f, "{}/{}", side(&self.start), side(&self.end))
        }
    }
}
