//! Resolution and datetime filters applied to resolved items.

use chrono::{DateTime, Utc};
use chip_common::TimeInterval;

use crate::error::{CatalogError, Result};

/// Two resolutions closer than this are equal.
const RESOLUTION_EPSILON: f64 = 1e-9;

/// Native resolution filter.
///
/// Grammar: `"2"` exact, `"1:2"` inclusive range, `"2:"` at least,
/// `":1"` at most.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolutionFilter {
    Exact(f64),
    Range { min: Option<f64>, max: Option<f64> },
}

impl ResolutionFilter {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = |message: &str| CatalogError::invalid_filter("resolution", s, message);

        let Some((min, max)) = s.split_once(':') else {
            return parse_bound(s)
                .ok_or_else(|| invalid("expected a number"))
                .map(Self::Exact);
        };

        let min = parse_optional_bound(min).ok_or_else(|| invalid("bad minimum"))?;
        let max = parse_optional_bound(max).ok_or_else(|| invalid("bad maximum"))?;

        match (min, max) {
            (None, None) => Err(invalid("range needs at least one bound")),
            (Some(lo), Some(hi)) if lo > hi => Err(invalid("minimum exceeds maximum")),
            _ => Ok(Self::Range { min, max }),
        }
    }

    pub fn matches(&self, resolution: f64) -> bool {
        match *self {
            Self::Exact(r) => (resolution - r).abs() <= RESOLUTION_EPSILON,
            Self::Range { min, max } => {
                min.map_or(true, |lo| resolution >= lo - RESOLUTION_EPSILON)
                    && max.map_or(true, |hi| resolution <= hi + RESOLUTION_EPSILON)
            }
        }
    }
}

fn parse_bound(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// `Some(None)` for an empty side, `None` for garbage.
fn parse_optional_bound(s: &str) -> Option<Option<f64>> {
    if s.trim().is_empty() {
        Some(None)
    } else {
        parse_bound(s).map(Some)
    }
}

/// Acquisition datetime filter: an instant or a `from/to` interval with
/// `..` for an open end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatetimeFilter {
    interval: TimeInterval,
}

impl DatetimeFilter {
    pub fn parse(s: &str) -> Result<Self> {
        TimeInterval::parse(s)
            .map(|interval| Self { interval })
            .map_err(|e| CatalogError::invalid_filter("datetime", s.trim(), e.to_string()))
    }

    pub fn interval(&self) -> &TimeInterval {
        &self.interval
    }

    /// Canonical UTC form sent to the catalog.
    pub fn to_query(&self) -> String {
        self.interval.to_string()
    }

    /// Undated items never match.
    pub fn matches(&self, datetime: Option<&DateTime<Utc>>) -> bool {
        datetime.map_or(false, |dt| self.interval.contains(dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chip_common::parse_instant;

    #[test]
    fn test_exact() {
        let f = ResolutionFilter::parse("2").unwrap();
        assert_eq!(f, ResolutionFilter::Exact(2.0));
        assert!(f.matches(2.0));
        assert!(!f.matches(1.0));
        assert!(!f.matches(2.5));
    }

    #[test]
    fn test_inclusive_range() {
        let f = ResolutionFilter::parse("1:2").unwrap();
        assert!(f.matches(1.0));
        assert!(f.matches(1.5));
        assert!(f.matches(2.0));
        assert!(!f.matches(0.6));
        assert!(!f.matches(2.1));
    }

    #[test]
    fn test_open_ranges() {
        let at_least = ResolutionFilter::parse("2:").unwrap();
        assert!(at_least.matches(2.0));
        assert!(at_least.matches(30.0));
        assert!(!at_least.matches(1.0));

        let at_most = ResolutionFilter::parse(":1").unwrap();
        assert!(at_most.matches(0.6));
        assert!(at_most.matches(1.0));
        assert!(!at_most.matches(2.0));
    }

    #[test]
    fn test_invalid_resolution_filters() {
        for bad in ["", "abc", ":", "2:1", "1:x", "-1", "1:2:3"] {
            let err = ResolutionFilter::parse(bad).unwrap_err();
            assert!(
                matches!(err, CatalogError::InvalidFilterSyntax { kind: "resolution", .. }),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_datetime_instant_normalized() {
        let f = DatetimeFilter::parse("2021-05-01").unwrap();
        assert_eq!(f.to_query(), "2021-05-01T00:00:00Z");

        let f = DatetimeFilter::parse("2021-05-01T02:00:00+02:00").unwrap();
        assert_eq!(f.to_query(), "2021-05-01T00:00:00Z");
    }

    #[test]
    fn test_datetime_interval() {
        let f = DatetimeFilter::parse("2020-01-01/..").unwrap();
        assert_eq!(f.to_query(), "2020-01-01T00:00:00Z/..");

        let inside = parse_instant("2021-01-01T00:00:00Z").unwrap();
        let before = parse_instant("2019-12-31T23:59:59Z").unwrap();
        assert!(f.matches(Some(&inside)));
        assert!(!f.matches(Some(&before)));
        assert!(!f.matches(None));
    }

    #[test]
    fn test_invalid_datetime() {
        for bad in ["yesterday", "../..", "2021-02-01/2021-01-01"] {
            assert!(matches!(
                DatetimeFilter::parse(bad),
                Err(CatalogError::InvalidFilterSyntax { kind: "datetime", .. })
            ));
        }
    }
}
