// SPDX-FileCopyrightText: (C) 2024 Jason Ish <jason@codemonkey.net>
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::precision::Precision;
use crate::prelude::*;

lazy_static! {
    // Requires at least a year, everything else is optional.
    static ref PARTIAL_TIMESTAMP: regex::Regex = regex::Regex::new(
        r"^(\d{4})-?(\d{2})?-?(\d{2})?[T ]?(\d{2})?:?(\d{2})?:?(\d{2})?(\.(\d+))?(([+\-]\d{2}:?\d{2})|Z)?$"
    )
    .unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "invalid timestamp: {}", self.0)
    }
}

/// A symbolic, now-relative date span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelativeRange {
    #[serde(rename = "hour")]
    Hour,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "7days")]
    SevenDays,
    #[serde(rename = "30days")]
    ThirtyDays,
    #[serde(rename = "90days")]
    NinetyDays,
    #[serde(rename = "custom")]
    Custom,
}

impl RelativeRange {
    pub const ALL: [RelativeRange; 6] = [
        RelativeRange::Hour,
        RelativeRange::Day,
        RelativeRange::SevenDays,
        RelativeRange::ThirtyDays,
        RelativeRange::NinetyDays,
        RelativeRange::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::SevenDays => "7days",
            Self::ThirtyDays => "30days",
            Self::NinetyDays => "90days",
            Self::Custom => "custom",
        }
    }

    /// The length of the range, None for custom.
    pub fn span(&self) -> Option<Duration> {
        match self {
            Self::Hour => Some(Duration::hours(1)),
            Self::Day => Some(Duration::days(1)),
            Self::SevenDays => Some(Duration::days(7)),
            Self::ThirtyDays => Some(Duration::days(30)),
            Self::NinetyDays => Some(Duration::days(90)),
            Self::Custom => None,
        }
    }
}

impl std::str::FromStr for RelativeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|r| r.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown relative range: {s}"))
    }
}

impl std::fmt::Display for RelativeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete, closed time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Build a range from two instants in either order.
    pub fn ordered(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        if b < a {
            Self { from: b, to: a }
        } else {
            Self { from: a, to: b }
        }
    }

    pub fn span(&self) -> Duration {
        self.to - self.from
    }
}

/// Resolve a relative range token into a concrete range ending at `now`.
///
/// Anything that isn't a known span, including "custom", resolves as
/// "day".
pub fn resolve(token: &str, now: DateTime<Utc>) -> DateRange {
    let span = match token.parse::<RelativeRange>().ok().and_then(|r| r.span()) {
        Some(span) => span,
        None => {
            debug!("Resolving unknown relative range {:?} as day", token);
            Duration::days(1)
        }
    };
    DateRange::new(now - span, now)
}

/// Like `resolve`, but with the boundaries pushed out to whole buckets of
/// the given precision.
pub fn resolve_rounded(token: &str, now: DateTime<Utc>, precision: Precision) -> DateRange {
    let range = resolve(token, now);
    crate::precision::round_boundaries(range.from, range.to, precision)
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// The last millisecond of the day.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::milliseconds(1)
}

pub fn to_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a user or URL supplied timestamp. A default timezone offset is
/// used when the timestamp doesn't carry one.
pub fn parse(input: &str, tz_offset: Option<&str>) -> Result<DateTime<Utc>, ParseError> {
    // First attempt to parse it as is.
    if let Ok(ts) = input.parse::<DateTime<chrono::FixedOffset>>() {
        return Ok(ts.with_timezone(&Utc));
    }

    let default_tz = tz_offset.unwrap_or("Z");

    if let Some(c) = PARTIAL_TIMESTAMP.captures(input) {
        let year = c.get(1).map_or("", |m| m.as_str());
        let month = c.get(2).map_or("01", |m| m.as_str());
        let day = c.get(3).map_or("01", |m| m.as_str());
        let hour = c.get(4).map_or("00", |m| m.as_str());
        let minute = c.get(5).map_or("00", |m| m.as_str());
        let second = c.get(6).map_or("00", |m| m.as_str());
        let subs = c.get(8).map_or("0", |m| m.as_str());
        let offset = c.get(9).map_or(default_tz, |m| m.as_str());

        let fixed = format!("{year}-{month}-{day}T{hour}:{minute}:{second}.{subs}{offset}");

        // Try again.
        if let Ok(ts) = fixed.parse::<DateTime<chrono::FixedOffset>>() {
            return Ok(ts.with_timezone(&Utc));
        }
    }

    Err(ParseError(input.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse() {
        let ts = parse("2024-05-16T16:08:17.876423-0600", None).unwrap();
        assert_eq!(to_rfc3339(&ts), "2024-05-16T22:08:17.876Z");

        let ts0 = parse("2024-05-16T16:08:17.876423-0600", None).unwrap();
        let ts1 = parse("20240516T160817.876423-0600", None).unwrap();
        assert_eq!(ts0, ts1);

        assert_eq!(
            to_rfc3339(&parse("2024", None).unwrap()),
            "2024-01-01T00:00:00.000Z"
        );
        assert_eq!(
            to_rfc3339(&parse("2024-05-16", None).unwrap()),
            "2024-05-16T00:00:00.000Z"
        );
        assert_eq!(
            to_rfc3339(&parse("2024-05-16T16:08", None).unwrap()),
            "2024-05-16T16:08:00.000Z"
        );
        assert_eq!(
            to_rfc3339(&parse("2024-05-16T09:48:44", Some("-0600")).unwrap()),
            "2024-05-16T15:48:44.000Z"
        );
        assert_eq!(
            to_rfc3339(&parse("2024-05-16T16:08:17Z", None).unwrap()),
            "2024-05-16T16:08:17.000Z"
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse("", None).is_err());
        assert!(parse("bogus", None).is_err());
        assert!(parse("2024-13-45", None).is_err());
        assert!(parse("yesterday", None).is_err());
    }

    #[test]
    fn test_resolve() {
        let now = utc("2024-05-16T12:00:00Z");
        let range = resolve("7days", now);
        assert_eq!(range.to, now);
        assert_eq!(range.from, utc("2024-05-09T12:00:00Z"));

        assert_eq!(resolve("hour", now).from, utc("2024-05-16T11:00:00Z"));
        assert_eq!(resolve("90days", now).span(), Duration::days(90));

        // Unknown tokens never produce an unbounded range.
        assert_eq!(resolve("bogus", now), resolve("day", now));
        assert_eq!(resolve("custom", now), resolve("day", now));
    }

    #[test]
    fn test_resolve_rounded() {
        let now = utc("2024-05-16T12:34:56Z");
        let range = resolve_rounded("day", now, Precision::Hour);
        assert_eq!(range.from, utc("2024-05-15T12:00:00Z"));
        assert_eq!(range.to, utc("2024-05-16T13:00:00Z"));
    }

    #[test]
    fn test_day_boundaries() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(to_rfc3339(&start_of_day(date)), "2024-02-29T00:00:00.000Z");
        assert_eq!(to_rfc3339(&end_of_day(date)), "2024-02-29T23:59:59.999Z");
    }

    #[test]
    fn test_ordered() {
        let a = utc("2024-05-16T00:00:00Z");
        let b = utc("2024-05-10T00:00:00Z");
        let range = DateRange::ordered(a, b);
        assert_eq!(range.from, b);
        assert_eq!(range.to, a);
    }

    #[test]
    fn test_relative_range_from_str() {
        assert_eq!("7days".parse::<RelativeRange>(), Ok(RelativeRange::SevenDays));
        assert!("8days".parse::<RelativeRange>().is_err());
        assert_eq!(RelativeRange::NinetyDays.to_string(), "90days");
    }
}
