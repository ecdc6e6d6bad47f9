// SPDX-FileCopyrightText: (C) 2024 Jason Ish <jason@codemonkey.net>
// SPDX-License-Identifier: MIT

//! Rollup precision selection.
//!
//! Each precision is only offered for spans where it produces a useful
//! number of buckets. When a caller doesn't ask for a precision, or asks
//! for one that doesn't suit the span, the finest precision that keeps
//! the bucket count under `MAX_RECOMMENDED_BUCKETS` is picked.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::start_of_day;
use crate::prelude::*;

/// Upper bound on the number of data points a recommended precision may
/// produce.
pub const MAX_RECOMMENDED_BUCKETS: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Precision {
    #[serde(rename = "minute")]
    Minute,
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "hour")]
    Hour,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "month")]
    Month,
}

struct Rule {
    precision: Precision,
    min_span: Duration,
    max_span: Option<Duration>,
}

// Ordered from finest to coarsest.
fn rules() -> [Rule; 7] {
    [
        Rule {
            precision: Precision::Minute,
            min_span: Duration::zero(),
            max_span: Some(Duration::days(1)),
        },
        Rule {
            precision: Precision::FiveMinutes,
            min_span: Duration::zero(),
            max_span: Some(Duration::days(2)),
        },
        Rule {
            precision: Precision::FifteenMinutes,
            min_span: Duration::zero(),
            max_span: Some(Duration::days(7)),
        },
        Rule {
            precision: Precision::Hour,
            min_span: Duration::zero(),
            max_span: Some(Duration::days(31)),
        },
        Rule {
            precision: Precision::Day,
            min_span: Duration::days(1),
            max_span: None,
        },
        Rule {
            precision: Precision::Week,
            min_span: Duration::days(7),
            max_span: None,
        },
        Rule {
            precision: Precision::Month,
            min_span: Duration::days(90),
            max_span: None,
        },
    ]
}

impl Precision {
    pub const ALL: [Precision; 7] = [
        Precision::Minute,
        Precision::FiveMinutes,
        Precision::FifteenMinutes,
        Precision::Hour,
        Precision::Day,
        Precision::Week,
        Precision::Month,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::FiveMinutes => "5min",
            Self::FifteenMinutes => "15min",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Nominal bucket length. Months are counted as 30 days.
    pub fn bucket(&self) -> Duration {
        match self {
            Self::Minute => Duration::minutes(1),
            Self::FiveMinutes => Duration::minutes(5),
            Self::FifteenMinutes => Duration::minutes(15),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }

    /// Day and coarser rollups are computed by the API in UTC only, so
    /// timezone selection has to be disabled while one is active.
    pub fn is_forced_utc(&self) -> bool {
        matches!(self, Self::Day | Self::Week | Self::Month)
    }

    pub fn is_valid_for(&self, span: Duration) -> bool {
        rules()
            .iter()
            .find(|rule| rule.precision == *self)
            .map(|rule| {
                span >= rule.min_span && rule.max_span.map_or(true, |max| span <= max)
            })
            .unwrap_or(false)
    }

    fn bucket_count(&self, span: Duration) -> i64 {
        let bucket = self.bucket().num_seconds();
        let span = span.num_seconds();
        (span + bucket - 1) / bucket
    }
}

impl std::str::FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown precision: {s}"))
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn is_forced_utc(precision: Precision) -> bool {
    precision.is_forced_utc()
}

fn span_of(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    let span = to - from;
    if span < Duration::zero() {
        Duration::zero()
    } else {
        span
    }
}

/// Precisions that may be used for the given range, finest first.
pub fn valid_precisions(from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Precision> {
    let span = span_of(from, to);
    Precision::ALL
        .iter()
        .filter(|p| p.is_valid_for(span))
        .copied()
        .collect()
}

/// Pick a precision for the given range, honoring `requested` when it is
/// valid for the span.
pub fn recommend(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    requested: Option<Precision>,
) -> Precision {
    let span = span_of(from, to);
    if let Some(requested) = requested {
        if requested.is_valid_for(span) {
            return requested;
        }
        debug!(
            "Precision {} not valid for a span of {}s",
            requested,
            span.num_seconds()
        );
    }

    let valid = valid_precisions(from, to);
    if let Some(p) = valid
        .iter()
        .find(|p| p.bucket_count(span) <= MAX_RECOMMENDED_BUCKETS)
    {
        return *p;
    }

    // Nothing fits under the bound, use the coarsest we can.
    valid.last().copied().unwrap_or(Precision::Day)
}

/// Round `from` down and `to` up to whole buckets of `precision`.
pub fn round_boundaries(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    precision: Precision,
) -> crate::datetime::DateRange {
    crate::datetime::DateRange::new(floor(from, precision), ceil(to, precision))
}

fn floor(dt: DateTime<Utc>, precision: Precision) -> DateTime<Utc> {
    let date = dt.date_naive();
    match precision {
        Precision::Minute | Precision::FiveMinutes | Precision::FifteenMinutes | Precision::Hour => {
            let bucket = precision.bucket().num_seconds();
            let ts = dt.timestamp().div_euclid(bucket) * bucket;
            DateTime::from_timestamp(ts, 0).unwrap_or(dt)
        }
        Precision::Day => start_of_day(date),
        Precision::Week => {
            let monday =
                date - Duration::days(date.weekday().num_days_from_monday() as i64);
            start_of_day(monday)
        }
        Precision::Month => start_of_day(date.with_day(1).unwrap_or(date)),
    }
}

fn ceil(dt: DateTime<Utc>, precision: Precision) -> DateTime<Utc> {
    let floor = floor(dt, precision);
    if floor == dt {
        return dt;
    }
    match precision {
        Precision::Month => {
            let date = floor.date_naive();
            let next = if date.month() == 12 {
                NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
            };
            next.map(start_of_day)
                .unwrap_or_else(|| floor + precision.bucket())
        }
        _ => floor + precision.bucket(),
    }
}
