// SPDX-FileCopyrightText: (C) 2024 Jason Ish <jason@codemonkey.net>
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::{self, DateRange, RelativeRange};
use crate::filters::{self, Comparator, Comparison, FilterGroup};
use crate::precision::{self, Precision};
use crate::prelude::*;
use crate::querystring;
use crate::search::{IndustryBenchmarkFilters, SearchOptions};

/// Format of the from and to parameters expected by the reporting API.
const API_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Values used when neither the current options nor an update provide
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub range: RelativeRange,
    pub timezone: String,
    pub precision: Option<Precision>,
    pub metrics: Vec<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            range: RelativeRange::SevenDays,
            timezone: "UTC".to_string(),
            precision: None,
            metrics: vec![],
        }
    }
}

/// Complete and reconciled report options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub relative_range: RelativeRange,
    pub precision: Precision,
    pub timezone: String,
    pub filters: Vec<FilterGroup>,
    pub comparisons: Vec<Comparison>,
    pub metrics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_benchmark_metric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_benchmark_filters: Option<IndustryBenchmarkFilters>,
}

/// Merge `update` over `current` and reconcile the result: dates are
/// derived for relative ranges, custom dates are ordered and the
/// precision is made valid for the span.
pub fn refresh_report_options(
    current: Option<&ReportOptions>,
    update: SearchOptions,
    now: DateTime<Utc>,
    defaults: &Defaults,
) -> ReportOptions {
    // Explicit dates without a range are a custom range.
    let relative_range = match update.relative_range {
        Some(range) => range,
        None if update.from.is_some() || update.to.is_some() => RelativeRange::Custom,
        None => current.map(|c| c.relative_range).unwrap_or(defaults.range),
    };

    let range = if relative_range == RelativeRange::Custom {
        let from = update.from.or(current.map(|c| c.from));
        let to = update.to.or(current.map(|c| c.to));
        match (from, to) {
            (Some(from), Some(to)) => DateRange::ordered(from, to),
            (Some(from), None) => DateRange::ordered(from, now),
            (None, Some(to)) => DateRange::new(to - Duration::days(1), to),
            (None, None) => datetime::resolve(RelativeRange::Day.as_str(), now),
        }
    } else {
        datetime::resolve(relative_range.as_str(), now)
    };

    let requested = update
        .precision
        .or(current.map(|c| c.precision))
        .or(defaults.precision);
    let precision = precision::recommend(range.from, range.to, requested);

    let options = ReportOptions {
        from: range.from,
        to: range.to,
        relative_range,
        precision,
        timezone: update
            .timezone
            .or(current.map(|c| c.timezone.clone()))
            .unwrap_or_else(|| defaults.timezone.clone()),
        filters: update
            .filters
            .or(current.map(|c| c.filters.clone()))
            .unwrap_or_default(),
        comparisons: update
            .comparisons
            .or(current.map(|c| c.comparisons.clone()))
            .unwrap_or_default(),
        metrics: update
            .metrics
            .or(current.map(|c| c.metrics.clone()))
            .unwrap_or_else(|| defaults.metrics.clone()),
        industry_benchmark_metric: update
            .industry_benchmark_metric
            .or(current.and_then(|c| c.industry_benchmark_metric.clone())),
        industry_benchmark_filters: update
            .industry_benchmark_filters
            .or(current.and_then(|c| c.industry_benchmark_filters.clone())),
    };
    debug!(
        "Refreshed report options: range={}, from={}, to={}, precision={}",
        options.relative_range,
        datetime::to_rfc3339(&options.from),
        datetime::to_rfc3339(&options.to),
        options.precision
    );
    options
}

/// Parameters for a reporting API request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiParams {
    pub from: String,
    pub to: String,
    pub precision: String,
    pub timezone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub metrics: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_filters: Option<String>,
}

impl ApiParams {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("from".to_string(), self.from.clone()),
            ("to".to_string(), self.to.clone()),
            ("precision".to_string(), self.precision.clone()),
            ("timezone".to_string(), self.timezone.clone()),
        ];
        if !self.metrics.is_empty() {
            pairs.push(("metrics".to_string(), self.metrics.clone()));
        }
        if let Some(query_filters) = &self.query_filters {
            pairs.push(("query_filters".to_string(), query_filters.clone()));
        }
        pairs
    }
}

/// A request descriptor for the HTTP layer. Nothing here sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiRequest {
    pub url: String,
    pub method: String,
    pub params: ApiParams,
    pub headers: BTreeMap<String, String>,
}

impl ReportOptions {
    /// Serialize to a search string that `parse_search` reads back into
    /// the same options.
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<(String, String)> = vec![
            ("from".to_string(), datetime::to_rfc3339(&self.from)),
            ("to".to_string(), datetime::to_rfc3339(&self.to)),
            ("range".to_string(), self.relative_range.to_string()),
            ("precision".to_string(), self.precision.to_string()),
            ("timezone".to_string(), self.timezone.clone()),
        ];
        for metric in &self.metrics {
            pairs.push(("metrics".to_string(), metric.clone()));
        }
        // The filters are URI encoded once more on top of the query string
        // encoding, and decoded twice when parsed.
        if let Some(json) = self.filters_json() {
            pairs.push((
                "query_filters".to_string(),
                querystring::encode_component(&json),
            ));
        }
        for (i, comparison) in self.comparisons.iter().enumerate() {
            pairs.push((
                format!("comparisons[{i}][type]"),
                comparison.filter_type.clone(),
            ));
            pairs.push((format!("comparisons[{i}][value]"), comparison.value.clone()));
            if let Some(id) = &comparison.id {
                pairs.push((format!("comparisons[{i}][id]"), id.clone()));
            }
        }
        if let Some(metric) = &self.industry_benchmark_metric {
            pairs.push(("industryBenchmarkMetric".to_string(), metric.clone()));
        }
        if let Some(filters) = &self.industry_benchmark_filters {
            if let Ok(json) = serde_json::to_string(filters) {
                pairs.push(("industryBenchmarkFilters".to_string(), json));
            }
        }
        querystring::encode(&pairs)
    }

    fn filters_json(&self) -> Option<String> {
        if self.filters.is_empty() {
            return None;
        }
        match serde_json::to_string(&self.filters) {
            Ok(json) => Some(json),
            Err(err) => {
                error!("Failed to serialize filters: {}", err);
                None
            }
        }
    }

    /// Whether the timezone selection applies to these options.
    pub fn is_timezone_forced(&self) -> bool {
        self.precision.is_forced_utc()
    }

    /// Relative ranges are widened to whole buckets of the precision, so
    /// the first and last buckets aren't partial.
    pub fn api_params(&self) -> ApiParams {
        let range = match self.relative_range {
            RelativeRange::Custom => DateRange::new(self.from, self.to),
            range => datetime::resolve_rounded(range.as_str(), self.to, self.precision),
        };
        ApiParams {
            from: range.from.format(API_DATE_FORMAT).to_string(),
            to: range.to.format(API_DATE_FORMAT).to_string(),
            precision: self.precision.to_string(),
            timezone: if self.is_timezone_forced() {
                "UTC".to_string()
            } else {
                self.timezone.clone()
            },
            metrics: self.metrics.join(","),
            query_filters: self.filters_json(),
        }
    }

    pub fn request(&self, url: &str) -> ApiRequest {
        ApiRequest {
            url: url.to_string(),
            method: "GET".to_string(),
            params: self.api_params(),
            headers: BTreeMap::new(),
        }
    }

    /// One set of options per comparison, each narrowed to the compared
    /// entity. Without comparisons this is just a copy of the options.
    pub fn fan_out(&self) -> Vec<ReportOptions> {
        if self.comparisons.is_empty() {
            return vec![self.clone()];
        }
        self.comparisons
            .iter()
            .map(|comparison| self.for_comparison(comparison))
            .collect()
    }

    fn for_comparison(&self, comparison: &Comparison) -> ReportOptions {
        let mut options = self.clone();
        options.comparisons.clear();

        let key = match filters::filter_key(&comparison.filter_type) {
            Some(key) => key,
            None => {
                warn!(
                    "Comparison with unknown type not applied: {}",
                    comparison.filter_type
                );
                return options;
            }
        };
        let comparator = Comparator {
            eq: vec![comparison.clone()],
        };

        if options.filters.is_empty() {
            options.filters.push(FilterGroup::default());
        }
        for group in options.filters.iter_mut() {
            group.and.insert(key.to_string(), comparator.clone());
        }
        options
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::filters::FilterPredicate;
    use crate::search::parse_search_with;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn now() -> DateTime<Utc> {
        utc("2024-05-16T12:00:00Z")
    }

    fn refresh(query: &str) -> ReportOptions {
        let update = parse_search_with(query, now(), datetime::resolve);
        refresh_report_options(None, update, now(), &Defaults::default())
    }

    #[test]
    fn test_refresh_defaults() {
        let options = refresh("");
        assert_eq!(options.relative_range, RelativeRange::SevenDays);
        assert_eq!(options.from, utc("2024-05-09T12:00:00Z"));
        assert_eq!(options.to, now());
        assert_eq!(options.precision, Precision::Hour);
        assert_eq!(options.timezone, "UTC");
        assert!(options.filters.is_empty());
        assert!(options.metrics.is_empty());
    }

    #[test]
    fn test_refresh_custom() {
        let options = refresh("from=2024-03-01&to=2024-01-01");
        assert_eq!(options.relative_range, RelativeRange::Custom);
        assert_eq!(options.from, utc("2024-01-01T00:00:00Z"));
        assert_eq!(options.to, utc("2024-03-01T00:00:00Z"));
        assert_eq!(options.precision, Precision::Day);

        let options = refresh("range=custom&to=2024-05-01");
        assert_eq!(options.from, utc("2024-04-30T00:00:00Z"));
    }

    #[test]
    fn test_refresh_reconciles_precision() {
        let options = refresh("range=hour&precision=month");
        assert_eq!(options.precision, Precision::Minute);

        let options = refresh("range=90days&precision=week");
        assert_eq!(options.precision, Precision::Week);
    }

    #[test]
    fn test_refresh_merges_current() {
        let current = refresh("range=day&metrics=count_sent&timezone=America%2FChicago");
        let later = now() + Duration::hours(2);
        let update = parse_search_with("range=hour", later, datetime::resolve);
        let options = refresh_report_options(Some(&current), update, later, &Defaults::default());
        assert_eq!(options.relative_range, RelativeRange::Hour);
        assert_eq!(options.to, later);
        assert_eq!(options.metrics, vec!["count_sent"]);
        assert_eq!(options.timezone, "America/Chicago");

        // A relative range is re-derived on every refresh.
        let options =
            refresh_report_options(Some(&current), SearchOptions::default(), later, &Defaults::default());
        assert_eq!(options.to, later);
        assert_eq!(options.from, later - Duration::days(1));
    }

    #[test]
    fn test_query_string_round_trip() {
        let options = refresh(
            "from=2024-01-01T00:00:00Z&to=2024-01-03T00:00:00Z&range=custom&precision=hour\
             &timezone=America%2FNew_York&metrics=count_sent&metrics=count_bounce\
             &filters=Subaccount:Subaccount%20with%20a%20bad%3A%20symbol:100&filters=Domain:a.com\
             &comparisons=Template:welcome&industryBenchmarkMetric=inbox_folder_rate",
        );
        let query = options.to_query_string();
        assert_eq!(refresh(&query), options);
    }

    #[test]
    fn test_query_string_round_trip_percent() {
        let options = refresh("range=day&filters=Campaign:50%2525off&filters=Template:100%25");
        let and = &options.filters[0].and;
        assert_eq!(and["campaigns"].eq[0].value, "50%25off");
        assert_eq!(and["templates"].eq[0].value, "100%");

        let again = refresh(&options.to_query_string());
        assert_eq!(again, options);
    }

    #[test]
    fn test_api_params() {
        let options = refresh(
            "from=2024-01-01T00:00:00Z&to=2024-01-01T06:30:00Z&range=custom\
             &timezone=America%2FNew_York&metrics=count_sent&metrics=count_bounce",
        );
        let params = options.api_params();
        assert_eq!(params.from, "2024-01-01T00:00");
        assert_eq!(params.to, "2024-01-01T06:30");
        assert_eq!(params.precision, "5min");
        assert_eq!(params.timezone, "America/New_York");
        assert_eq!(params.metrics, "count_sent,count_bounce");
        assert_eq!(params.query_filters, None);

        let request = options.request("/api/v1/metrics/deliverability");
        assert_eq!(request.method, "GET");
        assert_eq!(request.params, params);
    }

    #[test]
    fn test_api_params_forced_utc() {
        let options = refresh("range=30days&timezone=America%2FNew_York&filters=Domain:a.com");
        assert_eq!(options.precision, Precision::Day);
        assert!(options.is_timezone_forced());
        let params = options.api_params();
        assert_eq!(params.timezone, "UTC");
        // Widened to whole days.
        assert_eq!(params.from, "2024-04-16T00:00");
        assert_eq!(params.to, "2024-05-17T00:00");
        let filters: Vec<FilterGroup> =
            serde_json::from_str(params.query_filters.as_ref().unwrap()).unwrap();
        assert_eq!(filters, options.filters);
    }

    #[test]
    fn test_fan_out() {
        let options = refresh("range=day&filters=Domain:a.com");
        assert_eq!(options.fan_out(), vec![options.clone()]);

        let options = refresh(
            "range=day&filters=Domain:a.com&comparisons=Subaccount:Main:100\
             &comparisons=Subaccount:Other:101",
        );
        let fanned = options.fan_out();
        assert_eq!(fanned.len(), 2);
        for (variant, id) in fanned.iter().zip(["100", "101"]) {
            assert!(variant.comparisons.is_empty());
            assert_eq!(variant.filters.len(), 1);
            let and = &variant.filters[0].and;
            assert_eq!(and["domains"].eq, vec![FilterPredicate::new("Domain", "a.com")]);
            assert_eq!(and["subaccounts"].eq[0].id.as_deref(), Some(id));
        }

        // No filters, the comparison becomes the only group.
        let options = refresh("range=day&comparisons=Template:welcome");
        let fanned = options.fan_out();
        assert_eq!(fanned[0].filters.len(), 1);
        assert_eq!(fanned[0].filters[0].and["templates"].eq[0].value, "welcome");
    }
}
