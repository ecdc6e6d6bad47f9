// SPDX-FileCopyrightText: (C) 2024 Jason Ish <jason@codemonkey.net>
// SPDX-License-Identifier: MIT

//! Report search string parsing.
//!
//! Nothing in here fails. Values that can't be parsed are either dropped
//! or replaced with a safe default, and filling in whatever is missing is
//! left to `options::refresh_report_options`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::{self, DateRange, RelativeRange};
use crate::filters::{self, Comparison, FilterGroup};
use crate::precision::Precision;
use crate::prelude::*;
use crate::querystring::QueryString;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndustryBenchmarkFilters {
    pub industry_category: String,
    pub mailbox_provider: String,
}

impl Default for IndustryBenchmarkFilters {
    fn default() -> Self {
        Self {
            industry_category: "all".to_string(),
            mailbox_provider: "all".to_string(),
        }
    }
}

/// Report options as found in a search string. Only what was present
/// (and valid) is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_range: Option<RelativeRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<Precision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<FilterGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparisons: Option<Vec<Comparison>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry_benchmark_metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry_benchmark_filters: Option<IndustryBenchmarkFilters>,
}

impl SearchOptions {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

pub fn parse_search(query: &str) -> SearchOptions {
    parse_search_with(query, Utc::now(), datetime::resolve)
}

/// Parse a search string, resolving relative ranges with `resolver`.
pub fn parse_search_with<F>(query: &str, now: DateTime<Utc>, mut resolver: F) -> SearchOptions
where
    F: FnMut(&str, DateTime<Utc>) -> DateRange,
{
    let mut options = SearchOptions::default();

    let qs = match QueryString::parse(query) {
        Ok(qs) => qs,
        Err(err) => {
            warn!("Ignoring unparseable search string: {}", err);
            return options;
        }
    };
    if qs.is_empty() {
        return options;
    }

    options.from = parse_timestamp(&qs, "from");
    options.to = parse_timestamp(&qs, "to");

    if let Some(range) = qs.get("range") {
        let range = match range.parse::<RelativeRange>() {
            Ok(range) => range,
            Err(_) => {
                debug!("Invalid range {:?}, using day", range);
                RelativeRange::Day
            }
        };
        if range != RelativeRange::Custom {
            let dates = resolver(range.as_str(), now);
            options.from = Some(dates.from);
            options.to = Some(dates.to);
        }
        options.relative_range = Some(range);
    }

    if let Some(precision) = qs.get("precision") {
        match precision.parse::<Precision>() {
            Ok(precision) => options.precision = Some(precision),
            Err(err) => debug!("Dropping precision: {}", err),
        }
    }

    if let Some(timezone) = qs.get("timezone") {
        if !timezone.is_empty() {
            options.timezone = Some(timezone.to_string());
        }
    }

    if let Some(query_filters) = qs.get("query_filters") {
        options.filters = Some(parse_query_filters(query_filters));
    } else {
        let tokens = qs.get_all("filters");
        if !tokens.is_empty() {
            let predicates = parse_filter_tokens(&tokens);
            options.filters = Some(filters::map_filters_to_comparators(
                &filters::dedupe_filters(&predicates),
            ));
        }
    }

    let comparisons = parse_comparisons(&qs);
    if !comparisons.is_empty() {
        options.comparisons = Some(comparisons);
    }

    let metrics: Vec<String> = qs
        .get_all("metrics")
        .iter()
        .flat_map(|m| m.split(','))
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect();
    if !metrics.is_empty() {
        options.metrics = Some(metrics);
    }

    if let Some(metric) = qs.get("industryBenchmarkMetric") {
        options.industry_benchmark_metric = Some(metric.to_string());
    }

    if let Some(raw) = qs.get("industryBenchmarkFilters") {
        let filters = serde_json::from_str::<IndustryBenchmarkFilters>(raw).unwrap_or_else(|err| {
            debug!("Bad industryBenchmarkFilters {:?}: {}", raw, err);
            IndustryBenchmarkFilters::default()
        });
        options.industry_benchmark_filters = Some(filters);
    }

    options
}

fn parse_timestamp(qs: &QueryString, key: &str) -> Option<DateTime<Utc>> {
    let value = qs.get(key)?;
    match datetime::parse(value, None) {
        Ok(ts) => Some(ts),
        Err(err) => {
            debug!("Dropping {}: {}", key, err);
            None
        }
    }
}

fn parse_filter_tokens(tokens: &[&str]) -> Vec<filters::FilterPredicate> {
    tokens
        .iter()
        .filter_map(|token| {
            let filter = filters::parse_filter_token(token);
            if filter.is_none() {
                debug!("Ignoring malformed filter: {}", token);
            }
            filter
        })
        .collect()
}

/// Parse the JSON encoded filter groups. The value may have been URI
/// encoded on top of the query string encoding.
pub fn parse_query_filters(raw: &str) -> Vec<FilterGroup> {
    let decoded = percent_encoding::percent_decode_str(raw).decode_utf8_lossy();
    match serde_json::from_str::<Vec<FilterGroup>>(&decoded) {
        Ok(groups) => groups.into_iter().filter(|g| !g.is_empty()).collect(),
        Err(err) => {
            warn!("Failed to parse query_filters, using no filters: {}", err);
            vec![]
        }
    }
}

// Comparisons are accepted both as filter tokens and as indexed objects.
fn parse_comparisons(qs: &QueryString) -> Vec<Comparison> {
    let mut comparisons = parse_filter_tokens(&qs.get_all("comparisons"));
    for object in qs.indexed_objects("comparisons") {
        match (object.get("type"), object.get("value")) {
            (Some(filter_type), Some(value)) => comparisons.push(Comparison {
                filter_type: filter_type.to_string(),
                value: value.to_string(),
                id: object.get("id").cloned(),
            }),
            _ => debug!("Ignoring incomplete comparison: {:?}", object),
        }
    }
    filters::dedupe_filters(&comparisons)
}
