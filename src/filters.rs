// SPDX-FileCopyrightText: (C) 2024 Jason Ish <jason@codemonkey.net>
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::prelude::*;

const SUBACCOUNT: &str = "Subaccount";

/// Filter type names as shown to the user, mapped to the key the
/// reporting API expects.
const FILTER_KEYS: &[(&str, &str)] = &[
    ("Recipient Domain", "domains"),
    ("Domain", "domains"),
    ("Sending IP", "sending_ips"),
    ("IP Pool", "ip_pools"),
    ("Campaign", "campaigns"),
    ("Template", "templates"),
    ("Sending Domain", "sending_domains"),
    ("Subaccount", "subaccounts"),
    ("Mailbox Provider", "mailbox_providers"),
    ("Mailbox Provider Region", "mailbox_provider_regions"),
    ("Subject Campaign", "subject_campaigns"),
];

pub fn filter_key(filter_type: &str) -> Option<&'static str> {
    FILTER_KEYS
        .iter()
        .find(|(name, _)| *name == filter_type)
        .map(|(_, key)| *key)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterPredicate {
    #[serde(rename = "type")]
    pub filter_type: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Comparisons share the predicate shape, each one fans a report out
/// into its own request.
pub type Comparison = FilterPredicate;

impl FilterPredicate {
    pub fn new(filter_type: &str, value: &str) -> Self {
        Self {
            filter_type: filter_type.to_string(),
            value: value.to_string(),
            id: None,
        }
    }

    pub fn with_id(filter_type: &str, value: &str, id: &str) -> Self {
        Self {
            filter_type: filter_type.to_string(),
            value: value.to_string(),
            id: Some(id.to_string()),
        }
    }

    /// Encode back into the `Type:Value[:Id]` token form.
    pub fn to_token(&self) -> String {
        match &self.id {
            Some(id) => format!("{}:{}:{}", self.filter_type, self.value, id),
            None => format!("{}:{}", self.filter_type, self.value),
        }
    }

    fn canonical_key(&self) -> (&str, &str, Option<&str>) {
        (&self.filter_type, &self.value, self.id.as_deref())
    }
}

/// Parse a `Type:Value` token. Subaccount tokens carry a trailing id,
/// `Subaccount:Value:Id`, and the value itself may contain colons.
///
/// Returns None if the token has no type separator.
pub fn parse_filter_token(token: &str) -> Option<FilterPredicate> {
    let mut parts: Vec<&str> = token.split(':').collect();
    if parts.len() < 2 {
        return None;
    }
    let filter_type = parts.remove(0);
    if filter_type == SUBACCOUNT && parts.len() > 1 {
        let id = parts.pop().unwrap_or_default();
        return Some(FilterPredicate::with_id(
            filter_type,
            &parts.join(":"),
            id,
        ));
    }
    Some(FilterPredicate::new(filter_type, &parts.join(":")))
}

/// Remove duplicate predicates, keeping the first occurrence.
pub fn dedupe_filters(filters: &[FilterPredicate]) -> Vec<FilterPredicate> {
    let mut seen = HashSet::new();
    let mut deduped = vec![];
    for filter in filters {
        if seen.insert(filter.canonical_key()) {
            deduped.push(filter.clone());
        }
    }
    deduped
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparator {
    pub eq: Vec<FilterPredicate>,
}

/// A conjunction of comparators keyed by API filter key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    #[serde(rename = "AND")]
    pub and: BTreeMap<String, Comparator>,
}

impl FilterGroup {
    pub fn is_empty(&self) -> bool {
        self.and.is_empty()
    }
}

/// Fold predicates into AND groups by filter key. No predicates means no
/// group at all rather than an empty conjunction.
pub fn map_filters_to_comparators(filters: &[FilterPredicate]) -> Vec<FilterGroup> {
    let mut group = FilterGroup::default();
    for filter in filters {
        match filter_key(&filter.filter_type) {
            Some(key) => {
                group
                    .and
                    .entry(key.to_string())
                    .or_default()
                    .eq
                    .push(filter.clone());
            }
            None => {
                warn!("Ignoring filter with unknown type: {}", filter.filter_type);
            }
        }
    }
    if group.is_empty() {
        vec![]
    } else {
        vec![group]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_filter_token() {
        assert_eq!(
            parse_filter_token("Domain:test.com"),
            Some(FilterPredicate::new("Domain", "test.com"))
        );
        assert_eq!(
            parse_filter_token("Subaccount:Main:100"),
            Some(FilterPredicate::with_id("Subaccount", "Main", "100"))
        );
        assert_eq!(
            parse_filter_token("Subaccount:Subaccount with a bad: symbol:100"),
            Some(FilterPredicate::with_id(
                "Subaccount",
                "Subaccount with a bad: symbol",
                "100"
            ))
        );

        // Only subaccounts carry an id, other values keep their colons.
        assert_eq!(
            parse_filter_token("Template:a:b"),
            Some(FilterPredicate::new("Template", "a:b"))
        );

        assert_eq!(parse_filter_token("nocolon"), None);
    }

    #[test]
    fn test_to_token() {
        let token = "Subaccount:Subaccount with a bad: symbol:100";
        assert_eq!(parse_filter_token(token).unwrap().to_token(), token);
    }

    #[test]
    fn test_dedupe_filters() {
        let filters = vec![
            FilterPredicate::new("Domain", "b.com"),
            FilterPredicate::new("Domain", "a.com"),
            FilterPredicate::new("Domain", "b.com"),
            FilterPredicate::with_id("Subaccount", "Main", "100"),
            FilterPredicate::with_id("Subaccount", "Main", "101"),
            FilterPredicate::with_id("Subaccount", "Main", "100"),
        ];
        let deduped = dedupe_filters(&filters);
        assert_eq!(
            deduped,
            vec![
                FilterPredicate::new("Domain", "b.com"),
                FilterPredicate::new("Domain", "a.com"),
                FilterPredicate::with_id("Subaccount", "Main", "100"),
                FilterPredicate::with_id("Subaccount", "Main", "101"),
            ]
        );
        assert_eq!(dedupe_filters(&deduped), deduped);
    }

    #[test]
    fn test_map_filters_to_comparators() {
        assert!(map_filters_to_comparators(&[]).is_empty());

        let groups = map_filters_to_comparators(&[
            FilterPredicate::new("Recipient Domain", "a.com"),
            FilterPredicate::new("Template", "welcome"),
            FilterPredicate::new("Domain", "b.com"),
        ]);
        assert_eq!(groups.len(), 1);
        let and = &groups[0].and;
        assert_eq!(and.len(), 2);
        assert_eq!(and["domains"].eq.len(), 2);
        assert_eq!(and["templates"].eq[0].value, "welcome");

        // Nothing mappable is the same as no filters.
        assert!(map_filters_to_comparators(&[FilterPredicate::new("Bogus", "x")]).is_empty());
    }

    #[test]
    fn test_filter_group_json() {
        let groups =
            map_filters_to_comparators(&[FilterPredicate::with_id("Subaccount", "Main", "100")]);
        let json = serde_json::to_value(&groups).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "AND": {
                    "subaccounts": {
                        "eq": [{"type": "Subaccount", "value": "Main", "id": "100"}]
                    }
                }
            }])
        );
    }
}
