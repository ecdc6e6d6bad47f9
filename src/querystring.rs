// SPDX-FileCopyrightText: (C) 2021 Jason Ish <jason@codemonkey.net>
//
// SPDX-License-Identifier: MIT

//! URL query string decoding and encoding.
//!
//! Keys may carry bracketed path segments the way browser query string
//! libraries write nested values: `metrics[]=a` is folded onto `metrics`,
//! and `comparisons[0][type]=Subaccount` is kept as an indexed object.

use std::collections::BTreeMap;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_while1, take_while_m_n};
use nom::combinator::{eof, opt, recognize};
use nom::multi::many0;
use nom::sequence::{delimited, preceded};
use nom::{IResult, Parser};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// What `encodeURIComponent` leaves alone, minus the sub-delims.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct QueryStringParseError(String);

impl std::error::Error for QueryStringParseError {}

impl std::fmt::Display for QueryStringParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "query string parse error: {}", self.0)
    }
}

impl From<nom::Err<nom::error::Error<&str>>> for QueryStringParseError {
    fn from(value: nom::Err<nom::error::Error<&str>>) -> Self {
        Self(format!("{:?}", value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Param {
    name: String,
    path: Vec<String>,
    value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    params: Vec<Param>,
}

impl QueryString {
    pub fn parse(input: &str) -> Result<Self, QueryStringParseError> {
        let input = input.strip_prefix('?').unwrap_or(input);
        let (_, pairs) = tokenize(input)?;
        let mut params = vec![];
        for (key, value) in pairs {
            let key = decode(key);
            let value = value.map(decode).unwrap_or_default();
            let (name, mut path) = split_key(&key);
            if path.len() == 1 && path[0].is_empty() {
                path.clear();
            }
            params.push(Param { name, path, value });
        }
        Ok(Self { params })
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params
            .iter()
            .any(|p| p.name == key && p.path.is_empty())
    }

    /// The first value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name == key && p.path.is_empty())
            .map(|p| p.value.as_str())
    }

    /// All values for a key, in order of appearance.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.name == key && p.path.is_empty())
            .map(|p| p.value.as_str())
            .collect()
    }

    /// Collect `name[index][field]=value` parameters into objects, ordered
    /// by index.
    pub fn indexed_objects(&self, name: &str) -> Vec<BTreeMap<String, String>> {
        let mut objects: BTreeMap<usize, BTreeMap<String, String>> = BTreeMap::new();
        for param in &self.params {
            if param.name != name || param.path.len() != 2 {
                continue;
            }
            if let Ok(index) = param.path[0].parse::<usize>() {
                objects
                    .entry(index)
                    .or_default()
                    .insert(param.path[1].clone(), param.value.clone());
            }
        }
        objects.into_values().collect()
    }
}

/// Encode key/value pairs into a query string, without a leading '?'.
pub fn encode<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k.as_ref(), COMPONENT),
                utf8_percent_encode(v.as_ref(), COMPONENT)
            )
        })
        .collect::<Vec<String>>()
        .join("&")
}

/// Percent-encode a single value the way `encodeURIComponent` does.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

pub fn decode(input: &str) -> String {
    let input = input.replace('+', " ");
    percent_decode_str(&input).decode_utf8_lossy().to_string()
}

/// Split the query string into raw, still encoded, key/value pairs. A
/// '%' not followed by two hex digits is an error.
fn tokenize(mut input: &str) -> IResult<&str, Vec<(&str, Option<&str>)>> {
    let mut pairs = vec![];
    loop {
        if input.is_empty() {
            break;
        }
        let (next, (key, value)) = parse_pair(input)?;
        if !key.is_empty() {
            pairs.push((key, value));
        }
        let (next, _) = alt((tag("&"), eof)).parse(next)?;
        input = next;
    }
    Ok((input, pairs))
}

fn parse_pair(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    let (input, key) = encoded(input, |c| c == '=' || c == '&')?;
    let (input, value) = opt(preceded(tag("="), encoded_value)).parse(input)?;
    Ok((input, (key, value)))
}

fn encoded_value(input: &str) -> IResult<&str, &str> {
    encoded(input, |c| c == '&')
}

/// Encoded text up to a terminator, where every '%' starts a valid escape.
fn encoded(input: &str, stop: fn(char) -> bool) -> IResult<&str, &str> {
    recognize(many0(alt((
        take_while1(move |c: char| c != '%' && !stop(c)),
        recognize((
            tag("%"),
            take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        )),
    ))))
    .parse(input)
}

fn parse_key(input: &str) -> IResult<&str, (&str, Vec<&str>)> {
    let (input, name) = take_till(|c: char| c == '[').parse(input)?;
    let (input, path) =
        many0(delimited(tag("["), take_till(|c: char| c == ']'), tag("]"))).parse(input)?;
    Ok((input, (name, path)))
}

// Keys that don't fully parse as name[a][b] are taken as a plain name.
fn split_key(key: &str) -> (String, Vec<String>) {
    match parse_key(key) {
        Ok(("", (name, path))) if !name.is_empty() => (
            name.to_string(),
            path.iter().map(|s| s.to_string()).collect(),
        ),
        _ => (key.to_string(), vec![]),
    }
}
