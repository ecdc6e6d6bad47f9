// SPDX-FileCopyrightText: (C) 2024 Jason Ish <jason@codemonkey.net>
// SPDX-License-Identifier: MIT

// Clippy suppressions. These are the global ones I don't care about.
#![allow(clippy::needless_return)]
#![allow(clippy::redundant_field_names)]

#[macro_use]
extern crate lazy_static;

pub mod config;
pub mod datepicker;
pub mod datetime;
pub mod error;
pub mod filters;
pub mod logger;
pub mod options;
pub mod precision;
mod prelude;
pub mod querystring;
pub mod search;
pub mod version;

pub use datetime::{DateRange, RelativeRange};
pub use filters::{Comparison, FilterGroup, FilterPredicate};
pub use options::{refresh_report_options, Defaults, ReportOptions};
pub use precision::Precision;
pub use search::{parse_search, SearchOptions};
