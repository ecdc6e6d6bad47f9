// SPDX-FileCopyrightText: (C) 2024 Jason Ish <jason@codemonkey.net>
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::querystring::QueryStringParseError;

#[derive(Error, Debug)]
pub enum AppError {
    /// An error resulting from bad input data, such as an invalid
    /// timestamp given on the command line.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("serde: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("time parser error: {0}")]
    DateTimeParse(#[from] crate::datetime::ParseError),

    #[error("invalid duration: {0}")]
    DurationParse(#[from] humantime::DurationError),
}

impl From<QueryStringParseError> for AppError {
    fn from(value: QueryStringParseError) -> Self {
        Self::BadRequest(format!("failed to parse query string: {}", value))
    }
}
