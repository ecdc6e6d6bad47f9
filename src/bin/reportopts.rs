// SPDX-FileCopyrightText: (C) 2024 Jason Ish <jason@codemonkey.net>
// SPDX-License-Identifier: MIT

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Arg, ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, error};

use reportopts::config::Config;
use reportopts::error::AppError;
use reportopts::querystring::QueryString;
use reportopts::search::parse_search_with;
use reportopts::{datetime, logger, precision, version, Precision, ReportOptions};

const DEFAULT_URL: &str = "/api/v1/metrics/deliverability";

#[derive(Parser, Debug)]
#[command(name = "reportopts", about = "Report search options tool")]
struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration filename
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a search string, showing only what it sets
    Parse { query: String },
    /// Parse a search string into complete report options
    Refresh {
        query: String,
        /// Use this time instead of the current time
        #[arg(long)]
        now: Option<String>,
    },
    /// Show the API requests for a search string, one per comparison
    Params {
        query: String,
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
        #[arg(long)]
        now: Option<String>,
    },
    /// Recommend a precision for a time range
    Precision {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Length of the range ending at --to, eg. 7days
        #[arg(long, conflicts_with = "from")]
        span: Option<String>,
        /// Requested precision
        #[arg(long)]
        precision: Option<String>,
    },
    /// Display version
    Version,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrecisionReport {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    recommended: Precision,
    valid: Vec<Precision>,
    forced_utc: bool,
}

fn main() {
    logger::init_offset();

    // Report option defaults can also come from the config file or the
    // environment, so these are handled by Config rather than the parser.
    let command = Cli::command()
        .arg(
            Arg::new("defaults.range")
                .long("range")
                .value_name("RANGE")
                .global(true)
                .help("Default relative range"),
        )
        .arg(
            Arg::new("defaults.timezone")
                .long("timezone")
                .value_name("TZ")
                .global(true)
                .help("Default timezone"),
        )
        .arg(
            Arg::new("defaults.precision")
                .long("default-precision")
                .value_name("PRECISION")
                .global(true)
                .help("Default precision"),
        )
        .arg(
            Arg::new("defaults.metrics")
                .long("metric")
                .value_name("METRIC")
                .action(ArgAction::Append)
                .global(true)
                .help("Default metric, may be repeated"),
        );
    let matches = command.get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    logger::init_logger(logger::verbosity_level(cli.verbose));
    logger::init_stdlog();
    version::log_version();

    if let Err(err) = run(cli, matches) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli, matches: clap::ArgMatches) -> anyhow::Result<()> {
    let config = Config::new(Some(matches), cli.config.as_deref())
        .context("failed to load configuration")?;
    let defaults = config.defaults()?;
    debug!("Using defaults {:?}", defaults);

    match cli.command {
        Commands::Parse { query } => {
            check_query(&query)?;
            print_json(&parse_search_with(&query, Utc::now(), datetime::resolve))?;
        }
        Commands::Refresh { query, now } => {
            check_query(&query)?;
            let now = parse_now(now.as_deref())?;
            let update = parse_search_with(&query, now, datetime::resolve);
            let options = reportopts::refresh_report_options(None, update, now, &defaults);
            print_json(&options)?;
        }
        Commands::Params { query, url, now } => {
            check_query(&query)?;
            let now = parse_now(now.as_deref())?;
            let update = parse_search_with(&query, now, datetime::resolve);
            let options = reportopts::refresh_report_options(None, update, now, &defaults);
            let requests: Vec<_> = options
                .fan_out()
                .iter()
                .map(|options: &ReportOptions| options.request(&url))
                .collect();
            print_json(&requests)?;
        }
        Commands::Precision {
            from,
            to,
            span,
            precision: requested,
        } => {
            let to = parse_now(to.as_deref())?;
            let from = match (from, span) {
                (Some(from), _) => datetime::parse(&from, None)?,
                (None, Some(span)) => {
                    let span = humantime::parse_duration(&span).map_err(AppError::from)?;
                    let span = chrono::Duration::from_std(span)
                        .map_err(|err| AppError::BadRequest(err.to_string()))?;
                    span_start(to, span)?
                }
                (None, None) => {
                    return Err(AppError::BadRequest(
                        "one of --from or --span is required".to_string(),
                    )
                    .into())
                }
            };
            let requested = match requested {
                Some(p) => Some(p.parse::<Precision>().map_err(AppError::BadRequest)?),
                None => None,
            };
            let recommended = precision::recommend(from, to, requested);
            print_json(&PrecisionReport {
                from,
                to,
                recommended,
                valid: precision::valid_precisions(from, to),
                forced_utc: recommended.is_forced_utc(),
            })?;
        }
        Commands::Version => {
            version::print_version();
        }
    }
    Ok(())
}

/// Unlike report parsing, which ignores what it can't make sense of, the
/// command line rejects a malformed query string outright.
fn check_query(query: &str) -> Result<(), AppError> {
    QueryString::parse(query)?;
    Ok(())
}

fn span_start(to: DateTime<Utc>, span: chrono::Duration) -> Result<DateTime<Utc>, AppError> {
    to.checked_sub_signed(span)
        .ok_or_else(|| AppError::BadRequest(format!("span too large: {}s", span.num_seconds())))
}

fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>, AppError> {
    match now {
        Some(now) => Ok(datetime::parse(now, None)?),
        None => Ok(Utc::now()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_span_start() {
        let to = datetime::parse("2024-05-16T12:00:00Z", None).unwrap();
        let span = chrono::Duration::from_std(humantime::parse_duration("7days").unwrap()).unwrap();
        assert_eq!(
            span_start(to, span).unwrap(),
            datetime::parse("2024-05-09T12:00:00Z", None).unwrap()
        );

        let span =
            chrono::Duration::from_std(humantime::parse_duration("100000000years").unwrap())
                .unwrap();
        assert!(matches!(span_start(to, span), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_check_query() {
        assert!(check_query("range=day&filters=Domain:a.com").is_ok());
        assert!(matches!(
            check_query("filters=Campaign:50%off"),
            Err(AppError::BadRequest(_))
        ));
    }
}
