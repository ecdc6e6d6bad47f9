// SPDX-License-Identifier: MIT
//
// Copyright (C) 2020-2022 Jason Ish

use std::sync::OnceLock;

use time::macros::format_description;
use time::UtcOffset;
use tracing::Level;
use tracing_subscriber::fmt::time::OffsetTime;

static OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Capture the local UTC offset. Must be called before any threads are
/// started, otherwise the offset can't be determined and UTC is used.
pub fn init_offset() {
    if let Ok(offset) = UtcOffset::current_local_offset() {
        let _ = OFFSET.set(offset);
    }
}

pub fn init_logger(level: Level) {
    let level = match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    };

    let offset = OFFSET.get().copied().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    );

    let builder = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .with_timer(timer);

    #[cfg(target_os = "windows")]
    let builder = builder.with_ansi(false);

    if let Err(err) = tracing::subscriber::set_global_default(builder.finish()) {
        eprintln!("Failed to set default log subscriber: {err}");
    }
}

/// Forward records from the log crate to tracing.
pub fn init_stdlog() {
    if let Err(err) = tracing_log::LogTracer::builder()
        .with_max_level(log::LevelFilter::Info)
        .init()
    {
        eprintln!("Failed to initialize log forwarding: {err}");
    }
}

/// Map the number of -v flags to a log level.
pub fn verbosity_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}
