use std::env;

use sentry::integrations::tracing::EventFilter;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use wordnok_service::logging::init_json_logging;

use crate::config::{LogFormat, Logging};

/// Crates whose logs follow the configured level. Everything else logs at `INFO` at most.
const WORDNOK_CRATES: &[&str] = &["wordnok_cache_server", "wordnok_service"];

/// The `RUST_LOG` directives used when the variable is not set.
fn default_directives(level: LevelFilter) -> String {
    if level == LevelFilter::OFF {
        return String::new();
    } else if level <= LevelFilter::INFO {
        return level.to_string().to_uppercase();
    }

    let level = level.to_string().to_lowercase();
    let mut directives = String::from("INFO");
    for krate in WORDNOK_CRATES {
        directives.push_str(&format!(",{krate}={level}"));
    }
    directives
}

/// Resolves [`LogFormat::Auto`] to a concrete format.
fn resolve_format(format: LogFormat, attended: bool) -> LogFormat {
    match format {
        LogFormat::Auto if attended => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        other => other,
    }
}

/// Installs the global logger.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Safety
/// This may set `RUST_BACKTRACE` through [`std::env::set_var`], and must only be called while the
/// process is still single-threaded.
pub unsafe fn init_logging(config: &Logging) {
    if config.enable_backtraces {
        // SAFETY: As documented, this function may only be called in a single-threaded context.
        unsafe { env::set_var("RUST_BACKTRACE", "1") };
    }

    let directives = env::var("RUST_LOG").unwrap_or_else(|_| default_directives(config.level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_target(true);
    let fmt_layer = match resolve_format(config.format, console::user_attended()) {
        LogFormat::Json => return init_json_logging(&directives, std::io::stdout),
        LogFormat::Pretty => fmt_layer.pretty().boxed(),
        LogFormat::Simplified | LogFormat::Auto => fmt_layer.compact().with_ansi(false).boxed(),
    };

    // errors become Sentry events, everything else down to INFO is attached as logs
    let sentry_layer =
        sentry::integrations::tracing::layer().event_filter(|md| match *md.level() {
            tracing::Level::ERROR => EventFilter::Event | EventFilter::Log,
            tracing::Level::WARN | tracing::Level::INFO => EventFilter::Log,
            tracing::Level::DEBUG | tracing::Level::TRACE => EventFilter::Ignore,
        });

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(EnvFilter::new(&directives)))
        .with(sentry_layer)
        .init();
}

/// Logs an error through the logger, or to `stderr` if errors would not be logged.
pub fn ensure_log_error(error: &anyhow::Error) {
    let enabled = tracing::Level::ERROR <= tracing::level_filters::STATIC_MAX_LEVEL
        && tracing::Level::ERROR <= LevelFilter::current();
    if enabled {
        tracing::error!("{:?}", error);
    } else {
        eprintln!("{error:?}");
    }
}
