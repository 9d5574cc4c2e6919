use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use sentry::types::Dsn;
use serde::{Deserialize, Deserializer, de};
use tracing::level_filters::LevelFilter;

/// How log lines are rendered.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `pretty` on a terminal, `simplified` otherwise.
    Auto,
    /// Multi-line, colored output.
    Pretty,
    /// One line per event, without colors.
    Simplified,
    /// JSON lines.
    Json,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// Log level of the wordnok crates, unless overridden by `RUST_LOG`.
    #[serde(deserialize_with = "level_from_str")]
    pub level: LevelFilter,
    pub format: LogFormat,
    /// Sets `RUST_BACKTRACE=1`, so that errors carry backtraces.
    pub enable_backtraces: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
            enable_backtraces: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// `host:port` of a statsd server. Metrics are dropped if this is unset.
    pub statsd: Option<String>,
    /// Prepended to the name of every metric.
    pub prefix: String,
    /// Tags added to every metric.
    pub custom_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: std::env::var("STATSD_SERVER").ok(),
            prefix: "wordnok".into(),
            custom_tags: BTreeMap::new(),
        }
    }
}

/// Options for the cache server process.
///
/// The storage path and port are not part of this, they are given on the command line.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: Logging,
    pub metrics: Metrics,
    /// Errors are reported to Sentry if this is set.
    pub sentry_dsn: Option<Dsn>,
}

impl Config {
    pub fn get(path: Option<&Path>) -> Result<Self> {
        wordnok_service::config::load_yaml(path)
    }
}

fn level_from_str<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LevelFilter, D::Error> {
    let level = String::deserialize(deserializer)?;
    level.parse().map_err(|_| {
        de::Error::invalid_value(
            de::Unexpected::Str(&level),
            &"one of off, error, warn, info, debug or trace",
        )
    })
}
