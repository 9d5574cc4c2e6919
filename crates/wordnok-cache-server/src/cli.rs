//! Exposes the command line application.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wordnok_service::metrics;

use crate::config::Config;
use crate::logging;
use crate::server;

/// Cache server commands.
#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Run the cache server.
    Run {
        /// Path to the file the entries are stored in.
        ///
        /// The file is created if it does not exist yet.
        #[arg(long, value_name = "PATH")]
        db_path: PathBuf,

        /// The port to listen on.
        #[arg(long)]
        port: u16,
    },
}

/// A persistent key/value store for memoized word lookups.
#[derive(Clone, Debug, Parser)]
#[command(bin_name = "wordnok-cache-server", version, about)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config()).context("failed loading config")?;

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: sentry::release_name!(),
        ..Default::default()
    });

    // SAFETY: We are in a single-threaded context, no runtime has been started yet.
    unsafe { logging::init_logging(&config.logging) };

    if let Some(ref statsd) = config.metrics.statsd {
        metrics::configure_statsd(
            &config.metrics.prefix,
            statsd.as_str(),
            config.metrics.custom_tags.clone(),
        )
        .context("failed to configure statsd")?;
    }

    match cli.command {
        Command::Run { db_path, port } => {
            server::run(&db_path, port).context("failed to run the cache server")?
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "wordnok-cache-server",
            "run",
            "--db-path",
            "cache.db",
            "--port",
            "3030",
        ])
        .unwrap();

        let Command::Run { db_path, port } = &cli.command;
        assert_eq!(db_path, Path::new("cache.db"));
        assert_eq!(*port, 3030);
        assert_eq!(cli.config(), None);
    }

    #[test]
    fn test_run_args_are_required() {
        assert!(Cli::try_parse_from(["wordnok-cache-server", "run", "--port", "3030"]).is_err());
        assert!(
            Cli::try_parse_from(["wordnok-cache-server", "run", "--db-path", "cache.db"]).is_err()
        );
        assert!(
            Cli::try_parse_from([
                "wordnok-cache-server",
                "run",
                "--db-path",
                "cache.db",
                "--port",
                "http"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_global_config() {
        let cli = Cli::try_parse_from([
            "wordnok-cache-server",
            "run",
            "--db-path",
            "cache.db",
            "--port",
            "3030",
            "--config",
            "wordnok.yml",
        ])
        .unwrap();
        assert_eq!(cli.config(), Some(Path::new("wordnok.yml")));
    }
}
