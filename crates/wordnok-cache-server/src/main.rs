//! Wordnok cache server.
//!
//! A standalone service that persists memoized word lookups, so that they survive the processes
//! that computed them. Entries are written with `PUT /entries/{key}` and read with
//! `GET /entries/{key}`, and are kept in a single append-only storage file.

#![warn(missing_debug_implementations, clippy::all)]

mod cli;
mod config;
mod endpoints;
mod logging;
mod server;
mod store;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
