//! Wordnik lookups with memoization through a shared cache server.

#[macro_use]
pub mod metrics;

pub mod batch;
pub mod caching;
pub mod config;
mod error;
pub mod logging;
pub mod wordnik;

pub use error::{Error, Result};
