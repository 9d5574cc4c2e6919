//! # Wordnok caching infrastructure
//!
//! Lookups against the word service are slow, and most of them are deterministic: the parts of
//! speech of a word do not change between two runs of a program. This module contains everything
//! needed to memoize such lookups.
//!
//! ## Cache Layers
//!
//! - A process-local table of in-flight computations, used for request coalescing. Concurrent
//!   calls with identical arguments subscribe to one shared computation instead of starting their
//!   own. Entries only live as long as the computation is running.
//! - A [`CacheBackend`], usually a cache server reached through a [`CacheClient`], which persists
//!   successful results across process runs. Errors are never persisted.
//!
//! A memoized call goes through the following steps:
//! - The [`CacheKey`] is derived from the function name and its serialized arguments.
//! - If a computation for that key is in flight, the call subscribes to it.
//! - Otherwise a new computation is started. It first looks the key up in the backend, and only on
//!   a miss invokes the real function and stores its result.
//!
//! Stored entries never expire. There is no eviction, the store grows for as long as new
//! arguments are being looked up.

mod cache_key;
mod client;
mod memoizer;

pub use cache_key::{CacheKey, CacheKeyBuilder};
pub use client::{CacheBackend, CacheClient};
pub use memoizer::Memoizer;
