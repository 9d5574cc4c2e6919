use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::{Error, Result};

use super::{CacheBackend, CacheClient, CacheKey};

/// The serialized outcome of a computation, shared between all of its waiters.
type Computation = Shared<BoxFuture<'static, Result<Arc<str>>>>;

/// The table of currently running computations, by [`CacheKey`].
type InFlight = Arc<Mutex<HashMap<CacheKey, Computation>>>;

/// Memoizes the results of asynchronous lookups in a [`CacheBackend`].
///
/// Calls with identical arguments are:
/// - served from the backend if a result was stored there before,
/// - deduplicated, so that concurrent calls only invoke the underlying function once,
/// - otherwise computed, with the result stored in the backend before it is handed out to all
///   waiting callers.
///
/// Errors are never stored, and a later call with the same arguments will retry.
///
/// A [`Memoizer`] without a backend is a passthrough that directly invokes the function.
/// Clones share the same table of in-flight computations.
#[derive(Clone)]
pub struct Memoizer {
    inner: Option<Arc<MemoizerInner>>,
}

struct MemoizerInner {
    backend: Arc<dyn CacheBackend>,
    in_flight: InFlight,
}

impl fmt::Debug for Memoizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("Memoizer")
                .field("backend", &inner.backend)
                .field("in-flight computations", &self.in_flight())
                .finish(),
            None => f.write_str("Memoizer(passthrough)"),
        }
    }
}

impl Memoizer {
    /// Creates a memoizer storing results in the given `backend`.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            inner: Some(Arc::new(MemoizerInner {
                backend,
                in_flight: Default::default(),
            })),
        }
    }

    /// Creates a memoizer that does not memoize anything.
    pub fn passthrough() -> Self {
        Self { inner: None }
    }

    /// Creates a memoizer backed by the cache server given in the `config`.
    ///
    /// Falls back to a [`passthrough`](Self::passthrough) if no cache server port is configured.
    /// A configured but unusable cache server address is an error.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self> {
        Ok(match config.cache_server_url()? {
            Some(url) => {
                tracing::debug!("Memoizing lookups in cache server at {}", url);
                Self::new(Arc::new(CacheClient::new(client, url)))
            }
            None => Self::passthrough(),
        })
    }

    /// Whether results are actually memoized.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// The number of computations that are currently running.
    pub fn in_flight(&self) -> usize {
        self.inner
            .as_ref()
            .and_then(|inner| inner.in_flight.try_lock().ok().map(|t| t.len()))
            .unwrap_or_default()
    }

    /// Calls `f`, or reuses a result of `function` for identical `args`.
    ///
    /// The `function` name and `args` together form the [`CacheKey`]. Pass multiple arguments
    /// as a tuple.
    ///
    /// `f` is only invoked if no result is stored for the key, and no other call for the same key
    /// is already running. Otherwise the result of that call is awaited instead.
    pub async fn memoize<A, R, F, Fut>(&self, function: &str, args: &A, f: F) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let Some(inner) = &self.inner else {
            return f().await;
        };

        let key = CacheKey::for_call(function, args)?;
        metric!(counter("memoize.access") += 1, "function" => function);

        let computation = {
            let mut in_flight = inner.in_flight.lock().unwrap();
            match in_flight.get(&key) {
                Some(computation) => {
                    metric!(counter("memoize.coalesced") += 1, "function" => function);
                    tracing::trace!("Joining in-flight {} computation for {}", function, key);
                    computation.clone()
                }
                None => {
                    let computation = compute(
                        Arc::clone(&inner.backend),
                        Arc::clone(&inner.in_flight),
                        function.to_owned(),
                        key.clone(),
                        f(),
                    )
                    .boxed()
                    .shared();
                    in_flight.insert(key, computation.clone());
                    computation
                }
            }
        };

        let value = computation.await?;
        Ok(serde_json::from_str(&value)?)
    }
}

/// Runs a deduplicated computation for `key`.
///
/// Removes the computation from the `in_flight` table once it is done, no matter the outcome.
/// A panicking lookup is turned into an [`Error::Internal`] shared by all waiters.
async fn compute<R, Fut>(
    backend: Arc<dyn CacheBackend>,
    in_flight: InFlight,
    function: String,
    key: CacheKey,
    lookup: Fut,
) -> Result<Arc<str>>
where
    R: Serialize,
    Fut: Future<Output = Result<R>>,
{
    let result = AssertUnwindSafe(lookup_or_compute(&*backend, &function, &key, lookup))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(Error::Internal(format!(
                "{function} lookup panicked: {}",
                panic_message(&*panic)
            )))
        });

    if let Err(err) = &result {
        metric!(counter("memoize.error") += 1, "function" => &function);
        tracing::debug!(error = %err, "Failed to compute {} result for {}", function, key);
    }

    in_flight.lock().unwrap().remove(&key);
    result
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Looks `key` up in the `backend`, or runs the `lookup` and stores its serialized result.
///
/// Errors are returned as-is and never stored.
async fn lookup_or_compute<R, Fut>(
    backend: &dyn CacheBackend,
    function: &str,
    key: &CacheKey,
    lookup: Fut,
) -> Result<Arc<str>>
where
    R: Serialize,
    Fut: Future<Output = Result<R>>,
{
    let cache_key = key.to_string();
    if let Some(value) = backend.get(&cache_key).await? {
        metric!(counter("memoize.hit") += 1, "function" => function);
        tracing::trace!("Found {} result for {} in cache", function, key);
        return Ok(Arc::from(value));
    }

    metric!(counter("memoize.miss") += 1, "function" => function);
    tracing::trace!("Computing {} result for {}", function, key);

    let value = serde_json::to_string(&lookup.await?)?;
    backend.put(&cache_key, &value).await?;
    Ok(Arc::from(value))
}
