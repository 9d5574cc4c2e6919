//! Shared helpers for the wordnok test suites.
//!
//! - Call [`setup`] at the start of every test, so that logs end up in the captured test output.
//! - Keep the [`TempDir`] returned by [`tempdir`] alive for as long as a store uses it.
//! - Keep a [`Server`] alive until the last request to it has been answered. Dropping it stops
//!   the server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::routing::get;
use reqwest::Url;
use tracing_subscriber::EnvFilter;

pub use tempfile::TempDir;

/// Routes the logs of the wordnok crates into the test output.
///
/// Logs of all other crates are muted.
pub fn setup() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            "wordnok_service=trace,wordnok_cache_server=trace",
        ))
        .with_target(false)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory that is removed when the returned guard is dropped.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// Serves a [`Router`] on a random local port, for as long as it is alive.
///
/// Needs to be created within a `tokio` runtime.
#[derive(Debug)]
pub struct Server {
    handle: tokio::task::JoinHandle<()>,
    addr: SocketAddr,
}

impl Server {
    pub fn with_router(router: Router) -> Self {
        let listener = std::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { handle, addr }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The URL of `path` on this server.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://127.0.0.1:{}/{path}", self.port())
            .parse()
            .unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A [`Server`] that counts the requests it receives, by path.
///
/// Used to check how often a fake upstream was actually called.
#[derive(Debug)]
pub struct HitCounter {
    server: Server,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl HitCounter {
    pub fn new(router: Router) -> Self {
        let hits: Arc<Mutex<HashMap<String, usize>>> = Default::default();

        let counter = {
            let hits = Arc::clone(&hits);
            move |request: Request, next: Next| {
                *hits
                    .lock()
                    .unwrap()
                    .entry(request.uri().path().to_owned())
                    .or_default() += 1;
                next.run(request)
            }
        };

        Self {
            server: Server::with_router(router.layer(middleware::from_fn(counter))),
            hits,
        }
    }

    /// The number of requests to `path` so far.
    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn url(&self, path: &str) -> Url {
        self.server.url(path)
    }
}

type Entries = Arc<Mutex<HashMap<String, String>>>;

/// A cache server that keeps its entries in memory.
///
/// It speaks the same `GET`/`PUT /entries/{key}` protocol as the real one, without touching the
/// disk.
pub fn memory_cache_server() -> Server {
    async fn get_entry(
        State(entries): State<Entries>,
        Path(key): Path<String>,
    ) -> Result<String, StatusCode> {
        let entries = entries.lock().unwrap();
        entries.get(&key).cloned().ok_or(StatusCode::NOT_FOUND)
    }

    async fn put_entry(
        State(entries): State<Entries>,
        Path(key): Path<String>,
        value: String,
    ) -> StatusCode {
        entries.lock().unwrap().insert(key, value);
        StatusCode::NO_CONTENT
    }

    let router = Router::new()
        .route("/entries/{key}", get(get_entry).put(put_entry))
        .with_state(Entries::default());
    Server::with_router(router)
}
