use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use wordnok_service::metric;

use crate::endpoints;
use crate::store::Store;

/// A cache server that is ready to accept connections.
///
/// Once [`bind`](Self::bind) returns, the storage file is open and the listener is bound, so
/// clients can connect right away. Requests are only answered once the server is served.
#[derive(Debug)]
pub struct CacheServer {
    listener: TcpListener,
    store: Arc<Store>,
}

impl CacheServer {
    /// Opens the store at `storage_path` and binds to `addr`.
    pub async fn bind(storage_path: &Path, addr: SocketAddr) -> Result<Self> {
        let store = Store::open(storage_path).await?;
        tracing::info!(
            "Loaded {} entries from {}",
            store.count().await,
            store.path().display()
        );
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind to {addr}"))?;

        Ok(Self {
            listener,
            store: Arc::new(store),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    fn app(&self) -> Router {
        endpoints::create_app(Arc::clone(&self.store))
    }

    /// Serves requests until the process is stopped.
    pub async fn serve(self) -> io::Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serves requests until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.app();
        axum::serve(self.listener, app)
            .with_graceful_shutdown(signal)
            .await
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(
            error = &err as &dyn std::error::Error,
            "Failed to listen for the shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Runs the cache server on a single-threaded runtime, storing entries in `db_path`.
pub fn run(db_path: &Path, port: u16) -> Result<()> {
    // Log this metric before actually starting the server. This allows to see restarts even if
    // opening the store fails.
    metric!(counter("server.starting") += 1);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let server = CacheServer::bind(db_path, addr).await?;
        tracing::info!("Cache server started at port {}.", server.local_addr()?.port());

        server.serve_with_shutdown(shutdown_signal()).await?;
        tracing::info!("System shutdown complete");
        Ok::<_, anyhow::Error>(())
    })
}
