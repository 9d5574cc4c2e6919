//! Access to a running cache server.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{Error, Result};

/// A durable key-value store backing the [`Memoizer`](super::Memoizer).
///
/// Keys and values are opaque strings. A missing key is not an error, but `Ok(None)`.
#[async_trait]
pub trait CacheBackend: fmt::Debug + Send + Sync {
    /// Looks up the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`.
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// A [`CacheBackend`] talking to a cache server over HTTP.
///
/// Entries live at `/entries/{key}` on the server, and are read with `GET` and written with `PUT`.
#[derive(Debug, Clone)]
pub struct CacheClient {
    client: Client,
    base: Url,
}

impl CacheClient {
    /// Creates a client for the cache server rooted at `base`.
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Creates a client for a cache server listening on `port` of the local machine.
    pub fn local(client: Client, port: u16) -> Result<Self> {
        let base = format!("http://127.0.0.1:{port}/")
            .parse()
            .map_err(|e: url::ParseError| Error::Internal(e.to_string()))?;
        Ok(Self::new(client, base))
    }

    fn entry_url(&self, key: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Internal(format!("invalid cache server url: {}", self.base)))?
            .pop_if_empty()
            .push("entries")
            .push(key);
        Ok(url)
    }
}

#[async_trait]
impl CacheBackend for CacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let url = self.entry_url(key)?;
        tracing::trace!("Looking up cache entry at `{}`", url);

        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.text().await?)),
            status => Err(Error::CacheServer(status.to_string())),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let url = self.entry_url(key)?;
        tracing::trace!("Storing cache entry at `{}`", url);

        let response = self
            .client
            .put(url)
            .body(value.to_owned())
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(Error::CacheServer(status.to_string())),
        }
    }
}
