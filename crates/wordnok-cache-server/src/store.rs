//! Durable key/value storage backing the cache server.
//!
//! Entries are kept in an append-only log of JSON lines, one `{"key": ..., "value": ...}` record
//! per line. The log is replayed into memory when the store is opened, where later records for a
//! key replace earlier ones.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

#[derive(Debug, Serialize, Deserialize)]
struct Record<'a> {
    key: Cow<'a, str>,
    value: Cow<'a, str>,
}

#[derive(Debug)]
struct StoreInner {
    file: File,
    entries: HashMap<String, String>,
    /// A failed write left bytes behind that could not be truncated.
    torn: bool,
}

impl StoreInner {
    /// Appends `line` and syncs it to disk.
    async fn append(&mut self, line: &[u8]) -> Result<()> {
        if self.torn {
            // leftovers of the failed write become a malformed line of their own
            self.file.write_all(b"\n").await?;
            self.torn = false;
        }
        self.file
            .write_all(line)
            .await
            .context("failed to write entry")?;
        self.file.flush().await?;
        self.file
            .sync_data()
            .await
            .context("failed to sync storage file")
    }

    /// Cuts the file back to `len` bytes after a failed [`append`](Self::append).
    async fn truncate(&mut self, len: u64) {
        if let Err(err) = self.file.set_len(len).await {
            tracing::warn!(
                error = &err as &dyn std::error::Error,
                "Failed to remove partially written record",
            );
            self.torn = true;
        }
    }
}

/// A persistent map of cache keys to serialized values.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    inner: RwLock<StoreInner>,
}

impl Store {
    /// Opens the store at `path`, creating the file if it does not exist yet.
    pub async fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open storage file {}", path.display()))?;

        let contents = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read storage file {}", path.display()))?;

        // a torn last line must not swallow the next record
        if contents.last().is_some_and(|&b| b != b'\n') {
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        let entries = replay(&contents);

        Ok(Self {
            path: path.to_owned(),
            inner: RwLock::new(StoreInner {
                file,
                entries,
                torn: false,
            }),
        })
    }

    /// The path of the storage file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.entries.get(key).cloned()
    }

    /// Durably stores `value` under `key`, replacing any previous value.
    ///
    /// Once this returns, the record has been synced to disk and is visible to every [`get`].
    /// A failed write leaves both the file and the entries as they were.
    ///
    /// [`get`]: Self::get
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        let record = Record {
            key: Cow::Borrowed(key),
            value: Cow::Borrowed(value),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut inner = self.inner.write().await;
        let len = inner
            .file
            .metadata()
            .await
            .context("failed to read storage file size")?
            .len();
        if let Err(err) = inner.append(&line).await {
            inner.truncate(len).await;
            return Err(err);
        }

        inner.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    /// The number of distinct keys.
    pub async fn count(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}

/// Rebuilds the entries from the raw contents of a storage file.
fn replay(contents: &[u8]) -> HashMap<String, String> {
    let mut entries = HashMap::new();

    for (index, line) in contents.split(|&b| b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Record>(line) {
            Ok(record) => {
                entries.insert(record.key.into_owned(), record.value.into_owned());
            }
            Err(err) => {
                tracing::warn!(
                    error = &err as &dyn std::error::Error,
                    "Skipping malformed record on line {}",
                    index + 1,
                );
            }
        }
    }

    entries
}
