use thiserror::Error;

/// An error that happens while looking up words or talking to the cache server.
///
/// The error is [`Clone`], as a single outcome of a memoized computation is handed out to all the
/// callers that were waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A request could not be sent or its response could not be received.
    ///
    /// This covers connection loss, DNS resolution and similar problems, both towards the
    /// upstream word service and towards the cache server.
    #[error("transport error: {0}")]
    Transport(String),
    /// The cache server responded, but with an unexpected status.
    #[error("cache server error: {0}")]
    CacheServer(String),
    /// The upstream replied with a body that could not be decoded.
    #[error("received unparseable response from {url}")]
    Unparseable { url: String },
    /// Arguments or results could not be turned into a stable cache key or value, or a cached
    /// value could not be turned back into a result.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// The lookup client was created without an API key.
    #[error("the Wordnik API key is missing")]
    MissingApiKey,
    /// A per-word lookup was called without a word.
    #[error("no word provided")]
    MissingWord,
    /// No acceptable topic was found within the configured number of attempts.
    #[error("no acceptable topic after {0} attempts")]
    TopicExhausted(usize),
    /// The configured cache server host and port do not form a valid URL.
    #[error("invalid cache server address: {0}")]
    InvalidCacheServer(String),
    /// An unexpected error in wordnok itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> Self {
        let dynerr: &dyn std::error::Error = &err; // tracing expects a `&dyn Error`
        tracing::error!(error = dynerr, "lookup task did not finish");
        Self::Internal(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
