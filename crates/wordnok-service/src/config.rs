use std::fs;
use std::io::Read;
use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Error;

/// The public Wordnik API root.
pub const DEFAULT_API_BASE: &str = "http://api.wordnik.com/v4/";

fn default_api_base() -> Url {
    // this is a constant, valid URL
    Url::parse(DEFAULT_API_BASE).unwrap()
}

/// Configuration of the lookup client and its memoization layer.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The Wordnik API key, sent along with every request.
    pub api_key: String,

    /// The root URL of the Wordnik API.
    pub api_base: Url,

    /// Host of a running cache server.
    pub cache_host: String,

    /// Port of a running cache server.
    ///
    /// When this is not set, lookups are not memoized at all.
    pub cache_port: Option<u16>,

    /// The number of random words to try before giving up on finding an acceptable topic.
    ///
    /// A value of `None` keeps trying forever.
    pub max_topic_attempts: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: String::new(),
            api_base: default_api_base(),
            cache_host: "127.0.0.1".to_owned(),
            cache_port: None,
            max_topic_attempts: None,
        }
    }
}

/// Loads a YAML configuration file, or returns the defaults if no `path` is given.
///
/// Empty files are rejected, unknown fields are ignored.
pub fn load_yaml<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open configuration file {}", path.display()))?;
    parse_yaml(file)
}

/// Parses a YAML configuration from `reader`.
pub fn parse_yaml<T: DeserializeOwned>(mut reader: impl Read) -> Result<T> {
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .context("failed reading config file")?;
    if contents.trim().is_empty() {
        anyhow::bail!("config file empty");
    }
    serde_yaml::from_str(&contents).context("failed to parse config YAML")
}

impl Config {
    pub fn get(path: Option<&Path>) -> Result<Self> {
        load_yaml(path)
    }

    /// Returns the root URL of the configured cache server, if any.
    ///
    /// IP literals, including IPv6 ones, may be given without brackets.
    pub fn cache_server_url(&self) -> crate::Result<Option<Url>> {
        let Some(port) = self.cache_port else {
            return Ok(None);
        };

        // this is a constant, valid URL
        let mut url = Url::parse("http://127.0.0.1/").unwrap();
        match self.cache_host.parse::<IpAddr>() {
            Ok(ip) => url.set_ip_host(ip),
            Err(_) => url.set_host(Some(&self.cache_host)).map_err(|_| ()),
        }
        .and_then(|()| url.set_port(Some(port)))
        .map_err(|()| Error::InvalidCacheServer(format!("{}:{port}", self.cache_host)))?;

        Ok(Some(url))
    }
}
