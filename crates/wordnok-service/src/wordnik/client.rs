//! Lookups against the Wordnik HTTP API.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};

use super::WordFilter;
use super::types::{
    self, DefinitionReply, FrequencyReply, RelatedWordsReply, WordReply,
};

/// Custom query parameters, overriding the defaults of a lookup.
pub type Params = BTreeMap<String, String>;

const RANDOM_WORD_PARAMS: &[(&str, &str)] = &[
    ("hasDictionaryDef", "false"),
    ("includePartOfSpeech", "noun"),
    ("excludePartOfSpeech", "proper-noun"),
    ("minCorpusCount", "0"),
    ("maxCorpusCount", "-1"),
    ("minDictionaryCount", "1"),
    ("maxDictionaryCount", "-1"),
    ("minLength", "2"),
    ("maxLength", "120"),
];

const RANDOM_WORDS_PARAMS: &[(&str, &str)] = &[
    ("hasDictionaryDef", "false"),
    ("includePartOfSpeech", "noun"),
    ("minCorpusCount", "250"),
    ("maxCorpusCount", "-1"),
    ("minDictionaryCount", "1"),
    ("maxDictionaryCount", "-1"),
    ("minLength", "5"),
    ("maxLength", "-1"),
    ("limit", "10"),
];

const PARTS_OF_SPEECH_PARAMS: &[(&str, &str)] = &[
    ("includeRelated", "false"),
    ("useCanonical", "false"),
    ("includeTags", "false"),
];

const FREQUENCY_PARAMS: &[(&str, &str)] = &[
    ("useCanonical", "false"),
    ("startYear", "2003"),
    ("endYear", "2012"),
];

const CANONICALIZE_PARAMS: &[(&str, &str)] =
    &[("useCanonical", "true"), ("includeSuggestions", "false")];

const RELATED_WORDS_PARAMS: &[(&str, &str)] = &[
    ("useCanonical", "true"),
    ("limitPerRelationshipType", "10"),
];

const DEFINITIONS_PARAMS: &[(&str, &str)] = &[
    ("useCanonical", "false"),
    ("limit", "10"),
    ("includeRelated", "false"),
];

/// The `User-Agent` sent along with every request.
pub const USER_AGENT: &str = concat!("wordnok/", env!("CARGO_PKG_VERSION"));

/// Creates the HTTP client used for all lookups.
pub fn create_client() -> Result<Client> {
    Ok(Client::builder().user_agent(USER_AGENT).build()?)
}

/// A client for the Wordnik API.
///
/// Every lookup is a single request, without any caching. See [`Wordnok`](super::Wordnok) for
/// memoized lookups.
#[derive(Clone)]
pub struct WordnikClient {
    client: Client,
    api_base: Url,
    api_key: Arc<str>,
    filter: Arc<dyn WordFilter>,
    max_topic_attempts: Option<usize>,
}

impl fmt::Debug for WordnikClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordnikClient")
            .field("api_base", &self.api_base.as_str())
            .field("max_topic_attempts", &self.max_topic_attempts)
            .finish_non_exhaustive()
    }
}

impl WordnikClient {
    /// Creates a new client.
    ///
    /// Words returned by random lookups are checked against `filter`.
    pub fn new(config: &Config, client: Client, filter: Arc<dyn WordFilter>) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::MissingApiKey);
        }

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.as_str().into(),
            filter,
            max_topic_attempts: config.max_topic_attempts,
        })
    }

    /// Finds a random noun to be used as a topic.
    ///
    /// Words not accepted by the filter are skipped, and another one is requested.
    pub async fn get_topic(&self) -> Result<String> {
        let url = self.words_url("randomWord")?;
        let params = self.params(RANDOM_WORD_PARAMS, None);

        let mut attempts = 0;
        loop {
            attempts += 1;
            let reply: WordReply = self.fetch(url.clone(), &params).await?;
            if self.filter.is_acceptable(&reply.word) {
                return Ok(reply.word);
            }
            tracing::debug!("Rejected topic candidate `{}`", reply.word);

            if self.max_topic_attempts.is_some_and(|max| attempts >= max) {
                return Err(Error::TopicExhausted(attempts));
            }
        }
    }

    /// Fetches a batch of random words, dropping those not accepted by the filter.
    pub async fn get_random_words(&self, custom: &Params) -> Result<Vec<String>> {
        let url = self.words_url("randomWords")?;
        let params = self.params(RANDOM_WORDS_PARAMS, Some(custom));

        let reply: Vec<WordReply> = self.fetch(url, &params).await?;
        Ok(reply
            .into_iter()
            .map(|w| w.word)
            .filter(|word| self.filter.is_acceptable(word))
            .collect())
    }

    /// Returns the distinct parts of speech of a word.
    pub async fn get_parts_of_speech(&self, word: &str) -> Result<Vec<String>> {
        let url = self.word_url(word, Some("definitions"))?;
        let params = self.params(PARTS_OF_SPEECH_PARAMS, None);

        let reply: Vec<DefinitionReply> = self.fetch(url, &params).await?;
        Ok(types::parts_of_speech(reply))
    }

    /// Returns how often a word occurred in the corpus between 2003 and 2012.
    pub async fn get_word_frequency(&self, word: &str) -> Result<u64> {
        let url = self.word_url(word, Some("frequency"))?;
        let params = self.params(FREQUENCY_PARAMS, None);

        let reply: FrequencyReply = self.fetch(url, &params).await?;
        Ok(types::total_count(&reply, word))
    }

    /// Returns the words related to a word, by relationship type.
    pub async fn get_related_words(
        &self,
        word: &str,
        custom: &Params,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let url = self.word_url(word, Some("relatedWords"))?;
        let params = self.params(RELATED_WORDS_PARAMS, Some(custom));

        let reply: Vec<RelatedWordsReply> = self.fetch(url, &params).await?;
        Ok(types::arrange_related_words(reply))
    }

    /// Returns the canonical form of a word.
    pub async fn canonicalize(&self, word: &str) -> Result<String> {
        let url = self.word_url(word, None)?;
        let params = self.params(CANONICALIZE_PARAMS, None);

        let reply: WordReply = self.fetch(url, &params).await?;
        Ok(reply.word)
    }

    /// Returns the usable definitions of a word.
    pub async fn get_definitions(&self, word: &str, custom: &Params) -> Result<Vec<String>> {
        let url = self.word_url(word, Some("definitions"))?;
        let params = self.params(DEFINITIONS_PARAMS, Some(custom));

        let reply: Vec<DefinitionReply> = self.fetch(url, &params).await?;
        Ok(types::usable_definitions(reply))
    }

    /// Merges `custom` parameters over the `defaults`, and adds the API key.
    fn params(&self, defaults: &[(&str, &str)], custom: Option<&Params>) -> Params {
        let mut params: Params = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(custom) = custom {
            params.extend(custom.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        params.insert("api_key".into(), self.api_key.to_string());
        params
    }

    /// `{api_base}/words.json/{endpoint}`
    fn words_url(&self, endpoint: &str) -> Result<Url> {
        self.endpoint_url(&["words.json", endpoint])
    }

    /// `{api_base}/word.json/{word}[/{endpoint}]`
    fn word_url(&self, word: &str, endpoint: Option<&str>) -> Result<Url> {
        if word.is_empty() {
            return Err(Error::MissingWord);
        }

        match endpoint {
            Some(endpoint) => self.endpoint_url(&["word.json", word, endpoint]),
            None => self.endpoint_url(&["word.json", word]),
        }
    }

    fn endpoint_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Internal(format!("invalid Wordnik API url: {}", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a `GET` request and decodes the JSON reply.
    async fn fetch<T: DeserializeOwned>(&self, url: Url, params: &Params) -> Result<T> {
        let request = self.client.get(url).query(params).build()?;
        let display_url = redact_api_key(request.url());
        tracing::debug!("Fetching `{}`", display_url);

        let body = self.client.execute(request).await?.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| {
            tracing::debug!(
                error = &err as &dyn std::error::Error,
                body = %String::from_utf8_lossy(&body),
                "Could not parse JSON from `{}`",
                display_url,
            );
            Error::Unparseable {
                url: display_url.into(),
            }
        })
    }
}

/// Renders `url` without its `api_key` query parameter, so it can be logged.
fn redact_api_key(url: &Url) -> Url {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "api_key")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        redacted.set_query(None);
    } else {
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
    }
    redacted
}
