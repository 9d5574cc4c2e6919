//! Word lookups, optionally memoized.
//!
//! [`WordnikClient`] talks to the Wordnik API directly. [`Wordnok`] wraps it and routes every
//! lookup that is declared memoizable through a [`Memoizer`].

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::batch::run_batch;
use crate::caching::Memoizer;
use crate::config::Config;
use crate::error::Result;

mod client;
pub mod types;

pub use client::{Params, USER_AGENT, WordnikClient, create_client};

/// Decides which random words are acceptable.
///
/// Random lookups skip words that are not acceptable, e.g. offensive ones.
pub trait WordFilter: fmt::Debug + Send + Sync {
    fn is_acceptable(&self, word: &str) -> bool;
}

/// A [`WordFilter`] that accepts every word.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl WordFilter for AcceptAll {
    fn is_acceptable(&self, _word: &str) -> bool {
        true
    }
}

/// Every lookup the [`Wordnok`] facade offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Topic,
    RandomWords,
    PartsOfSpeech,
    WordFrequency,
    RelatedWords,
    Canonicalize,
    Definitions,
}

/// Whether the result of each [`Operation`] may be memoized.
///
/// Random lookups are expected to return something new on every call.
pub const OPERATIONS: &[(Operation, bool)] = &[
    (Operation::Topic, false),
    (Operation::RandomWords, false),
    (Operation::PartsOfSpeech, true),
    (Operation::WordFrequency, true),
    (Operation::RelatedWords, true),
    (Operation::Canonicalize, true),
    (Operation::Definitions, true),
];

impl Operation {
    /// The function name the results of this operation are memoized under.
    pub fn name(self) -> &'static str {
        match self {
            Operation::Topic => "getTopic",
            Operation::RandomWords => "getRandomWords",
            Operation::PartsOfSpeech => "getPartsOfSpeech",
            Operation::WordFrequency => "getWordFrequency",
            Operation::RelatedWords => "getRelatedWords",
            Operation::Canonicalize => "canonicalize",
            Operation::Definitions => "getDefinitions",
        }
    }

    pub fn is_memoizable(self) -> bool {
        OPERATIONS
            .iter()
            .any(|&(op, memoizable)| op == self && memoizable)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Word lookups against Wordnik, memoized where possible.
#[derive(Clone, Debug)]
pub struct Wordnok {
    client: WordnikClient,
    memoizer: Memoizer,
}

impl Wordnok {
    pub fn new(client: WordnikClient, memoizer: Memoizer) -> Self {
        Self { client, memoizer }
    }

    /// Creates the lookup client and its memoizer from the `config`.
    pub fn from_config(config: &Config, filter: Arc<dyn WordFilter>) -> Result<Self> {
        let http = create_client()?;
        let client = WordnikClient::new(config, http.clone(), filter)?;
        let memoizer = Memoizer::from_config(config, http)?;
        Ok(Self::new(client, memoizer))
    }

    pub fn client(&self) -> &WordnikClient {
        &self.client
    }

    pub fn memoizer(&self) -> &Memoizer {
        &self.memoizer
    }

    /// Runs `lookup` for `op`, through the memoizer if the operation allows it.
    async fn call<A, R, F, Fut>(&self, op: Operation, args: &A, lookup: F) -> Result<R>
    where
        A: serde::Serialize + ?Sized,
        R: serde::Serialize + serde::de::DeserializeOwned + Send + 'static,
        F: FnOnce(WordnikClient) -> Fut,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let client = self.client.clone();
        if op.is_memoizable() {
            self.memoizer
                .memoize(op.name(), args, move || lookup(client))
                .await
        } else {
            lookup(client).await
        }
    }

    pub async fn get_topic(&self) -> Result<String> {
        self.call(Operation::Topic, &(), |client| async move {
            client.get_topic().await
        })
        .await
    }

    pub async fn get_random_words(&self, custom: &Params) -> Result<Vec<String>> {
        let params = custom.clone();
        self.call(Operation::RandomWords, &(custom,), |client| async move {
            client.get_random_words(&params).await
        })
        .await
    }

    pub async fn get_parts_of_speech(&self, word: &str) -> Result<Vec<String>> {
        let owned = word.to_owned();
        self.call(Operation::PartsOfSpeech, &(word,), |client| async move {
            client.get_parts_of_speech(&owned).await
        })
        .await
    }

    pub async fn get_word_frequency(&self, word: &str) -> Result<u64> {
        let owned = word.to_owned();
        self.call(Operation::WordFrequency, &(word,), |client| async move {
            client.get_word_frequency(&owned).await
        })
        .await
    }

    pub async fn get_related_words(
        &self,
        word: &str,
        custom: &Params,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let (owned, params) = (word.to_owned(), custom.clone());
        self.call(
            Operation::RelatedWords,
            &(word, custom),
            |client| async move { client.get_related_words(&owned, &params).await },
        )
        .await
    }

    pub async fn canonicalize(&self, word: &str) -> Result<String> {
        let owned = word.to_owned();
        self.call(Operation::Canonicalize, &(word,), |client| async move {
            client.canonicalize(&owned).await
        })
        .await
    }

    pub async fn get_definitions(&self, word: &str, custom: &Params) -> Result<Vec<String>> {
        let (owned, params) = (word.to_owned(), custom.clone());
        self.call(
            Operation::Definitions,
            &(word, custom),
            |client| async move { client.get_definitions(&owned, &params).await },
        )
        .await
    }

    /// Looks up the parts of speech of all `words` concurrently.
    ///
    /// Fails as soon as any single lookup fails.
    pub async fn get_parts_of_speech_for_multiple_words<I, S>(
        &self,
        words: I,
    ) -> Result<Vec<Vec<String>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let this = self.clone();
        run_batch(
            move |word: String| {
                let this = this.clone();
                async move { this.get_parts_of_speech(&word).await }
            },
            words.into_iter().map(Into::into),
        )
        .await
    }

    /// Looks up the frequencies of all `words` concurrently.
    ///
    /// Fails as soon as any single lookup fails.
    pub async fn get_word_frequencies<I, S>(&self, words: I) -> Result<Vec<u64>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let this = self.clone();
        run_batch(
            move |word: String| {
                let this = this.clone();
                async move { this.get_word_frequency(&word).await }
            },
            words.into_iter().map(Into::into),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use axum::Json;
    use axum::Router;
    use axum::extract::Path;
    use axum::routing::get;
    use serde_json::{Value, json};
    use wordnok_test::HitCounter;

    use crate::Error;

    use super::*;

    #[test]
    fn test_memoizable_operations() {
        let memoizable: Vec<_> = OPERATIONS
            .iter()
            .filter(|(op, _)| op.is_memoizable())
            .map(|(op, _)| op.name())
            .collect();
        assert_eq!(
            memoizable,
            [
                "getPartsOfSpeech",
                "getWordFrequency",
                "getRelatedWords",
                "canonicalize",
                "getDefinitions"
            ]
        );
        assert!(!Operation::Topic.is_memoizable());
        assert!(!Operation::RandomWords.is_memoizable());
    }

    fn wordnik_server() -> HitCounter {
        async fn definitions(Path(word): Path<String>) -> Json<Value> {
            Json(match word.as_str() {
                "cat" => json!([
                    {"partOfSpeech": "noun", "text": "A small carnivore."},
                    {"partOfSpeech": "verb", "text": "archaic   To hoist an anchor."},
                ]),
                _ => json!([{"partOfSpeech": "noun"}]),
            })
        }

        async fn frequency(Path(word): Path<String>) -> Json<Value> {
            Json(match word.as_str() {
                "cat" => json!({"totalCount": 599}),
                "dog" => json!({"totalCount": 1105}),
                _ => json!({}),
            })
        }

        let router = Router::new()
            .route("/v4/word.json/{word}/definitions", get(definitions))
            .route("/v4/word.json/{word}/frequency", get(frequency))
            .route("/v4/word.json/{word}/broken", get(|| async { "nope" }))
            .route(
                "/v4/words.json/randomWord",
                get(|| async { Json(json!({"word": "plinth"})) }),
            );

        HitCounter::new(router)
    }

    fn config(server: &HitCounter, cache: Option<&wordnok_test::Server>) -> Config {
        Config {
            api_key: "secret".into(),
            api_base: server.url("v4/"),
            cache_port: cache.map(|c| c.port()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_passthrough_hits_upstream_every_time() {
        wordnok_test::setup();
        let server = wordnik_server();
        let wordnok = Wordnok::from_config(&config(&server, None), Arc::new(AcceptAll)).unwrap();
        assert!(!wordnok.memoizer().is_enabled());

        for _ in 0..3 {
            let parts = wordnok.get_parts_of_speech("cat").await.unwrap();
            assert_eq!(parts, ["noun", "verb"]);
        }
        assert_eq!(server.hits("/v4/word.json/cat/definitions"), 3);
    }

    #[tokio::test]
    async fn test_memoized_lookups_hit_upstream_once() {
        wordnok_test::setup();
        let server = wordnik_server();
        let cache = wordnok_test::memory_cache_server();
        let wordnok =
            Wordnok::from_config(&config(&server, Some(&cache)), Arc::new(AcceptAll)).unwrap();
        assert!(wordnok.memoizer().is_enabled());

        for _ in 0..3 {
            let parts = wordnok.get_parts_of_speech("cat").await.unwrap();
            assert_eq!(parts, ["noun", "verb"]);
        }
        assert_eq!(server.hits("/v4/word.json/cat/definitions"), 1);

        // a separate memoizer, as in a new process, is served from the cache server
        let wordnok =
            Wordnok::from_config(&config(&server, Some(&cache)), Arc::new(AcceptAll)).unwrap();
        let parts = wordnok.get_parts_of_speech("cat").await.unwrap();
        assert_eq!(parts, ["noun", "verb"]);
        assert_eq!(server.hits("/v4/word.json/cat/definitions"), 1);
    }

    #[tokio::test]
    async fn test_custom_params_are_part_of_the_key() {
        wordnok_test::setup();
        let server = wordnik_server();
        let cache = wordnok_test::memory_cache_server();
        let wordnok =
            Wordnok::from_config(&config(&server, Some(&cache)), Arc::new(AcceptAll)).unwrap();

        let defaults = Params::new();
        let limited: Params = [("limit".to_owned(), "1".to_owned())].into();

        for _ in 0..2 {
            let texts = wordnok.get_definitions("cat", &defaults).await.unwrap();
            assert_eq!(texts, ["A small carnivore.", "To hoist an anchor."]);
        }
        assert_eq!(server.hits("/v4/word.json/cat/definitions"), 1);

        wordnok.get_definitions("cat", &limited).await.unwrap();
        wordnok.get_definitions("cat", &limited).await.unwrap();
        assert_eq!(server.hits("/v4/word.json/cat/definitions"), 2);

        // the parts of speech of the same word are memoized separately
        let parts = wordnok.get_parts_of_speech("cat").await.unwrap();
        assert_eq!(parts, ["noun", "verb"]);
        assert_eq!(server.hits("/v4/word.json/cat/definitions"), 3);
    }

    #[tokio::test]
    async fn test_topics_are_never_memoized() {
        wordnok_test::setup();
        let server = wordnik_server();
        let cache = wordnok_test::memory_cache_server();
        let wordnok =
            Wordnok::from_config(&config(&server, Some(&cache)), Arc::new(AcceptAll)).unwrap();

        assert_eq!(wordnok.get_topic().await.unwrap(), "plinth");
        assert_eq!(wordnok.get_topic().await.unwrap(), "plinth");
        assert_eq!(server.hits("/v4/words.json/randomWord"), 2);
    }

    #[tokio::test]
    async fn test_batch_lookups() {
        wordnok_test::setup();
        let server = wordnik_server();
        let cache = wordnok_test::memory_cache_server();
        let wordnok =
            Wordnok::from_config(&config(&server, Some(&cache)), Arc::new(AcceptAll)).unwrap();

        let frequencies = wordnok
            .get_word_frequencies(["cat", "dog", "cat"])
            .await
            .unwrap();
        assert_eq!(frequencies, [599, 1105, 599]);

        let parts = wordnok
            .get_parts_of_speech_for_multiple_words(vec!["cat".to_owned(), "dog".to_owned()])
            .await
            .unwrap();
        assert_eq!(parts, [vec!["noun", "verb"], vec!["noun"]]);

        // concurrent lookups of `cat` were coalesced or served from the cache
        assert_eq!(server.hits("/v4/word.json/cat/frequency"), 1);
        assert_eq!(server.hits("/v4/word.json/dog/frequency"), 1);
    }

    #[tokio::test]
    async fn test_batch_fails_on_first_error() {
        wordnok_test::setup();
        let server = wordnik_server();
        let wordnok = Wordnok::from_config(&config(&server, None), Arc::new(AcceptAll)).unwrap();

        let err = wordnok
            .get_parts_of_speech_for_multiple_words(["cat", ""])
            .await
            .unwrap_err();
        assert_eq!(err, Error::MissingWord);
    }
}
