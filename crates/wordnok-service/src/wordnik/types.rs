//! Replies of the Wordnik API, and how they are boiled down to lookup results.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// The frequency reported for words that Wordnik has no count for.
pub const UNKNOWN_FREQUENCY: u64 = 9_999_999;

/// Matches dictionary classifications like `"archaic   "` in front of definitions.
static CLASSIFICATION_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+\s\s\s").unwrap());

/// A single word, as returned by `randomWord`, `randomWords` and the canonicalizing word lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct WordReply {
    pub word: String,
}

/// One entry of a `definitions` reply.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionReply {
    pub part_of_speech: Option<String>,
    pub text: Option<String>,
}

/// A `frequency` reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyReply {
    #[serde(default)]
    pub total_count: serde_json::Value,
}

/// One relationship group of a `relatedWords` reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedWordsReply {
    pub relationship_type: String,
    #[serde(default)]
    pub words: Vec<String>,
}

/// Collects the distinct parts of speech, in the order they first appear.
pub fn parts_of_speech(definitions: Vec<DefinitionReply>) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for part in definitions.into_iter().filter_map(|d| d.part_of_speech) {
        if !part.is_empty() && !parts.contains(&part) {
            parts.push(part);
        }
    }
    parts
}

/// Returns the total count of a frequency reply, or [`UNKNOWN_FREQUENCY`].
///
/// Any JSON number counts. Fractions are truncated and negative numbers clamp to zero.
pub fn total_count(reply: &FrequencyReply, word: &str) -> u64 {
    let count = reply.total_count.as_u64().or_else(|| {
        let count = reply.total_count.as_f64()?;
        Some(count as u64)
    });
    match count {
        Some(count) => count,
        None => {
            tracing::info!("Got word frequency without totalCount for: {}", word);
            UNKNOWN_FREQUENCY
        }
    }
}

/// Maps each relationship type to its words.
///
/// Wordnik does not send the same relationship type twice. If it did, the last group wins.
pub fn arrange_related_words(groups: Vec<RelatedWordsReply>) -> BTreeMap<String, Vec<String>> {
    groups
        .into_iter()
        .map(|group| (group.relationship_type, group.words))
        .collect()
}

/// Returns the texts of all usable definitions, stripped of their classification prefix.
///
/// Definitions that merely point to another word ("See ...") are not usable.
pub fn usable_definitions(definitions: Vec<DefinitionReply>) -> Vec<String> {
    definitions
        .into_iter()
        .filter_map(|d| d.text)
        .filter(|text| !text.starts_with("See "))
        .map(|text| CLASSIFICATION_PREFIX.replace(&text, "").into_owned())
        .collect()
}
