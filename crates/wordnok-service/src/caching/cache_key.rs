use std::fmt::{self, Write};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// The key under which the result of a memoized call is stored.
///
/// It is derived from the name of the called function and a stable serialization of its
/// arguments, which are hashed to form a fixed-size, opaque key.
#[derive(Debug, Clone, Eq)]
pub struct CacheKey {
    metadata: Arc<str>,
    hash: [u8; 32],
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.hash {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl std::hash::Hash for CacheKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl CacheKey {
    /// Creates the [`CacheKey`] for calling `function` with `args`.
    ///
    /// Arguments are serialized to JSON. Multiple arguments should be passed as a tuple, as
    /// argument order is part of the key. Maps should be `BTreeMap`s so that equal arguments
    /// always serialize identically.
    pub fn for_call<A: Serialize + ?Sized>(function: &str, args: &A) -> Result<Self> {
        let mut builder = CacheKey::builder(function);
        builder.write_args(args)?;
        Ok(builder.build())
    }

    /// Create a [`CacheKeyBuilder`] for calls to `function`.
    pub fn builder(function: &str) -> CacheKeyBuilder {
        CacheKeyBuilder {
            metadata: format!("function: {function}\n"),
        }
    }

    /// The text the key was hashed from, for logging and debugging.
    pub fn metadata(&self) -> &str {
        &self.metadata
    }
}

/// Collects the text a [`CacheKey`] is hashed from.
///
/// Anything written into it must be stable across processes and releases, otherwise entries
/// persisted by one process are never found by the next.
#[derive(Debug)]
pub struct CacheKeyBuilder {
    metadata: String,
}

impl CacheKeyBuilder {
    /// Writes the serialized arguments of a call into the [`CacheKey`].
    pub fn write_args<A: Serialize + ?Sized>(&mut self, args: &A) -> Result<()> {
        let args = serde_json::to_string(args)?;
        // writing into a `String` can not fail
        let _ = writeln!(self.metadata, "arguments: {args}");
        Ok(())
    }

    /// Hashes the collected text.
    pub fn build(self) -> CacheKey {
        let hash: [u8; 32] = Sha256::digest(&self.metadata).into();

        CacheKey {
            metadata: self.metadata.into(),
            hash,
        }
    }
}

impl fmt::Write for CacheKeyBuilder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.metadata.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_key_metadata() {
        let key = CacheKey::for_call("getPartsOfSpeech", "students").unwrap();
        insta::assert_snapshot!(key.metadata(), @r#"
        function: getPartsOfSpeech
        arguments: "students"
        "#);

        let mut params = BTreeMap::new();
        params.insert("limit", "5");
        params.insert("api_key", "ignored");
        let key = CacheKey::for_call("getDefinitions", &("cat", &params)).unwrap();
        insta::assert_snapshot!(key.metadata(), @r#"
        function: getDefinitions
        arguments: ["cat",{"api_key":"ignored","limit":"5"}]
        "#);
    }

    #[test]
    fn test_keys_are_stable() {
        let a = CacheKey::for_call("getWordFrequency", "cat").unwrap();
        let b = CacheKey::for_call("getWordFrequency", "cat").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.to_string().len(), 64);
        assert!(a.to_string().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_keys_differ() {
        let cat = CacheKey::for_call("getWordFrequency", "cat").unwrap();
        let dog = CacheKey::for_call("getWordFrequency", "dog").unwrap();
        let other_fn = CacheKey::for_call("canonicalize", "cat").unwrap();
        assert_ne!(cat, dog);
        assert_ne!(cat, other_fn);

        // argument order matters
        let ab = CacheKey::for_call("f", &("a", "b")).unwrap();
        let ba = CacheKey::for_call("f", &("b", "a")).unwrap();
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_builder_matches_for_call() {
        let mut builder = CacheKey::builder("f");
        builder.write_args(&(1, "two")).unwrap();
        let built = builder.build();

        assert_eq!(built, CacheKey::for_call("f", &(1, "two")).unwrap());
    }

    #[test]
    fn test_unserializable_args() {
        // JSON object keys must be strings
        let mut args = BTreeMap::new();
        args.insert((1, 2), "tuple keys");

        let err = CacheKey::for_call("f", &args).unwrap_err();
        assert!(matches!(err, crate::Error::Serialization(_)));
    }
}
