use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OAuth2Error, OAuth2Result};

/// Keyed bag of JSON values attached to tokens (`parameters`, `metadatas`)
///
/// Parameters are returned to the client with the token; metadatas stay on
/// the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataBag(BTreeMap<String, Value>);

impl DataBag {
    /// Create an empty bag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is present
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// The value at `key`
    ///
    /// # Errors
    ///
    /// Returns an internal error when the key is absent; callers are expected
    /// to check with [`has`](Self::has) first.
    pub fn get(&self, key: &str) -> OAuth2Result<&Value> {
        self.0
            .get(key)
            .ok_or_else(|| OAuth2Error::internal(format!("The value with key \"{key}\" does not exist.")))
    }

    /// The value at `key` if present
    #[must_use]
    pub fn try_get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The string value at `key` if present and a string
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Insert in place (for bags under construction)
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Copy with `key` set
    #[must_use]
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut bag = self.clone();
        bag.insert(key, value);
        bag
    }

    /// Copy with `key` removed
    #[must_use]
    pub fn without(&self, key: &str) -> Self {
        let mut bag = self.clone();
        bag.0.remove(key);
        bag
    }

    /// Merge another bag, its values winning
    pub fn extend(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Whether the bag is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for DataBag {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key_fails() {
        let bag = DataBag::new().with("token_type", "Bearer");

        assert!(bag.has("token_type"));
        assert_eq!(bag.get("token_type").unwrap(), "Bearer");
        assert!(bag.get("redirect_uri").unwrap_err().is_internal());
        assert_eq!(bag.try_get("redirect_uri"), None);
    }

    #[test]
    fn test_copy_on_write() {
        let original = DataBag::new().with("a", 1);
        let changed = original.with("b", 2).without("a");

        assert!(original.has("a"));
        assert!(!original.has("b"));
        assert!(!changed.has("a"));
        assert!(changed.has("b"));
    }
}
