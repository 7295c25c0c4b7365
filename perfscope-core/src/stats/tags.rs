//! Tags attached to recordings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key of a tag
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagKey(String);

impl TagKey {
    /// Create a tag key
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Key name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One key/value pair identifying a row of view data
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    /// Tag key
    pub key: TagKey,
    /// Tag value
    pub value: String,
}

impl Tag {
    /// Create a tag
    pub fn new(key: TagKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Set of tags in effect for a recording
///
/// # Examples
///
/// ```
/// use perfscope_core::stats::{TagKey, TagMap};
///
/// let method = TagKey::new("http_method");
/// let tags = TagMap::new().with(&method, "GET");
///
/// assert_eq!(tags.get(&method), Some("GET"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    tags: BTreeMap<TagKey, String>,
}

impl TagMap {
    /// Create an empty tag map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag, builder style
    pub fn with(mut self, key: &TagKey, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a tag
    pub fn insert(&mut self, key: &TagKey, value: impl Into<String>) {
        self.tags.insert(key.clone(), value.into());
    }

    /// Value for a key
    pub fn get(&self, key: &TagKey) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the map holds no tags
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate over tags in key order
    pub fn iter(&self) -> impl Iterator<Item = (&TagKey, &str)> {
        self.tags.iter().map(|(k, v)| (k, v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_value() {
        let key = TagKey::new("status");
        let mut tags = TagMap::new().with(&key, "OK");
        tags.insert(&key, "ERROR");

        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get(&key), Some("ERROR"));
    }

    #[test]
    fn test_iter_is_key_ordered() {
        let tags = TagMap::new()
            .with(&TagKey::new("b"), "2")
            .with(&TagKey::new("a"), "1");

        let keys: Vec<_> = tags.iter().map(|(k, _)| k.name().to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
