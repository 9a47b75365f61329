//! Metric identity: tags, canonical cache keys, and registry ids.
//!
//! A [`MetricKey`] is the cache key used by the facade. Tag order never
//! matters: tags are sorted by key, and when the same key is supplied more
//! than once the last value wins. Two calls naming the same metric with the
//! same set of tags therefore always resolve to the same cache entry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A key/value label attached to a metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key (e.g., "cache").
    pub key: String,
    /// Tag value (e.g., "c1").
    pub value: String,
}

impl Tag {
    /// Create a new tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for Tag {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

/// Canonical cache key for a (name, tag set) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    name: String,
    /// Sorted by key, one entry per key.
    tags: Vec<Tag>,
}

impl MetricKey {
    /// Build a key from a metric name and a tag set.
    ///
    /// Fails with [`Error::InvalidArgument`] on an empty name or an empty
    /// tag key. Never touches a registry.
    pub fn new(name: &str, tags: &[Tag]) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "metric name must not be empty".to_string(),
            ));
        }
        if let Some(tag) = tags.iter().find(|t| t.key.trim().is_empty()) {
            return Err(Error::InvalidArgument(format!(
                "empty tag key (value {:?}) for metric {}",
                tag.value, name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            tags: canonicalize(tags.iter().cloned()),
        })
    }

    /// Build a key the way the facade does: any caller tag sharing the
    /// owner's key is dropped, since [`registry_tags`](Self::registry_tags)
    /// replaces it anyway. Keys that only differ in that tag are one entry.
    pub fn with_owner(name: &str, tags: &[Tag], owner: &Tag) -> Result<Self> {
        let mut key = Self::new(name, tags)?;
        key.tags.retain(|t| t.key != owner.key);
        Ok(key)
    }

    /// The metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical tags.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Tags to hand to the registry: the canonical tags plus `owner`.
    ///
    /// A caller-supplied tag with the owner's key is replaced, so every
    /// instrument is attributed to the owning subsystem.
    pub fn registry_tags(&self, owner: &Tag) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .tags
            .iter()
            .filter(|t| t.key != owner.key)
            .cloned()
            .collect();
        tags.push(owner.clone());
        tags
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_id(f, &self.name, &self.tags)
    }
}

/// Identity of an instrument inside a registry.
///
/// Unlike [`MetricKey`] this carries the full tag list handed to the
/// backend, including the owner tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricId {
    name: String,
    tags: Vec<Tag>,
}

impl MetricId {
    /// Create an id; tags are canonicalized the same way as cache keys.
    pub fn new(name: impl Into<String>, tags: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            name: name.into(),
            tags: canonicalize(tags),
        }
    }

    /// The metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All tags, including the owner tag.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Look up a tag value by key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_id(f, &self.name, &self.tags)
    }
}

/// Sort by key and keep the last value supplied for each key.
fn canonicalize(tags: impl IntoIterator<Item = Tag>) -> Vec<Tag> {
    let mut tags: Vec<Tag> = tags.into_iter().collect();
    // Stable sort keeps caller order within a key.
    tags.sort_by(|a, b| a.key.cmp(&b.key));

    let mut out: Vec<Tag> = Vec::with_capacity(tags.len());
    for tag in tags {
        match out.last_mut() {
            Some(last) if last.key == tag.key => *last = tag,
            _ => out.push(tag),
        }
    }
    out
}

fn write_id(f: &mut fmt::Formatter<'_>, name: &str, tags: &[Tag]) -> fmt::Result {
    f.write_str(name)?;
    if tags.is_empty() {
        return Ok(());
    }
    f.write_str("[")?;
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", tag)?;
    }
    f.write_str("]")
}
