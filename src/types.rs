//! Core data types: metadata values, entries, and search results.
//!
//! Metadata is a typed map from string keys to a closed set of comparable
//! value kinds. Filters are maps of the same shape with equality-only
//! matching — no range queries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key that always holds the entry's RFC 3339 creation timestamp.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Metadata key that always holds the entry's source text.
pub const TEXT_KEY: &str = "text";

/// A single metadata value. The set of kinds is closed so filters stay
/// comparable; anything richer belongs in the caller's own serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl MetaValue {
    /// String payload, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Entry metadata. `BTreeMap` keeps serialized form and iteration stable.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Equality-only metadata filter.
pub type Filter = BTreeMap<String, MetaValue>;

/// `true` when every key in `filter` is present in `metadata` with an equal value.
pub fn matches_filter(metadata: &Metadata, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(key, want)| metadata.get(key) == Some(want))
}

/// A stored vector entry, owned by exactly one shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    /// UUID v7 (time-sortable), unique across the whole store.
    pub id: String,
    pub vector: Vec<f32>,
    /// Always carries at least [`TIMESTAMP_KEY`] and [`TEXT_KEY`].
    pub metadata: Metadata,
}

impl VectorEntry {
    /// The entry's source text, empty if the metadata was tampered with.
    pub fn text(&self) -> &str {
        self.metadata
            .get(TEXT_KEY)
            .and_then(MetaValue::as_str)
            .unwrap_or_default()
    }

    /// The entry's RFC 3339 timestamp, if present and well-typed.
    pub fn timestamp(&self) -> Option<&str> {
        self.metadata.get(TIMESTAMP_KEY).and_then(MetaValue::as_str)
    }
}

/// One scored search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    /// Final rank score under the requested scoring mode.
    pub score: f64,
    pub metadata: Metadata,
}

/// An entry as returned by `query_vectors` — no score, full metadata.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEntry {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}
