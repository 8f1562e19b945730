//! Typed errors for the engine.
//!
//! Callers need to distinguish failure classes — an embedding failure is
//! retryable by the caller, a persistence failure aborted the whole write, a
//! replication failure did not. Each gets its own variant.

use thiserror::Error;

/// All errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The injected embedder failed to produce a vector. The engine performs
    /// no retries; retry policy belongs to the caller.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// A durable write or read against a shard database failed. For
    /// `add_vector` this means the whole operation was aborted — the
    /// in-memory index was not touched.
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The replica backend rejected or timed out on a mirror call. Never
    /// raised from the local write path; logged there instead.
    #[error("replication error: {0}")]
    Replication(String),

    /// Clustering was asked for more clusters than there are distinct vectors.
    #[error("insufficient data: need {needed} distinct vectors, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// A rewrite deleted the old row but failed to reinsert the replacement,
    /// leaving a hole in the shard. The entry is gone from both the index and
    /// the durable file; the caller must decide whether to re-add.
    #[error("rewrite of {id} left a hole in shard {shard}: {source}")]
    RewriteHole {
        id: String,
        shard: usize,
        source: rusqlite::Error,
    },

    #[error("no entry with id {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
