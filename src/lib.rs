//! Engram — a sharded, persistent vector memory engine.
//!
//! Text goes in, embeddings and metadata come back out: entries are embedded
//! through a pluggable [`embedding::Embedder`], routed by id hash to one of a
//! fixed set of shards, and served back through decay-weighted similarity
//! search. Each shard pairs an in-memory cosine index with a SQLite file, so
//! the whole store survives restarts and can be snapshotted or restored as a
//! set of plain files.
//!
//! # Architecture
//!
//! - **Storage**: one SQLite database per shard (WAL mode), rebuilt into an
//!   in-memory index at open
//! - **Search**: cosine similarity fanned out across shards, merged with
//!   exponential time decay and equality metadata filters
//! - **Maintenance**: decay-driven compaction, counter-based automatic
//!   snapshots with an append-only manifest, deterministic k-means clustering
//! - **Replication**: best-effort synchronous mirroring to an external
//!   HTTP backend, with bulk replay for cold-start recovery
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`engine`] — The engine facade: routing, search, snapshots, background jobs
//! - [`shard`] — A single shard: index, metadata, and durable SQLite file
//! - [`index`] — Vector index backends (flat scalar loops or ndarray)
//! - [`embedding`] — The embedder seam and the built-in hashing embedder
//! - [`decay`] — Time-decay weighting and rank scoring
//! - [`cluster`] — K-means partitioning of stored vectors
//! - [`snapshot`] — Snapshot and cluster manifests
//! - [`replica`] — Best-effort replication to an external backend

pub mod cluster;
pub mod config;
pub mod db;
pub mod decay;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod index;
pub mod replica;
pub mod shard;
pub mod snapshot;
pub mod types;

pub use config::EngineConfig;
pub use decay::{DecayStrategy, ScoringMode};
pub use engine::{BackgroundTasks, MemoryEngine};
pub use error::{EngineError, Result};
pub use types::{Filter, MetaValue, Metadata, SearchHit, StoredEntry, VectorEntry};
