#![allow(dead_code)]

use engram::config::EngineConfig;
use engram::embedding::{Embedder, FnEmbedder};
use engram::engine::MemoryEngine;
use std::path::Path;
use std::sync::Arc;

pub const DIMS: usize = 8;

/// Deterministic embedding: a unit spike at `pos`. Distinct positions give
/// orthogonal vectors, so geometry in tests is fully controlled.
pub fn spike(pos: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    v[pos % DIMS] = 1.0;
    v
}

/// Embedder mapping a text to a spike at the position named by its first
/// byte. Texts starting with the same letter embed identically; texts
/// starting with different letters are orthogonal.
pub fn test_embedder() -> Arc<dyn Embedder> {
    Arc::new(FnEmbedder::new(|text: &str| {
        let pos = text.bytes().next().unwrap_or(0) as usize;
        Ok(spike(pos))
    }))
}

/// Config pointing at a temp directory, with automatic snapshots disabled so
/// tests control snapshot timing explicitly.
pub fn test_config(dir: &Path, shards: usize) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.storage.db_path = dir.to_string_lossy().into_owned();
    config.storage.shards = shards;
    config.storage.pool_size = 2;
    config.maintenance.snapshot_interval = 0;
    config
}

pub fn test_engine(dir: &Path, shards: usize) -> Arc<MemoryEngine> {
    Arc::new(MemoryEngine::open(test_config(dir, shards), test_embedder(), None).unwrap())
}
