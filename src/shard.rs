//! A single shard: one vector index, a parallel id list, a metadata map, and
//! one durable SQLite file.
//!
//! Invariant: `ids.len() == metadata.len() == index.len()` at every point
//! observable outside a mutation. All mutations and reads serialize on the
//! shard's state lock; the durable write happens first so a failed write
//! never leaves the in-memory side ahead of the file.

use crate::db::{self, ConnectionPool};
use crate::decay::{decay_weight, DecayStrategy};
use crate::error::{EngineError, Result};
use crate::index::{IndexBackend, VectorIndex};
use crate::types::{Metadata, TIMESTAMP_KEY};
use chrono::{DateTime, Utc};
use rusqlite::params;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// A search candidate as returned by one shard, before decay scoring.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub similarity: f32,
    pub metadata: Metadata,
}

struct ShardState {
    index: Box<dyn VectorIndex>,
    ids: Vec<String>,
    metadata: HashMap<String, Metadata>,
}

pub struct Shard {
    ordinal: usize,
    path: PathBuf,
    backend: IndexBackend,
    pool: ConnectionPool,
    state: Mutex<ShardState>,
}

impl Shard {
    /// Open the shard database at `path` and load its contents into memory.
    pub fn open(
        ordinal: usize,
        path: impl Into<PathBuf>,
        backend: IndexBackend,
        pool_size: usize,
    ) -> Result<Self> {
        let path = path.into();
        let pool = ConnectionPool::open(&path, pool_size)?;
        let shard = Self {
            ordinal,
            path,
            backend,
            pool,
            state: Mutex::new(ShardState {
                index: backend.build(),
                ids: Vec::new(),
                metadata: HashMap::new(),
            }),
        };
        shard.reload()?;
        Ok(shard)
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock_state().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ShardState> {
        self.state.lock().expect("shard mutex poisoned")
    }

    /// Rebuild the in-memory index and maps from the durable file.
    fn reload(&self) -> Result<()> {
        let mut state = self.lock_state();
        let rows: Vec<(String, Vec<u8>, Option<String>)> = {
            let conn = self.pool.acquire();
            let mut stmt = conn.prepare("SELECT id, vector, metadata FROM memory")?;
            let collected = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            collected
        };

        state.index = self.backend.build();
        state.ids.clear();
        state.metadata.clear();
        for (id, blob, meta_json) in rows {
            let metadata: Metadata = match meta_json.as_deref() {
                Some(json) => serde_json::from_str(json).unwrap_or_default(),
                None => Metadata::new(),
            };
            state.index.push(db::bytes_to_vector(&blob));
            state.metadata.insert(id.clone(), metadata);
            state.ids.push(id);
        }
        debug!(shard = self.ordinal, entries = state.ids.len(), "shard loaded");
        Ok(())
    }

    /// Insert an entry, or replace it in place if the id already exists.
    /// The durable write happens first; on failure nothing changes in memory.
    pub fn add(&self, id: &str, vector: Vec<f32>, metadata: Metadata) -> Result<()> {
        let mut state = self.lock_state();
        self.check_dims(&state, &vector)?;

        let meta_json = serde_json::to_string(&metadata)?;
        {
            let conn = self.pool.acquire();
            conn.execute(
                "INSERT OR REPLACE INTO memory (id, vector, metadata) VALUES (?1, ?2, ?3)",
                params![id, db::vector_to_bytes(&vector), meta_json],
            )?;
        }

        match state.ids.iter().position(|existing| existing == id) {
            Some(row) => state.index.replace(row, vector),
            None => {
                state.index.push(vector);
                state.ids.push(id.to_string());
            }
        }
        state.metadata.insert(id.to_string(), metadata);
        Ok(())
    }

    /// Replace an existing entry's vector and metadata.
    ///
    /// Tries an in-place durable update first; on failure falls back to
    /// delete-then-reinsert. If the delete lands but the reinsert fails, the
    /// entry is dropped from memory too (the file no longer has it) and
    /// [`EngineError::RewriteHole`] is raised.
    pub fn rewrite(&self, id: &str, vector: Vec<f32>, metadata: Metadata) -> Result<()> {
        let mut state = self.lock_state();
        let row = state
            .ids
            .iter()
            .position(|existing| existing == id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        self.check_dims(&state, &vector)?;

        let blob = db::vector_to_bytes(&vector);
        let meta_json = serde_json::to_string(&metadata)?;
        {
            let conn = self.pool.acquire();
            let update = conn.execute(
                "INSERT OR REPLACE INTO memory (id, vector, metadata) VALUES (?1, ?2, ?3)",
                params![id, blob, meta_json],
            );
            if let Err(update_err) = update {
                warn!(
                    shard = self.ordinal,
                    id,
                    error = %update_err,
                    "in-place rewrite failed, falling back to delete and reinsert"
                );
                conn.execute("DELETE FROM memory WHERE id = ?1", params![id])?;
                if let Err(insert_err) = conn.execute(
                    "INSERT INTO memory (id, vector, metadata) VALUES (?1, ?2, ?3)",
                    params![id, blob, meta_json],
                ) {
                    // The row is gone from the file; drop it from memory so
                    // the shard invariant holds, then surface the hole.
                    state.index.remove(&[row]);
                    state.ids.remove(row);
                    state.metadata.remove(id);
                    return Err(EngineError::RewriteHole {
                        id: id.to_string(),
                        shard: self.ordinal,
                        source: insert_err,
                    });
                }
            }
        }

        state.index.replace(row, vector);
        state.metadata.insert(id.to_string(), metadata);
        Ok(())
    }

    /// Remove the given ids. Ids not present in this shard are ignored.
    /// Returns the number of entries actually removed.
    pub fn remove(&self, ids: &[String]) -> Result<usize> {
        let mut state = self.lock_state();
        self.remove_locked(&mut state, ids)
    }

    fn remove_locked(&self, state: &mut ShardState, ids: &[String]) -> Result<usize> {
        let present: Vec<String> = ids
            .iter()
            .filter(|id| state.metadata.contains_key(*id))
            .cloned()
            .collect();
        if present.is_empty() {
            return Ok(0);
        }

        {
            let conn = self.pool.acquire();
            let marks = vec!["?"; present.len()].join(",");
            let sql = format!("DELETE FROM memory WHERE id IN ({marks})");
            conn.execute(&sql, rusqlite::params_from_iter(present.iter()))?;
        }

        let mut rows: Vec<usize> = state
            .ids
            .iter()
            .enumerate()
            .filter(|(_, id)| present.contains(id))
            .map(|(row, _)| row)
            .collect();
        rows.sort_unstable();

        state.index.remove(&rows);
        for &row in rows.iter().rev() {
            let id = state.ids.remove(row);
            state.metadata.remove(&id);
        }
        Ok(present.len())
    }

    /// One compaction pass: evict every entry whose decay weight at `now`
    /// falls strictly below `threshold`. Runs entirely under the shard lock,
    /// so concurrent searches see pre- or post-compaction state, never a mix.
    pub fn compact(
        &self,
        strategy: DecayStrategy,
        decay_seconds: f64,
        threshold: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut state = self.lock_state();
        let victims: Vec<String> = state
            .ids
            .iter()
            .filter(|id| {
                let ts = state
                    .metadata
                    .get(*id)
                    .and_then(|m| m.get(TIMESTAMP_KEY))
                    .and_then(|v| v.as_str());
                decay_weight(strategy, decay_seconds, ts, now) < threshold
            })
            .cloned()
            .collect();

        if !victims.is_empty() {
            self.remove_locked(&mut state, &victims)?;
            debug!(shard = self.ordinal, evicted = victims.len(), "compacted shard");
        }
        Ok(victims)
    }

    /// Local top-k candidates for a query vector. Returns up to
    /// `max(5 * k, k)` rows so the caller has headroom for metadata filtering.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Candidate> {
        let state = self.lock_state();
        let fetch = (k * 5).max(k);
        state
            .index
            .top_k(query, fetch)
            .into_iter()
            .map(|(row, similarity)| {
                let id = state.ids[row].clone();
                let metadata = state.metadata.get(&id).cloned().unwrap_or_default();
                Candidate {
                    id,
                    similarity,
                    metadata,
                }
            })
            .collect()
    }

    /// Metadata for one id, if this shard owns it.
    pub fn metadata_of(&self, id: &str) -> Option<Metadata> {
        self.lock_state().metadata.get(id).cloned()
    }

    /// Snapshot of `(id, metadata)` pairs in insertion order.
    pub fn metadata_snapshot(&self) -> Vec<(String, Metadata)> {
        let state = self.lock_state();
        state
            .ids
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    state.metadata.get(id).cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Up to `limit` `(id, vector)` pairs in insertion order.
    pub fn export_vectors(&self, limit: usize) -> Vec<(String, Vec<f32>)> {
        let state = self.lock_state();
        state
            .ids
            .iter()
            .take(limit)
            .enumerate()
            .map(|(row, id)| (id.clone(), state.index.vector(row)))
            .collect()
    }

    /// Full `(id, vector, metadata)` export, used for replica replay tests
    /// and operator inspection.
    pub fn export_entries(&self) -> Vec<(String, Vec<f32>, Metadata)> {
        let state = self.lock_state();
        state
            .ids
            .iter()
            .enumerate()
            .map(|(row, id)| {
                (
                    id.clone(),
                    state.index.vector(row),
                    state.metadata.get(id).cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Copy the durable file to `dest`, checkpointing the WAL first so the
    /// copy is self-contained. Holds the shard lock for the duration.
    pub fn snapshot_to(&self, dest: &Path) -> Result<()> {
        let _state = self.lock_state();
        {
            let conn = self.pool.acquire();
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&self.path, dest)?;
        Ok(())
    }

    /// Replace the durable file with `src` and reload. All pooled
    /// connections are closed for the swap and reopened afterwards.
    pub fn restore_from(&self, src: &Path) -> Result<()> {
        {
            let _state = self.lock_state();
            self.pool.reset_with(|path| {
                // Stale WAL/SHM from the replaced file must not shadow the
                // restored contents.
                let _ = std::fs::remove_file(path.with_extension("sqlite-wal"));
                let _ = std::fs::remove_file(path.with_extension("sqlite-shm"));
                std::fs::copy(src, path)?;
                Ok(())
            })?;
        }
        self.reload()
    }

    fn check_dims(&self, state: &ShardState, vector: &[f32]) -> Result<()> {
        if let Some(dims) = state.index.dims() {
            if dims != vector.len() {
                return Err(EngineError::Embedding(format!(
                    "embedder returned {} dimensions, shard {} holds {}",
                    vector.len(),
                    self.ordinal,
                    dims
                )));
            }
        }
        Ok(())
    }
}
