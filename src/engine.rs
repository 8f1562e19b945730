//! The engine: shard routing, public operations, and background maintenance.
//!
//! [`MemoryEngine`] is an explicit instance — construct it from an
//! [`EngineConfig`] plus an injected [`Embedder`] (and optional replica) and
//! share it by `Arc`. There is no process-wide singleton; "reconfigure" means
//! constructing a new instance.
//!
//! All operations are synchronous. Async callers should wrap them in
//! `tokio::task::spawn_blocking`; the periodic compactor does exactly that.

use crate::cluster::{self, Cluster};
use crate::config::EngineConfig;
use crate::decay::{decay_weight, score, ScoringMode};
use crate::embedding::Embedder;
use crate::error::{EngineError, Result};
use crate::replica::{HttpReplica, ReplicaStore};
use crate::shard::Shard;
use crate::snapshot::{self, ClusterManifest, Manifest};
use crate::types::{
    matches_filter, Filter, Metadata, MetaValue, SearchHit, StoredEntry, VectorEntry,
    TEXT_KEY, TIMESTAMP_KEY,
};
use chrono::Utc;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct MemoryEngine {
    config: EngineConfig,
    embedder: Arc<dyn Embedder>,
    replica: Option<Arc<dyn ReplicaStore>>,
    shards: Vec<Shard>,
    manifest: Manifest,
    cluster_manifest: ClusterManifest,
    base_dir: PathBuf,
    op_log_path: PathBuf,
    /// Monotonic count of additions, driving counter-based auto-snapshots.
    writes: AtomicU64,
}

impl MemoryEngine {
    /// Open (or create) the store described by `config`.
    ///
    /// When `replica` is `None` but the config carries a replica URL, an
    /// [`HttpReplica`] is constructed from it.
    pub fn open(
        config: EngineConfig,
        embedder: Arc<dyn Embedder>,
        replica: Option<Arc<dyn ReplicaStore>>,
    ) -> Result<Self> {
        config.validate()?;
        let base_dir = config.resolved_db_path();
        std::fs::create_dir_all(&base_dir)?;

        let replica = match (replica, &config.replica.url) {
            (Some(r), _) => Some(r),
            (None, Some(url)) => {
                let timeout = Duration::from_secs(config.replica.timeout_secs);
                Some(Arc::new(HttpReplica::new(url.clone(), timeout)?) as Arc<dyn ReplicaStore>)
            }
            (None, None) => None,
        };

        let mut shards = Vec::with_capacity(config.storage.shards);
        for i in 0..config.storage.shards {
            shards.push(Shard::open(
                i,
                base_dir.join(format!("shard_{i}.sqlite")),
                config.index.backend,
                config.storage.pool_size,
            )?);
        }

        let snapshots_dir = base_dir.join("snapshots");
        let engine = Self {
            manifest: Manifest::new(snapshots_dir.join("manifest.json")),
            cluster_manifest: ClusterManifest::new(snapshots_dir.join("clusters_manifest.json")),
            op_log_path: base_dir.join("operations.log"),
            base_dir,
            config,
            embedder,
            replica,
            shards,
            writes: AtomicU64::new(0),
        };
        info!(
            path = %engine.base_dir.display(),
            shards = engine.shards.len(),
            entries = engine.count(),
            "memory engine ready"
        );
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Total entries across all shards.
    pub fn count(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    /// Entry count per shard, in shard order.
    pub fn shard_sizes(&self) -> Vec<usize> {
        self.shards.iter().map(Shard::len).collect()
    }

    // ── Routing ──────────────────────────────────────────────────────────────

    /// Shard index for an id. Pure function of the id, so re-adds and
    /// rewrites always land on the shard that owns the entry.
    fn route_index(&self, id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    fn route(&self, id: &str) -> &Shard {
        &self.shards[self.route_index(id)]
    }

    // ── Write path ───────────────────────────────────────────────────────────

    /// Embed `text` and store it with `metadata`. Returns the new entry's id.
    ///
    /// Missing `text`/`timestamp` metadata keys are filled in; caller-supplied
    /// values (including backdated timestamps) are preserved.
    pub fn add_vector(&self, text: &str, metadata: Metadata) -> Result<String> {
        let vector = self.embedder.embed(text)?;
        let id = uuid::Uuid::now_v7().to_string();
        self.insert(&id, text, vector, metadata)?;
        Ok(id)
    }

    /// Batch variant of [`add_vector`](Self::add_vector).
    pub fn add_vectors(&self, texts: &[&str], metadatas: Vec<Metadata>) -> Result<Vec<String>> {
        if texts.len() != metadatas.len() {
            return Err(EngineError::Config(format!(
                "batch size mismatch: {} texts, {} metadata maps",
                texts.len(),
                metadatas.len()
            )));
        }
        let vectors = self.embedder.embed_batch(texts)?;
        let mut ids = Vec::with_capacity(texts.len());
        for ((text, vector), metadata) in texts.iter().zip(vectors).zip(metadatas) {
            let id = uuid::Uuid::now_v7().to_string();
            self.insert(&id, text, vector, metadata)?;
            ids.push(id);
        }
        Ok(ids)
    }

    fn insert(&self, id: &str, text: &str, vector: Vec<f32>, mut metadata: Metadata) -> Result<()> {
        metadata
            .entry(TEXT_KEY.to_string())
            .or_insert_with(|| MetaValue::Str(text.to_string()));
        metadata
            .entry(TIMESTAMP_KEY.to_string())
            .or_insert_with(|| MetaValue::Str(Utc::now().to_rfc3339()));

        self.route(id).add(id, vector.clone(), metadata.clone())?;

        // Local store is authoritative; a failing replica never unwinds the add.
        if let Some(replica) = &self.replica {
            let entry = VectorEntry {
                id: id.to_string(),
                vector,
                metadata,
            };
            if let Err(e) = replica.mirror(&entry) {
                warn!(id, error = %e, "replica mirror failed");
            }
        }

        self.log_op("add", id, text);
        self.after_write();
        Ok(())
    }

    /// Replace the entry `old_id` with `new_text`, preserving its metadata
    /// and original timestamp. The entry stays on the same shard.
    pub fn rewrite_vector(&self, old_id: &str, new_text: &str) -> Result<()> {
        let shard = self.route(old_id);
        let mut metadata = shard
            .metadata_of(old_id)
            .ok_or_else(|| EngineError::NotFound(old_id.to_string()))?;

        let vector = self.embedder.embed(new_text)?;
        metadata.insert(TEXT_KEY.to_string(), MetaValue::Str(new_text.to_string()));
        metadata
            .entry(TIMESTAMP_KEY.to_string())
            .or_insert_with(|| MetaValue::Str(Utc::now().to_rfc3339()));

        shard.rewrite(old_id, vector.clone(), metadata.clone())?;

        if let Some(replica) = &self.replica {
            let entry = VectorEntry {
                id: old_id.to_string(),
                vector,
                metadata,
            };
            if let Err(e) = replica.mirror(&entry) {
                warn!(id = old_id, error = %e, "replica mirror failed");
            }
        }
        self.log_op("rewrite", old_id, new_text);
        Ok(())
    }

    /// Remove the given entries. Unknown ids are ignored. Returns the number
    /// actually removed.
    pub fn delete_vectors(&self, ids: &[String]) -> Result<usize> {
        let mut by_shard: Vec<Vec<String>> = vec![Vec::new(); self.shards.len()];
        for id in ids {
            by_shard[self.route_index(id)].push(id.clone());
        }
        let mut removed = 0;
        for (shard, ids) in self.shards.iter().zip(by_shard) {
            if !ids.is_empty() {
                removed += shard.remove(&ids)?;
            }
        }
        if removed > 0 {
            self.log_op("delete", &format!("{removed} entries"), "");
        }
        Ok(removed)
    }

    // ── Read path ────────────────────────────────────────────────────────────

    /// Top-`k` matches for `query`, ranked by the requested scoring mode.
    ///
    /// Every shard contributes local candidates; the merge filters by
    /// metadata equality, scores, and truncates. Equal scores break ties by
    /// ascending id.
    pub fn search(
        &self,
        query: &str,
        filter: Option<&Filter>,
        k: usize,
        scoring: ScoringMode,
    ) -> Result<Vec<SearchHit>> {
        let query_vector = self.embedder.embed(query)?;
        let now = Utc::now();
        let decay = &self.config.decay;

        let mut hits: Vec<SearchHit> = Vec::new();
        for shard in &self.shards {
            for candidate in shard.search(&query_vector, k) {
                if let Some(filter) = filter {
                    if !matches_filter(&candidate.metadata, filter) {
                        continue;
                    }
                }
                let ts = candidate
                    .metadata
                    .get(TIMESTAMP_KEY)
                    .and_then(MetaValue::as_str);
                let weight = decay_weight(decay.strategy, decay.decay_seconds, ts, now);
                let text = candidate
                    .metadata
                    .get(TEXT_KEY)
                    .and_then(MetaValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                hits.push(SearchHit {
                    id: candidate.id,
                    text,
                    score: score(scoring, candidate.similarity as f64, weight),
                    metadata: candidate.metadata,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Up to `limit` stored entries matching `filter`, newest first.
    pub fn query_vectors(&self, filter: Option<&Filter>, limit: usize) -> Vec<StoredEntry> {
        let mut entries: Vec<StoredEntry> = self
            .shards
            .iter()
            .flat_map(|shard| shard.metadata_snapshot())
            .filter(|(_, metadata)| filter.map_or(true, |f| matches_filter(metadata, f)))
            .map(|(id, metadata)| StoredEntry {
                text: metadata
                    .get(TEXT_KEY)
                    .and_then(MetaValue::as_str)
                    .unwrap_or_default()
                    .to_string(),
                id,
                metadata,
            })
            .collect();

        // RFC 3339 UTC timestamps compare correctly as strings.
        entries.sort_by(|a, b| {
            let ts_a = a.metadata.get(TIMESTAMP_KEY).and_then(MetaValue::as_str);
            let ts_b = b.metadata.get(TIMESTAMP_KEY).and_then(MetaValue::as_str);
            ts_b.cmp(&ts_a).then_with(|| a.id.cmp(&b.id))
        });
        entries.truncate(limit);
        entries
    }

    // ── Compaction ───────────────────────────────────────────────────────────

    /// One decay-driven compaction pass over every shard. Returns the number
    /// of evicted entries. Never driven by query activity or similarity.
    pub fn compact_now(&self) -> Result<usize> {
        let decay = &self.config.decay;
        let now = Utc::now();
        let mut evicted = 0;
        for shard in &self.shards {
            evicted += shard
                .compact(
                    decay.strategy,
                    decay.decay_seconds,
                    decay.threshold,
                    now,
                )?
                .len();
        }
        if evicted > 0 {
            info!(evicted, "compaction pass complete");
            self.log_op("compact", &format!("{evicted} entries"), "");
        }
        Ok(evicted)
    }

    // ── Snapshots ────────────────────────────────────────────────────────────

    /// Serialize every shard into a new timestamped snapshot directory and
    /// record it in the manifest. Returns the snapshot path.
    pub fn persist_snapshot(&self) -> Result<PathBuf> {
        let dir = self
            .base_dir
            .join("snapshots")
            .join(snapshot::snapshot_dir_name());
        self.snapshot(&dir)?;
        self.manifest.append(&dir)?;
        debug!(path = %dir.display(), "snapshot persisted");
        Ok(dir)
    }

    /// Swap in the newest manifest-recorded snapshot that still exists.
    /// Returns `false` — not an error — when no usable snapshot is found, so
    /// callers can fall back to an empty store.
    pub fn restore_latest_snapshot(&self) -> Result<bool> {
        let entries = match self.manifest.load() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "snapshot manifest unreadable");
                return Ok(false);
            }
        };
        for entry in entries.iter().rev() {
            if !entry.path.exists() {
                continue;
            }
            match self.restore(&entry.path) {
                Ok(()) => {
                    info!(path = %entry.path.display(), "restored latest snapshot");
                    return Ok(true);
                }
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "snapshot restore failed, trying older");
                }
            }
        }
        Ok(false)
    }

    /// Manifest-independent snapshot of every shard into `path`.
    pub fn snapshot(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        for shard in &self.shards {
            shard.snapshot_to(&path.join(format!("shard_{}.sqlite", shard.ordinal())))?;
        }
        Ok(())
    }

    /// Manifest-independent restore from a snapshot directory. Shards whose
    /// file is missing from the snapshot are left untouched.
    pub fn restore(&self, path: &Path) -> Result<()> {
        for shard in &self.shards {
            let src = path.join(format!("shard_{}.sqlite", shard.ordinal()));
            if src.exists() {
                shard.restore_from(&src)?;
            }
        }
        Ok(())
    }

    // ── Clustering ───────────────────────────────────────────────────────────

    /// Partition up to `limit` stored vectors into `k` clusters.
    pub fn cluster_vectors(&self, k: usize, limit: usize) -> Result<Vec<Cluster>> {
        let mut entries: Vec<(String, Vec<f32>)> = Vec::new();
        for shard in &self.shards {
            if entries.len() >= limit {
                break;
            }
            entries.extend(shard.export_vectors(limit - entries.len()));
        }
        cluster::cluster_vectors(&entries, k)
    }

    /// Cluster and persist the result as a JSON artifact recorded in the
    /// cluster manifest. Returns the artifact path.
    pub fn persist_clusters(&self, k: usize, limit: usize) -> Result<PathBuf> {
        let clusters = self.cluster_vectors(k, limit)?;
        let path = self
            .base_dir
            .join("snapshots")
            .join(snapshot::cluster_file_name());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(&clusters)?)?;
        self.cluster_manifest.append(&path)?;
        Ok(path)
    }

    /// Newest persisted cluster artifact, if any still exists on disk.
    pub fn load_latest_clusters(&self) -> Result<Option<Vec<Cluster>>> {
        match self.cluster_manifest.latest_existing()? {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                Ok(Some(serde_json::from_str(&contents)?))
            }
            None => Ok(None),
        }
    }

    // ── Replication ──────────────────────────────────────────────────────────

    /// Bulk-replay every mirrored record from the replica into this store.
    /// Used for cold-start recovery when local persistence is lost entirely.
    /// Returns the number of entries replayed.
    pub fn restore_from_replica(&self) -> Result<usize> {
        let replica = self
            .replica
            .as_ref()
            .ok_or_else(|| EngineError::Replication("no replica configured".into()))?;
        let entries = replica.fetch_all()?;
        let replayed = entries.len();
        for entry in entries {
            self.route(&entry.id)
                .add(&entry.id, entry.vector, entry.metadata)?;
        }
        if replayed > 0 {
            info!(replayed, "replayed entries from replica");
            self.log_op("restore", &format!("{replayed} entries"), "");
        }
        Ok(replayed)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Counter-based auto-snapshot: every `snapshot_interval` additions.
    /// Failures are logged, never surfaced — the add already succeeded.
    fn after_write(&self) {
        let interval = self.config.maintenance.snapshot_interval;
        if interval == 0 {
            return;
        }
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if n % interval == 0 {
            if let Err(e) = self.persist_snapshot() {
                warn!(error = %e, "automatic snapshot failed");
            }
        }
    }

    /// Append one JSON line to the operation log. Best-effort.
    fn log_op(&self, operation: &str, id: &str, text: &str) {
        let line = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "operation": operation,
            "id": id,
            "text": text,
        });
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.op_log_path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            warn!(error = %e, "failed to append operation log");
        }
    }
}

// ── Background maintenance ───────────────────────────────────────────────────

/// Handle to the engine's periodic background jobs.
pub struct BackgroundTasks {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Stop the periodic jobs and wait for any in-flight pass to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

impl MemoryEngine {
    /// Spawn the periodic compactor. Each pass runs on the blocking pool and
    /// holds each shard's lock only while that shard is being swept.
    pub fn start_background(self: &Arc<Self>) -> BackgroundTasks {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let engine = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let period =
                Duration::from_secs(engine.config.maintenance.compaction_interval_secs.max(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the first
            // pass happens one full period after startup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let engine = Arc::clone(&engine);
                        match tokio::task::spawn_blocking(move || engine.compact_now()).await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => warn!(error = %e, "compaction pass failed"),
                            Err(e) => warn!(error = %e, "compaction task panicked"),
                        }
                    }
                }
            }
            debug!("background compactor stopped");
        });

        BackgroundTasks { cancel, handle }
    }
}
