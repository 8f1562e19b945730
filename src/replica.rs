//! Best-effort replication to an external key-value backend.
//!
//! Every successful local add is mirrored synchronously through a
//! [`ReplicaStore`]. The local store stays authoritative: mirror failures are
//! logged by the engine and never unwind the local write. The replica's only
//! read path is [`ReplicaStore::fetch_all`], used for cold-start recovery
//! when local persistence is lost entirely.

use crate::error::{EngineError, Result};
use crate::types::{Metadata, VectorEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// External mirror of vector entries, keyed by id.
pub trait ReplicaStore: Send + Sync {
    /// Upsert one entry. Must be idempotent per id.
    fn mirror(&self, entry: &VectorEntry) -> Result<()>;

    /// Every mirrored entry, for bulk replay into a fresh store.
    fn fetch_all(&self) -> Result<Vec<VectorEntry>>;

    /// Drop all mirrored entries.
    fn clear(&self) -> Result<()>;
}

/// In-process replica, used in tests and as a reference implementation.
#[derive(Default)]
pub struct MemoryReplica {
    entries: Mutex<BTreeMap<String, VectorEntry>>,
}

impl MemoryReplica {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("replica mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReplicaStore for MemoryReplica {
    fn mirror(&self, entry: &VectorEntry) -> Result<()> {
        self.entries
            .lock()
            .expect("replica mutex poisoned")
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<VectorEntry>> {
        Ok(self
            .entries
            .lock()
            .expect("replica mutex poisoned")
            .values()
            .cloned()
            .collect())
    }

    fn clear(&self) -> Result<()> {
        self.entries
            .lock()
            .expect("replica mutex poisoned")
            .clear();
        Ok(())
    }
}

/// Wire form of a mirrored record. The id travels in the URL on writes and
/// in the body on bulk reads.
#[derive(Debug, Serialize, Deserialize)]
struct WireRecord {
    #[serde(default)]
    id: String,
    vector: Vec<f32>,
    metadata: Metadata,
}

/// HTTP replica backend speaking a small JSON protocol:
/// `PUT /records/{id}`, `GET /records`, `DELETE /records`.
///
/// Each request carries its own timeout so a slow replica can only stall a
/// local write for that long, never indefinitely.
pub struct HttpReplica {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpReplica {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Replication(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }
}

impl ReplicaStore for HttpReplica {
    fn mirror(&self, entry: &VectorEntry) -> Result<()> {
        let record = WireRecord {
            id: String::new(),
            vector: entry.vector.clone(),
            metadata: entry.metadata.clone(),
        };
        self.client
            .put(format!("{}/records/{}", self.base_url, entry.id))
            .json(&record)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| EngineError::Replication(e.to_string()))?;
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<VectorEntry>> {
        let records: Vec<WireRecord> = self
            .client
            .get(format!("{}/records", self.base_url))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| EngineError::Replication(e.to_string()))?
            .json()
            .map_err(|e| EngineError::Replication(e.to_string()))?;
        Ok(records
            .into_iter()
            .map(|r| VectorEntry {
                id: r.id,
                vector: r.vector,
                metadata: r.metadata,
            })
            .collect())
    }

    fn clear(&self) -> Result<()> {
        self.client
            .delete(format!("{}/records", self.base_url))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| EngineError::Replication(e.to_string()))?;
        Ok(())
    }
}
