//! Snapshot and cluster manifests.
//!
//! A manifest is an append-only JSON array living next to the snapshots it
//! describes. The snapshot manifest records `{path, timestamp}` pairs in
//! strictly increasing timestamp order; the cluster manifest is a plain
//! ordered list of cluster-artifact paths.

use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// One snapshot record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: PathBuf,
    /// RFC 3339 creation time.
    pub timestamp: String,
}

/// Append-only snapshot manifest backed by one JSON file.
///
/// Appends serialize on an internal lock and land via a temp-file rename, so
/// concurrent writers never tear the file and readers always see a complete
/// manifest.
pub struct Manifest {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Manifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded entries, oldest first. A missing file is an empty manifest.
    pub fn load(&self) -> Result<Vec<ManifestEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Record a new snapshot. Rewrites the file with the entry appended.
    pub fn append(&self, snapshot_path: &Path) -> Result<ManifestEntry> {
        let _guard = self.lock.lock().expect("manifest mutex poisoned");
        let entry = ManifestEntry {
            path: snapshot_path.to_path_buf(),
            timestamp: Utc::now().to_rfc3339(),
        };
        let mut entries = self.load()?;
        entries.push(entry.clone());
        self.write(&entries)?;
        Ok(entry)
    }

    /// Newest recorded snapshot whose path still exists on disk.
    pub fn latest_existing(&self) -> Result<Option<PathBuf>> {
        let entries = self.load()?;
        Ok(entries
            .into_iter()
            .rev()
            .map(|e| e.path)
            .find(|p| p.exists()))
    }

    fn write(&self, entries: &[ManifestEntry]) -> Result<()> {
        write_atomic(&self.path, &serde_json::to_string_pretty(entries)?)
    }
}

/// Write `contents` to a temp file next to `path` and rename it into place,
/// so readers see either the old or the new file, never a partial one.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Ordered list of cluster-artifact paths, parallel to the snapshot manifest.
/// Appends are serialized and atomic like [`Manifest`]'s.
pub struct ClusterManifest {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ClusterManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> Result<Vec<PathBuf>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn append(&self, artifact: &Path) -> Result<()> {
        let _guard = self.lock.lock().expect("manifest mutex poisoned");
        let mut paths = self.load()?;
        paths.push(artifact.to_path_buf());
        write_atomic(&self.path, &serde_json::to_string_pretty(&paths)?)
    }

    /// Newest recorded artifact that still exists on disk.
    pub fn latest_existing(&self) -> Result<Option<PathBuf>> {
        Ok(self.load()?.into_iter().rev().find(|p| p.exists()))
    }
}

/// Process-wide sequence appended to snapshot names so two snapshots taken in
/// the same millisecond never share a directory.
static NAME_SEQ: AtomicU64 = AtomicU64::new(0);

fn timestamp_tag() -> String {
    let seq = NAME_SEQ.fetch_add(1, Ordering::Relaxed);
    // Colon-free so the name is valid on every filesystem.
    format!("{}_{seq}", Utc::now().format("%Y%m%dT%H%M%S%3f"))
}

/// Directory name for a snapshot taken now:
/// `snap_<compact utc timestamp>_<seq>`.
pub fn snapshot_dir_name() -> String {
    format!("snap_{}", timestamp_tag())
}

/// File name for a cluster artifact written now.
pub fn cluster_file_name() -> String {
    format!("clusters_{}.json", timestamp_tag())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::new(dir.path().join("manifest.json"));
        assert!(manifest.load().unwrap().is_empty());
        assert!(manifest.latest_existing().unwrap().is_none());
    }

    #[test]
    fn append_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::new(dir.path().join("manifest.json"));

        manifest.append(&dir.path().join("one")).unwrap();
        manifest.append(&dir.path().join("two")).unwrap();

        let entries = manifest.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].path.ends_with("one"));
        assert!(entries[1].path.ends_with("two"));
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn latest_existing_skips_deleted_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::new(dir.path().join("manifest.json"));

        let old = dir.path().join("old");
        let gone = dir.path().join("gone");
        std::fs::create_dir(&old).unwrap();
        manifest.append(&old).unwrap();
        manifest.append(&gone).unwrap(); // never created on disk

        assert_eq!(manifest.latest_existing().unwrap(), Some(old));
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = std::sync::Arc::new(Manifest::new(dir.path().join("manifest.json")));

        let threads: Vec<_> = (0..8)
            .map(|t| {
                let manifest = std::sync::Arc::clone(&manifest);
                let dir = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    for i in 0..5 {
                        manifest.append(&dir.join(format!("snap_{t}_{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let entries = manifest.load().unwrap();
        assert_eq!(entries.len(), 40);
        let distinct: std::collections::HashSet<_> =
            entries.iter().map(|e| e.path.clone()).collect();
        assert_eq!(distinct.len(), 40);
    }

    #[test]
    fn snapshot_names_are_unique_within_a_millisecond() {
        let names: Vec<String> = (0..100).map(|_| snapshot_dir_name()).collect();
        let distinct: std::collections::HashSet<&String> = names.iter().collect();
        assert_eq!(distinct.len(), names.len());
    }

    #[test]
    fn cluster_manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ClusterManifest::new(dir.path().join("clusters_manifest.json"));

        let artifact = dir.path().join("clusters_1.json");
        std::fs::write(&artifact, "[]").unwrap();
        manifest.append(&artifact).unwrap();

        assert_eq!(manifest.load().unwrap(), vec![artifact.clone()]);
        assert_eq!(manifest.latest_existing().unwrap(), Some(artifact));
    }
}
