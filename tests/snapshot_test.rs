mod helpers;

use engram::types::Metadata;
use helpers::test_engine;
use std::collections::BTreeSet;

fn stored_texts(engine: &engram::engine::MemoryEngine) -> BTreeSet<String> {
    engine
        .query_vectors(None, 1000)
        .into_iter()
        .map(|e| e.text)
        .collect()
}

#[test]
fn snapshot_restores_into_fresh_process() {
    let dir = tempfile::tempdir().unwrap();
    let texts = ["alpha one", "beta two", "gamma three", "delta four"];
    {
        let engine = test_engine(dir.path(), 3);
        for text in texts {
            engine.add_vector(text, Metadata::new()).unwrap();
        }
        engine.persist_snapshot().unwrap();
    }

    // Simulate total loss of the live shard files.
    for i in 0..3 {
        std::fs::remove_file(dir.path().join(format!("shard_{i}.sqlite"))).unwrap();
        let _ = std::fs::remove_file(dir.path().join(format!("shard_{i}.sqlite-wal")));
        let _ = std::fs::remove_file(dir.path().join(format!("shard_{i}.sqlite-shm")));
    }

    let engine = test_engine(dir.path(), 3);
    assert_eq!(engine.count(), 0);

    assert!(engine.restore_latest_snapshot().unwrap());
    assert_eq!(engine.count(), texts.len());
    assert_eq!(
        stored_texts(&engine),
        texts.iter().map(|t| t.to_string()).collect()
    );
}

#[test]
fn restore_without_snapshots_returns_false() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path(), 2);
    engine.add_vector("alpha kept", Metadata::new()).unwrap();

    assert!(!engine.restore_latest_snapshot().unwrap());
    // The live store is untouched by a failed restore.
    assert_eq!(engine.count(), 1);
}

#[test]
fn restore_skips_deleted_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path(), 2);

    engine.add_vector("alpha early", Metadata::new()).unwrap();
    let first = engine.persist_snapshot().unwrap();

    engine.add_vector("beta late", Metadata::new()).unwrap();
    let second = engine.persist_snapshot().unwrap();

    // The newest snapshot vanishes; restore falls back to the older one.
    std::fs::remove_dir_all(&second).unwrap();
    assert!(first.exists());

    assert!(engine.restore_latest_snapshot().unwrap());
    assert_eq!(engine.count(), 1);
    assert_eq!(stored_texts(&engine), BTreeSet::from(["alpha early".to_string()]));
}

#[test]
fn explicit_snapshot_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let snap = dir.path().join("backup");
    let engine = test_engine(dir.path().join("store").as_path(), 2);

    engine.add_vector("alpha kept", Metadata::new()).unwrap();
    engine.snapshot(&snap).unwrap();

    engine.add_vector("beta dropped", Metadata::new()).unwrap();
    assert_eq!(engine.count(), 2);

    engine.restore(&snap).unwrap();
    assert_eq!(engine.count(), 1);
    assert_eq!(stored_texts(&engine), BTreeSet::from(["alpha kept".to_string()]));
}

#[test]
fn concurrent_snapshots_all_reach_the_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path(), 2);
    engine
        .add_vector("alpha snapshotted", Metadata::new())
        .unwrap();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let engine = std::sync::Arc::clone(&engine);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    engine.persist_snapshot().unwrap();
                }
            })
        })
        .collect();
    for handle in threads {
        handle.join().unwrap();
    }

    let manifest =
        engram::snapshot::Manifest::new(dir.path().join("snapshots").join("manifest.json"));
    let entries = manifest.load().unwrap();
    assert_eq!(entries.len(), 40);

    // Every recorded snapshot is a distinct directory that still restores.
    let distinct: BTreeSet<_> = entries.iter().map(|e| e.path.clone()).collect();
    assert_eq!(distinct.len(), 40);
    assert!(engine.restore_latest_snapshot().unwrap());
    assert_eq!(engine.count(), 1);
}

#[test]
fn auto_snapshot_fires_on_write_counter() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = helpers::test_config(dir.path(), 2);
    config.maintenance.snapshot_interval = 3;
    let engine = engram::engine::MemoryEngine::open(config, helpers::test_embedder(), None)
        .unwrap();

    engine.add_vector("alpha one", Metadata::new()).unwrap();
    engine.add_vector("beta two", Metadata::new()).unwrap();
    assert!(!engine.restore_latest_snapshot().unwrap());

    // Third addition crosses the interval and triggers a snapshot.
    engine.add_vector("gamma three", Metadata::new()).unwrap();
    assert!(engine.restore_latest_snapshot().unwrap());
    assert_eq!(engine.count(), 3);
}
