mod helpers;

use chrono::{Duration, Utc};
use engram::engine::MemoryEngine;
use engram::types::{MetaValue, Metadata, TIMESTAMP_KEY};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn backdated(seconds: i64) -> Metadata {
    let mut m = Metadata::new();
    m.insert(
        TIMESTAMP_KEY.into(),
        MetaValue::Str((Utc::now() - Duration::seconds(seconds)).to_rfc3339()),
    );
    m
}

/// Engine with second-scale decay so compaction thresholds are easy to hit.
fn fast_decay_engine(dir: &Path) -> Arc<MemoryEngine> {
    let mut config = helpers::test_config(dir, 2);
    config.decay.decay_seconds = 10.0;
    config.decay.threshold = 0.5;
    Arc::new(MemoryEngine::open(config, helpers::test_embedder(), None).unwrap())
}

#[test]
fn compaction_evicts_decayed_entries_only() {
    let dir = tempfile::tempdir().unwrap();
    let engine = fast_decay_engine(dir.path());

    // weight(100s) = e^-10, far below 0.5; weight(0s) = 1.0.
    engine.add_vector("alpha stale", backdated(100)).unwrap();
    engine.add_vector("beta stale", backdated(100)).unwrap();
    let kept = engine.add_vector("gamma fresh", backdated(0)).unwrap();

    let evicted = engine.compact_now().unwrap();
    assert_eq!(evicted, 2);
    assert_eq!(engine.count(), 1);

    let remaining = engine.query_vectors(None, 10);
    assert_eq!(remaining[0].id, kept);
}

#[test]
fn compaction_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = fast_decay_engine(dir.path());
        engine.add_vector("alpha stale", backdated(100)).unwrap();
        engine.add_vector("beta fresh", backdated(0)).unwrap();
        assert_eq!(engine.compact_now().unwrap(), 1);
    }

    // Eviction reached the durable files, not just memory.
    let engine = fast_decay_engine(dir.path());
    assert_eq!(engine.count(), 1);
}

#[test]
fn none_strategy_never_compacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = helpers::test_config(dir.path(), 2);
    config.decay.strategy = engram::decay::DecayStrategy::None;
    config.decay.threshold = 0.99;
    let engine =
        MemoryEngine::open(config, helpers::test_embedder(), None).unwrap();

    engine
        .add_vector("alpha ancient", backdated(365 * 86_400))
        .unwrap();
    assert_eq!(engine.compact_now().unwrap(), 0);
    assert_eq!(engine.count(), 1);
}

#[tokio::test]
async fn background_compactor_runs_and_shuts_down() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = helpers::test_config(dir.path(), 2);
    config.decay.decay_seconds = 10.0;
    config.decay.threshold = 0.5;
    config.maintenance.compaction_interval_secs = 1;
    let engine = Arc::new(
        MemoryEngine::open(config, helpers::test_embedder(), None).unwrap(),
    );

    engine.add_vector("alpha stale", backdated(100)).unwrap();
    engine.add_vector("beta fresh", backdated(0)).unwrap();

    let tasks = engine.start_background();
    tokio::time::sleep(StdDuration::from_millis(1500)).await;
    tasks.shutdown().await;

    assert_eq!(engine.count(), 1);
}
