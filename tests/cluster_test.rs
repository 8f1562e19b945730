mod helpers;

use engram::error::EngineError;
use engram::types::Metadata;
use helpers::test_engine;
use std::collections::BTreeSet;

#[test]
fn clusters_separate_orthogonal_groups() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path(), 3);

    // Two topics, orthogonal embeddings, several members each.
    let mut alpha_ids = BTreeSet::new();
    let mut beta_ids = BTreeSet::new();
    for i in 0..4 {
        alpha_ids.insert(engine.add_vector(&format!("alpha {i}"), Metadata::new()).unwrap());
        beta_ids.insert(engine.add_vector(&format!("beta {i}"), Metadata::new()).unwrap());
    }

    let clusters = engine.cluster_vectors(2, 100).unwrap();
    assert_eq!(clusters.len(), 2);

    let total: usize = clusters.iter().map(|c| c.count).sum();
    assert_eq!(total, 8);

    // Each cluster is exactly one topic.
    for cluster in &clusters {
        let members: BTreeSet<String> = cluster.members.iter().cloned().collect();
        assert!(members == alpha_ids || members == beta_ids);
    }
}

#[test]
fn clustering_rejects_too_few_distinct_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path(), 2);

    // Both entries embed to the same spike: one distinct vector.
    engine.add_vector("alpha one", Metadata::new()).unwrap();
    engine.add_vector("alpha two", Metadata::new()).unwrap();

    let err = engine.cluster_vectors(2, 100).unwrap_err();
    match err {
        EngineError::InsufficientData { needed, available } => {
            assert_eq!(needed, 2);
            assert_eq!(available, 1);
        }
        other => panic!("expected InsufficientData, got {other}"),
    }
}

#[test]
fn persisted_clusters_reload_from_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path(), 2);

    for text in ["alpha one", "beta two", "gamma three"] {
        engine.add_vector(text, Metadata::new()).unwrap();
    }

    assert!(engine.load_latest_clusters().unwrap().is_none());

    let path = engine.persist_clusters(3, 100).unwrap();
    assert!(path.exists());

    let clusters = engine.load_latest_clusters().unwrap().unwrap();
    assert_eq!(clusters.len(), 3);
    let total: usize = clusters.iter().map(|c| c.count).sum();
    assert_eq!(total, 3);
}

#[test]
fn cluster_limit_caps_input() {
    let dir = tempfile::tempdir().unwrap();
    let engine = test_engine(dir.path(), 1);

    for text in ["alpha", "beta", "gamma", "delta"] {
        engine.add_vector(text, Metadata::new()).unwrap();
    }

    let clusters = engine.cluster_vectors(2, 2).unwrap();
    let total: usize = clusters.iter().map(|c| c.count).sum();
    assert_eq!(total, 2);
}
