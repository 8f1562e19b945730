use anyhow::Result;

use crate::config::EngineConfig;

/// Cluster stored vectors and persist the result as a JSON artifact.
pub fn cluster(config: &EngineConfig, k: usize, limit: usize) -> Result<()> {
    let engine = super::open_engine(config)?;
    let path = engine.persist_clusters(k, limit)?;

    let clusters = engine
        .load_latest_clusters()?
        .unwrap_or_default();

    println!("{} cluster(s) written to {}\n", clusters.len(), path.display());
    for (i, cluster) in clusters.iter().enumerate() {
        println!("  {}. {} member(s)", i + 1, cluster.count);
    }
    Ok(())
}
