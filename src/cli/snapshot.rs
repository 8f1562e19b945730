use anyhow::Result;
use std::path::Path;

use crate::config::EngineConfig;

/// Take a snapshot. With no path, writes a timestamped directory under the
/// store and records it in the manifest.
pub fn snapshot(config: &EngineConfig, path: Option<&Path>) -> Result<()> {
    let engine = super::open_engine(config)?;
    match path {
        Some(path) => {
            engine.snapshot(path)?;
            println!("Snapshot written to {}", path.display());
        }
        None => {
            let dir = engine.persist_snapshot()?;
            println!("Snapshot written to {}", dir.display());
        }
    }
    Ok(())
}

/// Restore from a snapshot directory, or from the newest manifest entry when
/// no path is given.
pub fn restore(config: &EngineConfig, path: Option<&Path>) -> Result<()> {
    let engine = super::open_engine(config)?;
    match path {
        Some(path) => {
            engine.restore(path)?;
            println!("Restored from {}", path.display());
        }
        None => {
            if engine.restore_latest_snapshot()? {
                println!("Restored latest snapshot ({} entries)", engine.count());
            } else {
                println!("No usable snapshot found.");
            }
        }
    }
    Ok(())
}
