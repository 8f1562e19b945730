use anyhow::Result;

use crate::config::EngineConfig;

/// Run one compaction pass and report what it evicted.
pub fn compact(config: &EngineConfig) -> Result<()> {
    let engine = super::open_engine(config)?;
    let before = engine.count();
    let evicted = engine.compact_now()?;
    println!("Evicted {evicted} of {before} entries");
    Ok(())
}
