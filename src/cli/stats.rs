use anyhow::Result;

use crate::config::EngineConfig;

/// Display store statistics in the terminal.
pub fn stats(config: &EngineConfig) -> Result<()> {
    let engine = super::open_engine(config)?;

    println!("Store Statistics");
    println!("{}", "=".repeat(40));
    println!("  Path:            {}", config.resolved_db_path().display());
    println!("  Total entries:   {}", engine.count());
    println!("  Index backend:   {}", config.index.backend.as_str());
    println!("  Decay strategy:  {}", config.decay.strategy.as_str());
    println!();

    println!("By Shard:");
    for (i, size) in engine.shard_sizes().iter().enumerate() {
        println!("  shard_{:<10} {}", i, size);
    }

    Ok(())
}
