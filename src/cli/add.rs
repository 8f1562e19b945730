use anyhow::Result;

use crate::config::EngineConfig;

/// Store one entry from the terminal.
pub fn add(config: &EngineConfig, text: &str, meta_pairs: &[String]) -> Result<()> {
    let engine = super::open_engine(config)?;
    let metadata = super::parse_meta_pairs(meta_pairs)?;

    let id = engine.add_vector(text, metadata)?;
    println!("Stored {id}");
    Ok(())
}

/// Re-embed an existing entry with new text.
pub fn rewrite(config: &EngineConfig, id: &str, text: &str) -> Result<()> {
    let engine = super::open_engine(config)?;
    engine.rewrite_vector(id, text)?;
    println!("Rewrote {id}");
    Ok(())
}

/// Remove entries by id.
pub fn delete(config: &EngineConfig, ids: &[String]) -> Result<()> {
    let engine = super::open_engine(config)?;
    let removed = engine.delete_vectors(ids)?;
    println!("Removed {removed} of {} entries", ids.len());
    Ok(())
}
