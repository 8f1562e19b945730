use anyhow::Result;

use crate::config::EngineConfig;
use crate::types::{MetaValue, TIMESTAMP_KEY};

/// List stored entries, newest first, optionally filtered by metadata.
pub fn list(config: &EngineConfig, limit: usize, filter_pairs: &[String]) -> Result<()> {
    let engine = super::open_engine(config)?;
    let filter = super::parse_filter_pairs(filter_pairs)?;

    let entries = engine.query_vectors(filter.as_ref(), limit);
    if entries.is_empty() {
        println!("No entries found.");
        return Ok(());
    }

    println!("{} entr{}\n", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
    for entry in &entries {
        let ts = entry
            .metadata
            .get(TIMESTAMP_KEY)
            .and_then(MetaValue::as_str)
            .unwrap_or("-");
        let preview = if entry.text.len() > 80 {
            format!("{}...", &entry.text[..80])
        } else {
            entry.text.clone()
        };
        println!("  {}  {}", entry.id, ts);
        println!("     {preview}");
    }

    Ok(())
}
