use anyhow::Result;

use crate::config::EngineConfig;
use crate::decay::ScoringMode;

/// Run a search from the terminal.
pub fn search(
    config: &EngineConfig,
    query: &str,
    k: usize,
    scoring: ScoringMode,
    filter_pairs: &[String],
) -> Result<()> {
    let engine = super::open_engine(config)?;
    let filter = super::parse_filter_pairs(filter_pairs)?;

    let hits = engine.search(query, filter.as_ref(), k, scoring)?;

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let preview = if hit.text.len() > 120 {
            format!("{}...", &hit.text[..120])
        } else {
            hit.text.clone()
        };

        println!("  {}. {} (score: {:.4})", i + 1, hit.id, hit.score);
        println!("     {preview}");
        println!();
    }

    Ok(())
}
