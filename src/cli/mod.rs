pub mod add;
pub mod cluster;
pub mod compact;
pub mod list;
pub mod search;
pub mod snapshot;
pub mod stats;
pub mod watch;

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::embedding::HashingEmbedder;
use crate::engine::MemoryEngine;
use crate::types::{Filter, MetaValue, Metadata};

/// Open the configured store with the built-in hashing embedder.
pub fn open_engine(config: &EngineConfig) -> Result<Arc<MemoryEngine>> {
    let embedder = Arc::new(HashingEmbedder::default());
    Ok(Arc::new(MemoryEngine::open(
        config.clone(),
        embedder,
        None,
    )?))
}

/// Parse `key=value` pairs into a metadata map. Values are coerced to the
/// narrowest kind that parses: bool, then integer, then float, then string.
pub fn parse_meta_pairs(pairs: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("expected KEY=VALUE, got: {pair}");
        };
        metadata.insert(key.to_string(), coerce_value(value));
    }
    Ok(metadata)
}

/// Same shape as [`parse_meta_pairs`], returned as a filter.
pub fn parse_filter_pairs(pairs: &[String]) -> Result<Option<Filter>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    Ok(Some(parse_meta_pairs(pairs)?))
}

fn coerce_value(raw: &str) -> MetaValue {
    if let Ok(b) = raw.parse::<bool>() {
        return MetaValue::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return MetaValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return MetaValue::Float(f);
    }
    MetaValue::Str(raw.to_string())
}
