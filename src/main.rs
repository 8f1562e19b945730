mod cli;
mod cluster;
mod config;
mod db;
mod decay;
mod embedding;
mod engine;
mod error;
mod index;
mod replica;
mod shard;
mod snapshot;
mod types;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::decay::ScoringMode;

#[derive(Parser)]
#[command(
    name = "engram",
    version,
    about = "Sharded, persistent vector memory engine"
)]
struct Cli {
    /// Config file path (defaults to ~/.engram/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store one entry
    Add {
        text: String,
        /// Metadata as KEY=VALUE, repeatable
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Search stored entries
    Search {
        query: String,
        /// Number of results
        #[arg(short, long, default_value_t = 5)]
        k: usize,
        /// Scoring mode: hybrid, similarity, or recency
        #[arg(long, default_value = "hybrid")]
        scoring: ScoringMode,
        /// Equality filter as KEY=VALUE, repeatable
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filter: Vec<String>,
    },
    /// List stored entries, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filter: Vec<String>,
    },
    /// Re-embed an existing entry with new text
    Rewrite { id: String, text: String },
    /// Remove entries by id
    Delete { ids: Vec<String> },
    /// Show store statistics
    Stats,
    /// Take a snapshot of every shard
    Snapshot {
        /// Target directory; omitted means a manifest-tracked snapshot
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Restore shards from a snapshot
    Restore {
        /// Snapshot directory; omitted means the newest manifest entry
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Run one decay-driven compaction pass
    Compact,
    /// Cluster stored vectors with k-means
    Cluster {
        #[arg(short, long, default_value_t = 4)]
        k: usize,
        /// Maximum vectors to cluster
        #[arg(long, default_value_t = 10_000)]
        limit: usize,
    },
    /// Keep the store open with background compaction until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => config::EngineConfig::load_from(path)?,
        None => config::EngineConfig::load()?,
    };

    // Log to stderr so stdout stays clean for command output.
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Add { text, meta } => cli::add::add(&config, &text, &meta)?,
        Command::Search {
            query,
            k,
            scoring,
            filter,
        } => cli::search::search(&config, &query, k, scoring, &filter)?,
        Command::List { limit, filter } => cli::list::list(&config, limit, &filter)?,
        Command::Rewrite { id, text } => cli::add::rewrite(&config, &id, &text)?,
        Command::Delete { ids } => cli::add::delete(&config, &ids)?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Snapshot { path } => cli::snapshot::snapshot(&config, path.as_deref())?,
        Command::Restore { path } => cli::snapshot::restore(&config, path.as_deref())?,
        Command::Compact => cli::compact::compact(&config)?,
        Command::Cluster { k, limit } => cli::cluster::cluster(&config, k, limit)?,
        Command::Watch => cli::watch::watch(&config).await?,
    }

    Ok(())
}
