use crate::db::DEFAULT_POOL_SIZE;
use crate::decay::DecayStrategy;
use crate::error::{EngineError, Result};
use crate::index::IndexBackend;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub log_level: String,
    pub storage: StorageConfig,
    pub index: IndexConfig,
    pub decay: DecayConfig,
    pub maintenance: MaintenanceConfig,
    pub replica: ReplicaConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the shard databases, snapshots, and operation log.
    pub db_path: String,
    pub shards: usize,
    /// SQLite connections held open per shard.
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DecayConfig {
    pub strategy: DecayStrategy,
    /// Characteristic age in seconds; weight falls to 1/e at this age.
    pub decay_seconds: f64,
    /// Compaction evicts entries whose weight falls strictly below this.
    pub threshold: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub compaction_interval_secs: u64,
    /// Additions between automatic snapshots; 0 disables them.
    pub snapshot_interval: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReplicaConfig {
    /// Base URL of the HTTP replica backend. None disables replication.
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            storage: StorageConfig::default(),
            index: IndexConfig::default(),
            decay: DecayConfig::default(),
            maintenance: MaintenanceConfig::default(),
            replica: ReplicaConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_engram_dir()
            .join("store")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            shards: 4,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Dense,
        }
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            strategy: DecayStrategy::Exponential,
            decay_seconds: 86_400.0,
            threshold: 0.01,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            compaction_interval_secs: 3600,
            snapshot_interval: 100,
        }
    }
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 5,
        }
    }
}

/// Returns `~/.engram/`
pub fn default_engram_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".engram")
}

/// Returns the default config file path: `~/.engram/config.toml`
pub fn default_config_path() -> PathBuf {
    default_engram_dir().join("config.toml")
}

impl EngineConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)
                .map_err(|e| EngineError::Config(format!("failed to parse config TOML: {e}")))?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EngineConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (ENGRAM_DB, ENGRAM_SHARDS,
    /// ENGRAM_REPLICA_URL, ENGRAM_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ENGRAM_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_SHARDS") {
            if let Ok(shards) = val.parse() {
                self.storage.shards = shards;
            }
        }
        if let Ok(val) = std::env::var("ENGRAM_REPLICA_URL") {
            self.replica.url = Some(val);
        }
        if let Ok(val) = std::env::var("ENGRAM_LOG_LEVEL") {
            self.log_level = val;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.shards == 0 {
            return Err(EngineError::Config("shard count must be at least 1".into()));
        }
        if self.storage.pool_size == 0 {
            return Err(EngineError::Config("pool size must be at least 1".into()));
        }
        if self.decay.decay_seconds <= 0.0 {
            return Err(EngineError::Config(
                "decay_seconds must be positive".into(),
            ));
        }
        if !(self.decay.threshold > 0.0 && self.decay.threshold <= 1.0) {
            return Err(EngineError::Config(
                "decay threshold must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the storage directory, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
