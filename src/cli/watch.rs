use anyhow::Result;
use tracing::info;

use crate::config::EngineConfig;

/// Keep the store open with the periodic compactor running until Ctrl-C.
pub async fn watch(config: &EngineConfig) -> Result<()> {
    let engine = super::open_engine(config)?;
    let tasks = engine.start_background();

    info!(
        interval_secs = config.maintenance.compaction_interval_secs,
        "background compactor running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    tasks.shutdown().await;
    Ok(())
}
