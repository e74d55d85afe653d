// casesync/src/sync/mod.rs
pub(crate) mod logic;

use anyhow::{Context, Result};
use log::info;

use crate::config::AppConfig;
use crate::extract::PgCaseSource;
use crate::load::PgTargetStore;

pub use logic::{run_pipeline, SyncOutcome};

/// Public entry point for the sync process.
/// Wires the PostgreSQL source and warehouse from the configuration and runs one cycle.
pub async fn run_sync_flow(app_config: &AppConfig) -> Result<SyncOutcome> {
    info!("Source: {}", app_config.source);
    info!("Target: {}", app_config.target);

    let source = PgCaseSource::new(
        app_config.source.url(),
        app_config.source_entity.clone(),
        app_config.acquire_timeout,
    );
    let mut store = PgTargetStore::connect_lazy(app_config.target.url(), app_config.acquire_timeout)
        .context("Invalid target database configuration")?;

    let outcome = run_pipeline(&source, &mut store, app_config.target_entity.as_str()).await;
    store.close().await;

    let outcome = outcome.with_context(|| format!("Full sync of {} failed", app_config.target_entity))?;
    info!("Sync finished in phase {:?}", outcome.phase());
    Ok(outcome)
}
