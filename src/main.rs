//! Cases full-sync tool
//!
//! Mirrors the Cases table of the case tracking database into the data warehouse:
//! extract, stage, then upsert and delete-missing in one transaction.

// casesync/src/main.rs
mod cases;
mod config;
mod errors;
mod extract;
mod load;
mod sync;
mod utils;

use anyhow::{Context, Result};
use config::AppConfig;
use std::process::ExitCode;
use sync::SyncOutcome;

/// Main entry point. Takes no arguments; everything comes from config.json and the environment.
#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(outcome) => {
            match outcome {
                SyncOutcome::Completed { report, .. } => println!(
                    "✅ Sync completed: {} staged, {} upserted, {} deleted.",
                    report.staged, report.upserted, report.deleted
                ),
                SyncOutcome::NoRecords => println!("ℹ️  Source returned no records, nothing loaded."),
                SyncOutcome::ExtractionFailed(reason) => {
                    println!("⚠️  Extraction failed, nothing loaded: {}", reason)
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<SyncOutcome> {
    // A .env file is optional; real deployments set the variables directly.
    dotenv::dotenv().ok();

    let app_config = AppConfig::load().context("Failed to load application configuration")?;
    let log_path = utils::logging::init_logging(&app_config.log_dir)?;
    log::info!("Writing log to {}", log_path.display());

    sync::run_sync_flow(&app_config)
        .await
        .context("Sync process failed")
}
