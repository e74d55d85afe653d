// casesync/src/sync/logic.rs
use chrono::{Duration, Local};
use log::{error, info, warn};

use crate::errors::Result;
use crate::extract::{extract, CaseSource, ExtractionResult};
use crate::load::{reconcile, ReconcileReport, TargetStore};

const BANNER: &str = "==================================================";

/// Where a run is. `Stopped` is the clean early exit on an empty extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Start,
    Extracting,
    Loading,
    Stopped,
    Done,
    Failed,
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed {
        report: ReconcileReport,
        duration: Duration,
    },
    /// The source returned zero rows. The target is left as is.
    NoRecords,
    /// The source could not be read. The target is left as is.
    ExtractionFailed(String),
}

impl SyncOutcome {
    pub fn phase(&self) -> SyncPhase {
        match self {
            SyncOutcome::Completed { .. } => SyncPhase::Done,
            SyncOutcome::NoRecords | SyncOutcome::ExtractionFailed(_) => SyncPhase::Stopped,
        }
    }
}

fn enter(phase: &mut SyncPhase, next: SyncPhase) {
    info!("Sync phase {:?} -> {:?}", phase, next);
    *phase = next;
}

/// Runs one full sync cycle: extract everything from `source`, then make
/// `target_entity` in `store` mirror it.
///
/// An empty or failed extraction stops the run without touching the target.
/// Load failures are logged and returned; nothing is retried.
pub async fn run_pipeline<S, T>(source: &S, store: &mut T, target_entity: &str) -> Result<SyncOutcome>
where
    S: CaseSource + ?Sized,
    T: TargetStore + ?Sized,
{
    let mut phase = SyncPhase::Start;
    info!("{}", BANNER);
    info!("Starting ETL Process for {} Data", target_entity);
    info!("{}", BANNER);
    let start_time = Local::now();

    enter(&mut phase, SyncPhase::Extracting);
    let records = match extract(source).await {
        ExtractionResult::Extracted(records) if records.is_empty() => {
            enter(&mut phase, SyncPhase::Stopped);
            warn!("Source returned no records. ETL process terminated, target left unchanged.");
            return Ok(SyncOutcome::NoRecords);
        }
        ExtractionResult::Extracted(records) => records,
        ExtractionResult::Failed(reason) => {
            enter(&mut phase, SyncPhase::Stopped);
            warn!("No data extracted. ETL process terminated.");
            return Ok(SyncOutcome::ExtractionFailed(reason));
        }
    };

    enter(&mut phase, SyncPhase::Loading);
    let report = match reconcile(store, &records, target_entity).await {
        Ok(report) => report,
        Err(e) => {
            enter(&mut phase, SyncPhase::Failed);
            error!("ETL process failed: {}", e);
            if e.target_untouched() {
                error!("Target table {} was left unchanged.", target_entity);
            } else {
                error!("Target table {} state is unknown; verify it before the next run.", target_entity);
            }
            return Err(e);
        }
    };

    enter(&mut phase, SyncPhase::Done);
    let duration = Local::now() - start_time;
    info!("{}", BANNER);
    info!(
        "ETL Process completed successfully in {}.{:03}s ({} staged, {} upserted, {} deleted)",
        duration.num_seconds(),
        duration.num_milliseconds() % 1000,
        report.staged,
        report.upserted,
        report.deleted
    );
    info!("{}", BANNER);

    Ok(SyncOutcome::Completed { report, duration })
}
