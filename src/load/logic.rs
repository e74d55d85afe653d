// casesync/src/load/logic.rs
use log::{error, info, warn};

use crate::cases::{validate_snapshot, CaseRecord};
use crate::errors::{Result, SyncError};
use crate::load::store::{TargetStore, TargetTransaction};
use crate::utils::identifiers::TableName;

/// Row counts of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub skipped: bool,
    pub staged: u64,
    pub upserted: u64,
    pub deleted: u64,
}

impl ReconcileReport {
    fn skipped() -> Self {
        ReconcileReport {
            skipped: true,
            ..Default::default()
        }
    }
}

/// Makes the target table mirror `records`.
///
/// 1. Validates the target identifier and the key invariant of the snapshot.
/// 2. Replaces the holding area `<entity>_staging` with `records`.
/// 3. In one transaction: upserts staged rows by `NationalId`, then deletes
///    target rows missing from the holding area, then commits.
///
/// Any failure in step 3 rolls the transaction back, so the target is left
/// exactly as it was. An empty `records` is a no-op: it never clears the target.
pub async fn reconcile<S>(
    store: &mut S,
    records: &[CaseRecord],
    target_entity: &str,
) -> Result<ReconcileReport>
where
    S: TargetStore + ?Sized,
{
    if records.is_empty() {
        warn!("No data to load: record set is empty, {} left untouched.", target_entity);
        return Ok(ReconcileReport::skipped());
    }

    let target = TableName::entity(target_entity)?;
    let staging = target.staging()?;
    validate_snapshot(records)?;

    info!("Starting data load to table: {}", target);
    info!("Loading {} records to staging table: {}", records.len(), staging);
    let staged = store
        .replace_staging(&staging, records)
        .await
        .map_err(|e| {
            error!("Staging failed for {}: {}", staging, e);
            SyncError::staging(staging.as_str(), e)
        })?;

    let mut tx = store
        .begin()
        .await
        .map_err(|e| SyncError::reconciliation(target.as_str(), e))?;

    match apply_full_sync(&mut *tx, &target, &staging).await {
        Ok((upserted, deleted)) => {
            tx.commit()
                .await
                .map_err(|e| {
                    error!("Commit failed for {}: {}", target, e);
                    SyncError::commit(target.as_str(), e)
                })?;
            info!("Full sync completed successfully: insert/update/delete operations applied.");
            Ok(ReconcileReport {
                skipped: false,
                staged,
                upserted,
                deleted,
            })
        }
        Err(e) => {
            error!("Transaction failed, rolling back: {}", e);
            if let Err(rollback_err) = tx.rollback().await {
                // The store discards the transaction when the connection drops.
                error!("Explicit rollback failed: {}", rollback_err);
            }
            Err(SyncError::reconciliation(target.as_str(), e))
        }
    }
}

/// Upsert then delete-missing against the same staged snapshot.
async fn apply_full_sync(
    tx: &mut dyn TargetTransaction,
    target: &TableName,
    staging: &TableName,
) -> Result<(u64, u64)> {
    info!("Executing upsert operation (insert/update)...");
    let upserted = tx.upsert_from_staging(target, staging).await?;
    info!("Upsert operation affected {} rows", upserted);

    info!("Executing DELETE operation for missing records...");
    let deleted = tx.delete_missing(target, staging).await?;
    info!("DELETE operation affected {} rows", deleted);

    Ok((upserted, deleted))
}
