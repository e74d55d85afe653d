// casesync/src/extract/logic.rs
use async_trait::async_trait;
use log::{error, info};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use crate::cases::{CaseRecord, SourceCaseRow};
use crate::errors::{Result, SyncError};
use crate::utils::identifiers::TableName;

const PREVIEW_ROWS: usize = 5;

/// Where case records come from.
#[async_trait]
pub trait CaseSource: Send + Sync {
    /// Reads every current case, already mapped to warehouse shape.
    async fn fetch_all(&self) -> Result<Vec<CaseRecord>>;
}

/// Outcome of the extraction phase. A failure is not an error for the
/// process: the run stops without touching the target.
#[derive(Debug)]
pub enum ExtractionResult {
    Extracted(Vec<CaseRecord>),
    Failed(String),
}

/// Fixed projection over the case entity. The source keys cases by
/// `CaseNumber`, which the warehouse calls `NationalId`.
pub fn source_query(source_table: &TableName) -> String {
    format!(
        r#"SELECT
            "Name",
            "PhoneNumber1",
            "CaseNumber"::text AS "NationalId",
            "City",
            "Gender"::int4 AS "Gender",
            "FamilyNumber"::text AS "FamilyNumber",
            "Age"::int4 AS "Age"
        FROM {}"#,
        source_table.quoted()
    )
}

/// Case tracking database on PostgreSQL.
pub struct PgCaseSource {
    url: String,
    source_table: TableName,
    acquire_timeout: Duration,
}

impl PgCaseSource {
    pub fn new(url: impl Into<String>, source_table: TableName, acquire_timeout: Duration) -> Self {
        PgCaseSource {
            url: url.into(),
            source_table,
            acquire_timeout,
        }
    }
}

#[async_trait]
impl CaseSource for PgCaseSource {
    async fn fetch_all(&self) -> Result<Vec<CaseRecord>> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.url)
            .await
            .map_err(|e| SyncError::Extraction(format!("failed to connect to source: {}", e)))?;

        let rows = sqlx::query_as::<_, SourceCaseRow>(&source_query(&self.source_table))
            .fetch_all(&pool)
            .await;
        // Release the source connection before any further work.
        pool.close().await;

        let rows = rows.map_err(|e| {
            SyncError::Extraction(format!("query on {} failed: {}", self.source_table, e))
        })?;
        Ok(rows.into_iter().map(CaseRecord::from).collect())
    }
}

/// Runs the extraction phase, turning any failure into `ExtractionResult::Failed`.
pub async fn extract<S>(source: &S) -> ExtractionResult
where
    S: CaseSource + ?Sized,
{
    info!("Starting data extraction...");
    match source.fetch_all().await {
        Ok(records) => {
            info!("Successfully extracted {} records", records.len());
            log_preview(&records);
            ExtractionResult::Extracted(records)
        }
        Err(e) => {
            error!("Data extraction failed: {}", e);
            ExtractionResult::Failed(e.to_string())
        }
    }
}

fn log_preview(records: &[CaseRecord]) {
    if records.is_empty() {
        return;
    }
    info!("First {} rows of the extracted data:", records.len().min(PREVIEW_ROWS));
    for record in records.iter().take(PREVIEW_ROWS) {
        match serde_json::to_string(record) {
            Ok(line) => info!("  {}", line),
            Err(_) => info!("  {:?}", record),
        }
    }
}
