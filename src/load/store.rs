// casesync/src/load/store.rs
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::time::Duration;

use crate::cases::{CaseRecord, CASE_COLUMNS, KEY_COLUMN};
use crate::errors::Result;
use crate::utils::identifiers::TableName;

/// Rows per staging INSERT. 7 binds per row keeps us far below the
/// 65535-parameter limit of the PostgreSQL wire protocol.
const STAGING_CHUNK_ROWS: usize = 1000;

/// The relational store the warehouse table lives in.
#[async_trait]
pub trait TargetStore: Send {
    /// Drops and repopulates the holding area with `records`.
    /// Returns the number of rows staged.
    async fn replace_staging(&mut self, staging: &TableName, records: &[CaseRecord]) -> Result<u64>;

    /// Opens the unit of work the upsert and delete-missing steps share.
    async fn begin<'a>(&'a mut self) -> Result<Box<dyn TargetTransaction + 'a>>;
}

/// An open transaction on the target store. Dropping it without `commit` discards its work.
#[async_trait]
pub trait TargetTransaction: Send {
    /// Inserts unmatched staged rows and overwrites non-key fields of matched ones.
    async fn upsert_from_staging(&mut self, target: &TableName, staging: &TableName) -> Result<u64>;

    /// Deletes target rows whose key is absent from the holding area.
    async fn delete_missing(&mut self, target: &TableName, staging: &TableName) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

fn quoted_columns() -> String {
    CASE_COLUMNS
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_staging_sql(staging: &TableName) -> String {
    format!(
        r#"CREATE TABLE {} (
            "Name" TEXT,
            "PhoneNumber1" TEXT,
            "NationalId" TEXT NOT NULL PRIMARY KEY,
            "City" TEXT,
            "Gender" TEXT,
            "FamilyNumber" TEXT,
            "Age" INTEGER
        )"#,
        staging.quoted()
    )
}

/// Upsert keyed on `NationalId`. The target needs a unique constraint on that column.
pub fn upsert_sql(target: &TableName, staging: &TableName) -> String {
    let columns = quoted_columns();
    let assignments = CASE_COLUMNS
        .iter()
        .filter(|c| **c != KEY_COLUMN)
        .map(|c| format!("\"{0}\" = EXCLUDED.\"{0}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {target} ({columns}) SELECT {columns} FROM {staging} \
         ON CONFLICT (\"{key}\") DO UPDATE SET {assignments}",
        target = target.quoted(),
        staging = staging.quoted(),
        columns = columns,
        key = KEY_COLUMN,
        assignments = assignments,
    )
}

/// `NOT EXISTS` rather than `NOT IN` so a NULL key on either side cannot
/// turn the predicate into UNKNOWN and silently keep stale rows.
pub fn delete_missing_sql(target: &TableName, staging: &TableName) -> String {
    format!(
        "DELETE FROM {target} AS t WHERE NOT EXISTS \
         (SELECT 1 FROM {staging} AS s WHERE s.\"{key}\" = t.\"{key}\")",
        target = target.quoted(),
        staging = staging.quoted(),
        key = KEY_COLUMN,
    )
}

/// PostgreSQL-backed warehouse.
pub struct PgTargetStore {
    pool: PgPool,
}

impl PgTargetStore {
    /// Does not connect; the first statement opens the single connection.
    pub fn connect_lazy(url: &str, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)?;
        Ok(PgTargetStore { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TargetStore for PgTargetStore {
    async fn replace_staging(&mut self, staging: &TableName, records: &[CaseRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", staging.quoted()))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&create_staging_sql(staging))
            .execute(&mut *tx)
            .await?;

        let mut staged = 0u64;
        for chunk in records.chunks(STAGING_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                staging.quoted(),
                quoted_columns()
            ));
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.name.clone())
                    .push_bind(record.phone_number1.clone())
                    .push_bind(record.national_id.clone())
                    .push_bind(record.city.clone())
                    .push_bind(record.gender_label())
                    .push_bind(record.family_number.clone())
                    .push_bind(record.age);
            });
            staged += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(staged)
    }

    async fn begin<'a>(&'a mut self) -> Result<Box<dyn TargetTransaction + 'a>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTargetTransaction { tx }))
    }
}

pub struct PgTargetTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TargetTransaction for PgTargetTransaction {
    async fn upsert_from_staging(&mut self, target: &TableName, staging: &TableName) -> Result<u64> {
        let result = sqlx::query(&upsert_sql(target, staging))
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_missing(&mut self, target: &TableName, staging: &TableName) -> Result<u64> {
        let result = sqlx::query(&delete_missing_sql(target, staging))
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
