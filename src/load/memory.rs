// In-memory target store with fault injection, used by the reconciler and pipeline tests.
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

use crate::cases::CaseRecord;
use crate::errors::{Result, SyncError};
use crate::load::store::{TargetStore, TargetTransaction};
use crate::utils::identifiers::TableName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Staging,
    Begin,
    Upsert,
    DeleteMissing,
    Commit,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub target: BTreeMap<String, CaseRecord>,
    pub staging: Option<Vec<CaseRecord>>,
    pub fail_at: Option<FaultPoint>,
    pub staging_writes: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

impl MemoryStore {
    pub fn with_rows(rows: Vec<CaseRecord>) -> Self {
        MemoryStore {
            target: rows.into_iter().map(|r| (r.national_id.clone(), r)).collect(),
            ..Default::default()
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        self.target.keys().map(String::as_str).collect()
    }

    fn check(&self, point: FaultPoint) -> Result<()> {
        if self.fail_at == Some(point) {
            return Err(SyncError::Sqlx(sqlx::Error::Protocol(format!(
                "injected fault at {:?}",
                point
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn replace_staging(&mut self, _staging: &TableName, records: &[CaseRecord]) -> Result<u64> {
        self.check(FaultPoint::Staging)?;
        self.staging = Some(records.to_vec());
        self.staging_writes += 1;
        Ok(records.len() as u64)
    }

    async fn begin<'a>(&'a mut self) -> Result<Box<dyn TargetTransaction + 'a>> {
        self.check(FaultPoint::Begin)?;
        let working = self.target.clone();
        Ok(Box::new(MemoryTransaction { store: self, working }))
    }
}

pub struct MemoryTransaction<'a> {
    store: &'a mut MemoryStore,
    working: BTreeMap<String, CaseRecord>,
}

impl MemoryTransaction<'_> {
    fn staged(&self) -> Result<&[CaseRecord]> {
        self.store
            .staging
            .as_deref()
            .ok_or_else(|| SyncError::Sqlx(sqlx::Error::Protocol("staging table does not exist".into())))
    }
}

#[async_trait]
impl TargetTransaction for MemoryTransaction<'_> {
    async fn upsert_from_staging(&mut self, _target: &TableName, _staging: &TableName) -> Result<u64> {
        self.store.check(FaultPoint::Upsert)?;
        let staged = self.staged()?.to_vec();
        let affected = staged.len() as u64;
        for record in staged {
            self.working.insert(record.national_id.clone(), record);
        }
        Ok(affected)
    }

    async fn delete_missing(&mut self, _target: &TableName, _staging: &TableName) -> Result<u64> {
        self.store.check(FaultPoint::DeleteMissing)?;
        let keep: HashSet<String> = self.staged()?.iter().map(|r| r.national_id.clone()).collect();
        let before = self.working.len();
        self.working.retain(|key, _| keep.contains(key));
        Ok((before - self.working.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { store, working } = *self;
        store.check(FaultPoint::Commit)?;
        store.target = working;
        store.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.store.rollbacks += 1;
        Ok(())
    }
}
