//! In-process result store

use async_trait::async_trait;
use fetcheach_common::ResultRecord;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ResultStore, StoreError};

/// Result store kept in memory; state is lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, BTreeMap<usize, ResultRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs with at least one record
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn upsert(&self, job_id: Uuid, record: &ResultRecord) -> Result<(), StoreError> {
        self.jobs
            .write()
            .await
            .entry(job_id)
            .or_default()
            .insert(record.index, record.clone());
        Ok(())
    }

    async fn scan(&self, job_id: Uuid) -> Result<Vec<ResultRecord>, StoreError> {
        Ok(self
            .jobs
            .read()
            .await
            .get(&job_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn purge(&self, job_id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .jobs
            .write()
            .await
            .remove(&job_id)
            .map(|records| records.len() as u64)
            .unwrap_or(0))
    }
}
