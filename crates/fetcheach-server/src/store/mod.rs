//! Durable per-job result tables
//!
//! A store holds the [`ResultRecord`]s of every live job, addressed by
//! `(job_id, index)`. Only a job's coordinator writes to it.

use async_trait::async_trait;
use fetcheach_common::ResultRecord;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors raised by a result store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt record for job {job_id} at index {index}: {reason}")]
    Corrupt {
        job_id: Uuid,
        index: i64,
        reason: String,
    },
}

/// Table of result records keyed by `(job_id, index)`
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert or fully replace the record at `record.index`
    async fn upsert(&self, job_id: Uuid, record: &ResultRecord) -> Result<(), StoreError>;

    /// All records of a job, ordered by index
    async fn scan(&self, job_id: Uuid) -> Result<Vec<ResultRecord>, StoreError>;

    /// Delete every record of a job, returning how many were removed
    async fn purge(&self, job_id: Uuid) -> Result<u64, StoreError>;
}
