//! PostgreSQL result store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fetcheach_common::ResultRecord;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use super::{ResultStore, StoreError};
use crate::config::DatabaseConfig;

/// Result store backed by the `task_results` table
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct TaskResultRow {
    idx: i64,
    status: i32,
    done: bool,
    error: Option<String>,
    result: Option<Json<Value>>,
    headers: Option<Json<BTreeMap<String, String>>>,
    created_at: DateTime<Utc>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Result store migrations completed");

        Ok(Self::new(pool))
    }

    fn into_record(job_id: Uuid, row: TaskResultRow) -> Result<ResultRecord, StoreError> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            job_id,
            index: row.idx,
            reason: reason.to_string(),
        };

        Ok(ResultRecord {
            index: usize::try_from(row.idx).map_err(|_| corrupt("negative index"))?,
            status: u16::try_from(row.status).map_err(|_| corrupt("status out of range"))?,
            done: row.done,
            error: row.error,
            result: row.result.map(|Json(value)| value),
            headers: row.headers.map(|Json(headers)| headers),
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ResultStore for PgStore {
    async fn upsert(&self, job_id: Uuid, record: &ResultRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO task_results (job_id, idx, status, done, error, result, headers, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (job_id, idx) DO UPDATE SET
                status = EXCLUDED.status,
                done = EXCLUDED.done,
                error = EXCLUDED.error,
                result = EXCLUDED.result,
                headers = EXCLUDED.headers,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(job_id)
        .bind(record.index as i64)
        .bind(i32::from(record.status))
        .bind(record.done)
        .bind(record.error.as_deref())
        .bind(record.result.as_ref().map(Json))
        .bind(record.headers.as_ref().map(Json))
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn scan(&self, job_id: Uuid) -> Result<Vec<ResultRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TaskResultRow>(
            r#"
            SELECT idx, status, done, error, result, headers, created_at
            FROM task_results
            WHERE job_id = $1
            ORDER BY idx ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Self::into_record(job_id, row))
            .collect()
    }

    async fn purge(&self, job_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM task_results WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
