//! Feature modules implementing the fetch-each API
//!
//! # Features
//!
//! - **dispatch**: batch intake, validation and sharding across queue partitions
//! - **jobs**: per-job coordinator endpoints (await completion, record upsert)
//! - **shared**: completion response rendering used by both
//!
//! Every route here requires the bearer credential; the router in
//! [`crate::api`] applies the check.

pub mod dispatch;
pub mod jobs;
pub mod shared;

use axum::Router;

use crate::api::AppState;

/// Creates the router with all authenticated feature routes mounted
///
/// - `POST /` - Submit a batch
/// - `GET /jobs/:job_id?count=n` - Await or stream a job
/// - `POST /jobs/:job_id` - Upsert one result record
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(dispatch::dispatch_routes())
        .merge(jobs::jobs_routes())
}
