//! Job routes

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use fetcheach_common::ResultRecord;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::AppState;
use crate::coordinator::CoordinatorClient;
use crate::error::ServerResult;
use crate::features::shared::{completion_response, wants_stream};

/// Create job routes
pub fn jobs_routes() -> Router<AppState> {
    Router::new().route("/jobs/:job_id", get(await_job).post(record))
}

#[derive(Debug, Deserialize)]
pub struct AwaitQuery {
    /// Number of tasks in the job
    pub count: usize,
}

/// Await or stream a job
///
/// GET /jobs/:job_id?count=3
async fn await_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<AwaitQuery>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    completion_response(&state.coordinators, job_id, query.count, wants_stream(&headers)).await
}

/// Upsert one result record
///
/// POST /jobs/:job_id
async fn record(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(record): Json<ResultRecord>,
) -> Response {
    let index = record.index;
    match state.coordinators.record(job_id, record).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => {
            tracing::error!(job_id = %job_id, index, error = %e, "Failed to record result");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false })),
            )
                .into_response()
        }
    }
}
