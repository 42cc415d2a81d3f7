//! Dispatcher routes

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue},
    response::Response,
    routing::post,
    Router,
};
use fetcheach_common::{stream::JOB_ID_HEADER, types::parse_batch, RequestSpec};
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::sharding::{chunk_size, into_chunks, shard};
use crate::api::AppState;
use crate::config::QueueConfig;
use crate::error::{AppError, ServerResult};
use crate::features::shared::{completion_response, wants_stream};
use crate::queue::{QueueError, TaskQueue};

/// Create dispatcher routes
pub fn dispatch_routes() -> Router<AppState> {
    Router::new().route("/", post(submit))
}

/// Submit a batch
///
/// POST / with a JSON array of URL strings, request objects or nulls
async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    let requests = parse_batch(value)?;

    let job_id = Uuid::new_v4();
    let expected = requests.len();
    let stream = wants_stream(&headers);
    info!(job_id = %job_id, tasks = expected, stream, "Job submitted");

    let messages = enqueue(state.queue.as_ref(), job_id, requests, &state.config.queue).await?;
    debug!(job_id = %job_id, messages, "Job enqueued");

    let mut response = completion_response(&state.coordinators, job_id, expected, stream).await?;
    if let Ok(value) = HeaderValue::from_str(&job_id.to_string()) {
        response.headers_mut().insert(JOB_ID_HEADER, value);
    }
    Ok(response)
}

/// Shard a job's tasks over the queue partitions and send them
///
/// Returns the number of send batches issued.
pub async fn enqueue(
    queue: &dyn TaskQueue,
    job_id: Uuid,
    requests: Vec<Option<RequestSpec>>,
    config: &QueueConfig,
) -> Result<usize, QueueError> {
    let shards = shard(job_id, requests, queue.partitions());
    let per_partition = shards.iter().map(Vec::len).max().unwrap_or(0);
    let size = chunk_size(
        per_partition,
        config.min_batch,
        config.max_batch.min(queue.max_batch()),
    );

    let sends: Vec<_> = shards
        .into_iter()
        .enumerate()
        .flat_map(|(partition, shard)| {
            into_chunks(shard, size)
                .into_iter()
                .map(move |chunk| (partition, chunk))
        })
        .collect();
    let batches = sends.len();

    try_join_all(
        sends
            .into_iter()
            .map(|(partition, chunk)| queue.send_batch(partition, chunk)),
    )
    .await?;

    Ok(batches)
}
