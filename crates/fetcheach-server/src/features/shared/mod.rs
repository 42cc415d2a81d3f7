//! Completion responses shared by the dispatcher and the jobs endpoints

use axum::{
    http::{header::ACCEPT, HeaderMap},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use fetcheach_common::stream::EVENT_STREAM;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use uuid::Uuid;

use crate::coordinator::CoordinatorRegistry;
use crate::error::ServerResult;

/// Whether the caller asked for a progress stream
pub fn wants_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains(EVENT_STREAM))
}

/// Await a job and render its outcome
///
/// Streaming callers get `update` frames followed by one `result` frame.
/// Everyone else gets the ordered JSON array once the job completes, or a
/// 504 carrying the partial array when the poll ceiling elapses.
pub async fn completion_response(
    coordinators: &CoordinatorRegistry,
    job_id: Uuid,
    expected: usize,
    stream: bool,
) -> ServerResult<Response> {
    if stream {
        let frames = ReceiverStream::new(coordinators.watch(job_id, expected))
            .map(|frame| Event::default().event(frame.event_name()).json_data(&frame));
        return Ok(Sse::new(frames).into_response());
    }

    let result = coordinators.await_completion(job_id, expected).await?;
    Ok(Json(result.array).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_wants_stream() {
        let mut headers = HeaderMap::new();
        assert!(!wants_stream(&headers));

        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!wants_stream(&headers));

        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/event-stream, application/json;q=0.5"),
        );
        assert!(wants_stream(&headers));
    }
}
