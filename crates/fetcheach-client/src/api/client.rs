//! HTTP API client for a fetch-each server
//!
//! Submits batches and follows the progress stream until the ordered result
//! arrives.

use fetcheach_common::{
    stream::{FrameParser, EVENT_STREAM, JOB_ID_HEADER, TIMEOUT_PREFIX},
    BatchItem, FinalResult, RequestSpec, ResultEntry, StreamFrame, StreamUpdate,
};
use futures::StreamExt;
use reqwest::{header, Client, Response};
use tracing::{debug, info, warn};

use crate::api::endpoints;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// API client for a fetch-each server
#[derive(Debug, Clone)]
pub struct FetchEachClient {
    client: Client,
    config: ClientConfig,
}

impl FetchEachClient {
    /// Create a new API client
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("fetcheach-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check server health
    pub async fn health_check(&self) -> Result<bool> {
        let url = endpoints::health_url(&self.config.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Submit a batch and wait for its ordered results
    ///
    /// `on_update` is called for every progress frame. The returned array has
    /// one entry per submitted item, in submission order.
    pub async fn submit_batch<F>(&self, items: Vec<BatchItem>, on_update: F) -> Result<Vec<ResultEntry>>
    where
        F: FnMut(&StreamUpdate),
    {
        let url = endpoints::submit_url(&self.config.base_url);
        let requests: Vec<Option<RequestSpec>> =
            items.into_iter().map(BatchItem::into_request).collect();
        info!(tasks = requests.len(), "Submitting batch");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, EVENT_STREAM)
            .json(&requests)
            .send()
            .await?;

        read_completion(response, on_update).await
    }

    /// Submit a batch without progress reporting
    pub async fn fetch_each(&self, items: Vec<BatchItem>) -> Result<Vec<ResultEntry>> {
        self.submit_batch(items, |_| {}).await
    }

    /// Re-attach to a running job
    ///
    /// `job_id` is the one reported in [`ClientError::StreamEnded`]; `count` is
    /// the number of items the job was submitted with.
    pub async fn await_job<F>(&self, job_id: &str, count: usize, on_update: F) -> Result<Vec<ResultEntry>>
    where
        F: FnMut(&StreamUpdate),
    {
        let url = endpoints::job_url(&self.config.base_url, job_id, count);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, EVENT_STREAM)
            .send()
            .await?;

        read_completion(response, on_update).await
    }
}

async fn read_completion<F>(response: Response, mut on_update: F) -> Result<Vec<ResultEntry>>
where
    F: FnMut(&StreamUpdate),
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::api(status.as_u16(), body));
    }

    let job_id = response
        .headers()
        .get(JOB_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    if let Some(job_id) = &job_id {
        debug!(job_id = %job_id, "Job accepted");
    }

    let streaming = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(EVENT_STREAM));

    // The server only streams when asked; a plain JSON answer is the array itself
    if !streaming {
        let array: Vec<ResultEntry> = response.json().await?;
        return Ok(array);
    }

    let mut parser = FrameParser::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for raw in parser.push(&chunk) {
            match raw.decode()? {
                StreamFrame::Update(update) => {
                    debug!(done = update.done, "Progress update");
                    on_update(&update);
                }
                StreamFrame::Result(result) => return finish(result),
            }
        }
    }

    warn!(pending = parser.pending(), "Stream closed before the result frame");
    Err(ClientError::StreamEnded { job_id })
}

fn finish(result: FinalResult) -> Result<Vec<ResultEntry>> {
    match result.error {
        None => Ok(result.array),
        Some(message) if message.starts_with(TIMEOUT_PREFIX) => Err(ClientError::Timeout {
            message,
            partial: result.array,
        }),
        Some(message) => Err(ClientError::Job(message)),
    }
}
