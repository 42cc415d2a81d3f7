//! Task executor: runs one HTTP request and normalizes its outcome

use chrono::Utc;
use fetcheach_common::retry::should_retry;
use fetcheach_common::{HttpMethod, RequestSpec, ResultRecord};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::WorkerConfig;

/// Executes task requests with a shared connection pool
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    client: Client,
    max_attempts: u32,
}

impl TaskExecutor {
    pub fn new(config: &WorkerConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("fetcheach/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_attempts: config.max_attempts,
        })
    }

    /// Execute the task at `index` on its `attempt`-th delivery (1-based)
    ///
    /// Never fails: transport errors become a status 500 record.
    pub async fn execute(
        &self,
        index: usize,
        request: Option<&RequestSpec>,
        attempt: u32,
    ) -> ResultRecord {
        let Some(spec) = request else {
            return ResultRecord::placeholder(index);
        };

        match self.send(index, spec, attempt).await {
            Ok(record) => record,
            Err(e) => {
                debug!(index, attempt, url = %spec.url, error = %e, "Request failed");
                ResultRecord {
                    index,
                    status: 500,
                    done: !should_retry(500, attempt, self.max_attempts),
                    error: Some(e.to_string()),
                    result: None,
                    headers: None,
                    created_at: Utc::now(),
                }
            }
        }
    }

    async fn send(
        &self,
        index: usize,
        spec: &RequestSpec,
        attempt: u32,
    ) -> Result<ResultRecord, reqwest::Error> {
        let mut builder = self
            .client
            .request(method(spec.effective_method()), &spec.url);

        if let Some(headers) = &spec.headers {
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
        }
        if let Some(body) = spec.body_text() {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let done = status == 200 || !should_retry(status, attempt, self.max_attempts);
        let headers = capture_headers(response.headers());

        if is_media(response.headers()) {
            // Binary payloads are not buffered
            return Ok(ResultRecord {
                index,
                status,
                done: true,
                error: None,
                result: None,
                headers: Some(headers),
                created_at: Utc::now(),
            });
        }

        let text = response.text().await?;
        let (result, error) = if status == 200 {
            (parse_body(text), None)
        } else {
            (None, Some(text))
        };

        Ok(ResultRecord {
            index,
            status,
            done,
            error,
            result,
            headers: Some(headers),
            created_at: Utc::now(),
        })
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

fn capture_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn is_media(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|content_type| {
            let content_type = content_type.trim().to_ascii_lowercase();
            content_type.starts_with("image/") || content_type.starts_with("video/")
        })
        .unwrap_or(false)
}

/// JSON if the body parses as JSON, the raw text otherwise, nothing if empty
fn parse_body(text: String) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
