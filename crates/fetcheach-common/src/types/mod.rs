//! Shared domain types
//!
//! These types travel between the client, the dispatcher, the queue consumers
//! and the job coordinator. The `index` of a task is its position in the
//! submitted array and is the only key correlating a submission with its result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{FetchEachError, Result};

/// HTTP method accepted in a request spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

/// One HTTP request to execute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub url: String,
    /// Defaults to POST when a body is given, GET otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// A string is sent verbatim; any other JSON value is serialized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            headers: None,
            body: None,
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn effective_method(&self) -> HttpMethod {
        match (self.method, &self.body) {
            (Some(method), _) => method,
            (None, Some(body)) if !body.is_null() => HttpMethod::Post,
            (None, _) => HttpMethod::Get,
        }
    }

    /// Request body rendered as text, if any
    pub fn body_text(&self) -> Option<String> {
        match &self.body {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// An element of a submitted batch: a bare URL, a full request, or a placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItem {
    Url(String),
    Request(RequestSpec),
    Empty,
}

impl BatchItem {
    /// Normalize to the request that will be executed; `None` is a placeholder
    pub fn into_request(self) -> Option<RequestSpec> {
        match self {
            BatchItem::Url(url) => Some(RequestSpec::get(url)),
            BatchItem::Request(spec) => Some(spec),
            BatchItem::Empty => None,
        }
    }

    /// Parse one element of a submitted JSON array
    pub fn from_value(index: usize, value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(BatchItem::Empty),
            Value::String(url) => Ok(BatchItem::Url(url)),
            Value::Object(_) => serde_json::from_value(value)
                .map(BatchItem::Request)
                .map_err(|e| FetchEachError::invalid_item(index, e.to_string())),
            other => Err(FetchEachError::invalid_item(
                index,
                format!("expected a URL, a request object or null, got {}", other),
            )),
        }
    }
}

impl From<&str> for BatchItem {
    fn from(url: &str) -> Self {
        BatchItem::Url(url.to_string())
    }
}

impl From<String> for BatchItem {
    fn from(url: String) -> Self {
        BatchItem::Url(url)
    }
}

impl From<RequestSpec> for BatchItem {
    fn from(spec: RequestSpec) -> Self {
        BatchItem::Request(spec)
    }
}

/// Parse a whole submission body into normalized requests
pub fn parse_batch(body: Value) -> Result<Vec<Option<RequestSpec>>> {
    let Value::Array(items) = body else {
        return Err(FetchEachError::InvalidInput(
            "No array passed as input JSON".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, value)| BatchItem::from_value(index, value).map(BatchItem::into_request))
        .collect()
}

/// Durable outcome of one task, owned by the job's coordinator
///
/// The wire form (`POST /jobs/:job_id`) names the index `id` and encodes
/// `created_at` as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "id")]
    pub index: usize,
    pub status: u16,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl ResultRecord {
    /// Record for a `null` placeholder item
    pub fn placeholder(index: usize) -> Self {
        Self {
            index,
            status: 200,
            done: true,
            error: None,
            result: None,
            headers: None,
            created_at: Utc::now(),
        }
    }

    pub fn to_entry(&self) -> ResultEntry {
        ResultEntry {
            status: self.status,
            error: self.error.clone(),
            headers: self.headers.clone(),
            result: self.result.clone().unwrap_or(Value::Null),
        }
    }
}

/// One element of the ordered final result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub result: Value,
}

impl ResultEntry {
    /// A 200 response that produced a body
    pub fn is_success(&self) -> bool {
        self.status == 200 && !self.result.is_null()
    }
}

/// Progress snapshot of a job: status histogram and number of finished tasks
///
/// Histogram keys are status codes rendered as strings, as they appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUpdate {
    pub status: BTreeMap<String, u64>,
    pub done: u64,
}

impl StreamUpdate {
    /// Summarize a set of records
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ResultRecord>) -> Self {
        let mut update = StreamUpdate::default();
        for record in records {
            *update.status.entry(record.status.to_string()).or_insert(0) += 1;
            if record.done {
                update.done += 1;
            }
        }
        update
    }
}

/// Terminal payload: the ordered array, plus an error when the job did not complete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub array: Vec<ResultEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FinalResult {
    /// Build the final array from records in any order
    pub fn from_records(mut records: Vec<ResultRecord>, error: Option<String>) -> Self {
        records.sort_by_key(|record| record.index);
        Self {
            array: records.iter().map(ResultRecord::to_entry).collect(),
            error,
        }
    }
}

/// A frame of the progress stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    Update(StreamUpdate),
    Result(FinalResult),
}

impl StreamFrame {
    /// The `event:` name this frame is sent under
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamFrame::Update(_) => "update",
            StreamFrame::Result(_) => "result",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(index: usize, status: u16, done: bool) -> ResultRecord {
        ResultRecord {
            index,
            status,
            done,
            error: None,
            result: Some(json!({ "i": index })),
            headers: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_batch_normalizes_items() {
        let parsed = parse_batch(json!([
            "https://a.example",
            { "url": "https://b.example", "body": { "q": 1 } },
            null
        ]))
        .unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0], Some(RequestSpec::get("https://a.example")));
        assert_eq!(
            parsed[1].as_ref().unwrap().effective_method(),
            HttpMethod::Post
        );
        assert_eq!(parsed[1].as_ref().unwrap().body_text().unwrap(), r#"{"q":1}"#);
        assert!(parsed[2].is_none());
    }

    #[test]
    fn test_parse_batch_rejects_non_array() {
        let err = parse_batch(json!({ "url": "https://a.example" })).unwrap_err();
        assert!(matches!(err, FetchEachError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_batch_rejects_bad_item() {
        let err = parse_batch(json!(["https://a.example", 42])).unwrap_err();
        assert!(matches!(err, FetchEachError::InvalidItem { index: 1, .. }));

        let err = parse_batch(json!([{ "url": "https://a", "method": "FETCH" }])).unwrap_err();
        assert!(matches!(err, FetchEachError::InvalidItem { index: 0, .. }));
    }

    #[test]
    fn test_string_body_is_sent_verbatim() {
        let spec = RequestSpec::get("https://a").with_body(json!("raw text"));
        assert_eq!(spec.body_text().as_deref(), Some("raw text"));
        assert_eq!(spec.effective_method(), HttpMethod::Post);
    }

    #[test]
    fn test_record_wire_format() {
        let value = serde_json::to_value(record(3, 200, true)).unwrap();
        assert_eq!(value["id"], 3);
        assert!(value["created_at"].is_i64());

        let parsed: ResultRecord = serde_json::from_value(json!({
            "id": 7,
            "status": 404,
            "done": true,
            "error": "not found",
            "created_at": 1_700_000_000_000i64
        }))
        .unwrap();
        assert_eq!(parsed.index, 7);
        assert_eq!(parsed.error.as_deref(), Some("not found"));
    }

    #[test]
    fn test_update_counts_only_done_records() {
        let records = vec![record(0, 200, true), record(1, 503, false), record(2, 200, true)];
        let update = StreamUpdate::from_records(&records);

        assert_eq!(update.done, 2);
        assert_eq!(update.status.get("200"), Some(&2));
        assert_eq!(update.status.get("503"), Some(&1));
    }

    #[test]
    fn test_final_result_is_sorted_by_index() {
        let records = vec![record(2, 200, true), record(0, 200, true), record(1, 404, true)];
        let result = FinalResult::from_records(records, None);

        let indices: Vec<_> = result.array.iter().map(|e| e.result["i"].clone()).collect();
        assert_eq!(indices, vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_frame_tagging() {
        let frame = StreamFrame::Update(StreamUpdate {
            status: BTreeMap::from([("200".to_string(), 1)]),
            done: 1,
        });
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, json!({ "type": "update", "status": { "200": 1 }, "done": 1 }));
        assert_eq!(frame.event_name(), "update");
        assert_eq!(serde_json::from_value::<StreamFrame>(value).unwrap(), frame);
    }
}
