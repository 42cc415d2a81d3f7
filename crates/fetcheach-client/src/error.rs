//! Error types for the fetch-each client
//!
//! Messages are meant to be shown to a user as-is.

use fetcheach_common::{FetchEachError, ResultEntry};
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while submitting a batch or consuming its stream
#[derive(Error, Debug)]
pub enum ClientError {
    /// The dispatcher answered with a non-success status
    #[error("fetch-each failed ({status}): {body}")]
    Api { status: u16, body: String },

    /// HTTP request failed
    #[error("Network request failed: {0}. Check the server URL and that the server is running.")]
    Http(#[from] reqwest::Error),

    /// File operation failed
    #[error("File operation failed: {0}. Check the path and file permissions.")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A stream frame could not be understood
    #[error("Stream protocol error: {0}")]
    Protocol(#[from] FetchEachError),

    /// The stream closed before the terminal result frame
    ///
    /// `job_id` is set when the server named the job, so the caller can
    /// re-attach with [`FetchEachClient::await_job`](crate::FetchEachClient::await_job).
    #[error("Stream ended without complete result")]
    StreamEnded { job_id: Option<String> },

    /// The job hit the server's queue time ceiling; `partial` holds what finished
    #[error("{message}")]
    Timeout {
        message: String,
        partial: Vec<ResultEntry>,
    },

    /// The server reported a failure in the terminal frame
    #[error("Job failed: {0}")]
    Job(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables.")]
    Config(String),
}

impl ClientError {
    /// Create an API error
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
