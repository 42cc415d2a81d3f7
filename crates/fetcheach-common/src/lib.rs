//! fetch-each common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, wire protocol and policies used by both the fetch-each
//! server and its client.
//!
//! # Overview
//!
//! - **Types**: request specs, per-task result records and the ordered final result
//! - **Retry**: the retry classifier and the capped exponential backoff policy
//! - **Stream**: encoding and incremental parsing of `update` / `result` frames
//! - **Error Handling**: the shared error type and result alias
//! - **Logging**: tracing subscriber bootstrap for all binaries
//!
//! # Example
//!
//! ```
//! use fetcheach_common::retry::{should_retry, BackoffPolicy, DEFAULT_MAX_ATTEMPTS};
//!
//! assert!(should_retry(503, 1, DEFAULT_MAX_ATTEMPTS));
//! assert_eq!(BackoffPolicy::default().delay(5).as_secs(), 32);
//! ```

pub mod error;
pub mod logging;
pub mod retry;
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use error::{FetchEachError, Result};
pub use types::{
    BatchItem, FinalResult, HttpMethod, RequestSpec, ResultEntry, ResultRecord, StreamFrame,
    StreamUpdate,
};
