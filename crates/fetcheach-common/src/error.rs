//! Error types shared by the fetch-each server and client

use thiserror::Error;

/// Result type alias for fetch-each operations
pub type Result<T> = std::result::Result<T, FetchEachError>;

/// Errors raised by the shared wire types and codecs
#[derive(Error, Debug)]
pub enum FetchEachError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid item at index {index}: {reason}")]
    InvalidItem { index: usize, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown stream event: {0}")]
    UnknownEvent(String),

    #[error("Malformed stream frame: {0}")]
    MalformedFrame(String),
}

impl FetchEachError {
    /// Create an invalid item error
    pub fn invalid_item(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidItem {
            index,
            reason: reason.into(),
        }
    }
}
