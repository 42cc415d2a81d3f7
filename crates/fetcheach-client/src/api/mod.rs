//! Dispatcher API client
//!
//! HTTP client for submitting batches to a fetch-each server.

pub mod client;
pub mod endpoints;

pub use client::FetchEachClient;
