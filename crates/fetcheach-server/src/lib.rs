//! fetch-each server library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Bulk, rate-safe HTTP fan-out. A caller submits an ordered array of
//! requests; the server executes them concurrently through a partitioned
//! queue, retries transient failures with backoff, streams progress while the
//! job runs and finally returns the results in input order.
//!
//! # Overview
//!
//! - **Dispatcher** (`features::dispatch`): validates a batch, creates a job and
//!   shards its tasks round-robin over the queue partitions
//! - **Queue** (`queue`): at-least-once delivery with explicit delayed retry
//! - **Worker** (`worker`): executes each task and reports its outcome
//! - **Coordinator** (`coordinator`): one actor per job owning its records,
//!   detecting completion and scheduling cleanup
//! - **Store** (`store`): the per-job result table, in memory or PostgreSQL
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fetcheach_server::{api::App, config::Config, store::MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let addr = format!("{}:{}", config.server.host, config.server.port);
//!     let app = App::build(config, Arc::new(MemoryStore::new()))?;
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app.router.clone()).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod features;
pub mod middleware;
pub mod queue;
pub mod store;
pub mod worker;

// Re-export commonly used types
pub use error::{AppError, ServerResult};
