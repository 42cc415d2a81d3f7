//! Task execution side of the pipeline
//!
//! The [`QueueConsumer`] receives delivery batches from the queue, runs every
//! task through the [`TaskExecutor`] concurrently, reports each outcome to the
//! job's coordinator and then acknowledges the message or schedules its retry.

pub mod consumer;
pub mod executor;

pub use consumer::QueueConsumer;
pub use executor::TaskExecutor;
