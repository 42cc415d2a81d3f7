//! Batch intake
//!
//! The dispatcher holds no state of its own: it validates a submission,
//! creates a fresh job, fans the tasks out over the queue partitions and
//! relays the job coordinator's completion response to the caller.

pub mod routes;
pub mod sharding;

pub use routes::{dispatch_routes, enqueue};
