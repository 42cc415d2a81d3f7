//! Job coordinators
//!
//! Every job has exactly one coordinator: an actor task that owns the job's
//! records in the [`ResultStore`](crate::store::ResultStore) and serializes
//! all reads and writes to them. The [`CoordinatorRegistry`] spawns
//! coordinators on first use, routes record writes to them and runs the
//! completion watch that feeds callers.
//!
//! ```text
//! OPEN --(every expected index done)--> COMPLETE --(retention elapsed)--> PURGED
//! ```

use async_trait::async_trait;
use fetcheach_common::{stream::TIMEOUT_PREFIX, FinalResult, ResultRecord};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

pub mod actor;
pub mod registry;

pub use actor::{CoordinatorHandle, JobState};
pub use registry::CoordinatorRegistry;

/// Errors raised by a job coordinator
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Coordinator for job {0} is unavailable")]
    Unavailable(Uuid),

    #[error("Observer of job {0} disconnected")]
    Detached(Uuid),

    /// The poll ceiling elapsed; `partial` holds the records seen so far
    #[error("{message}")]
    Timeout {
        message: String,
        partial: FinalResult,
    },
}

/// Write side of the coordinators, as used by queue consumers
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    /// Idempotently upsert `record` into the job's table
    async fn record(&self, job_id: Uuid, record: ResultRecord) -> Result<(), CoordinatorError>;
}

/// Error message reported when a job outlives the poll ceiling
pub fn timeout_message(ceiling: Duration) -> String {
    format!("{}: max queue time is {}", TIMEOUT_PREFIX, describe(ceiling))
}

fn describe(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 || duration.subsec_nanos() != 0 {
        return format!("{} ms", duration.as_millis());
    }

    let (count, unit) = match secs {
        s if s % 86_400 == 0 => (s / 86_400, "day"),
        s if s % 3_600 == 0 => (s / 3_600, "hour"),
        s if s % 60 == 0 => (s / 60, "minute"),
        s => (s, "second"),
    };

    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        assert_eq!(
            timeout_message(Duration::from_secs(86_400)),
            "Timeout exceeded: max queue time is 1 day"
        );
        assert_eq!(
            timeout_message(Duration::from_secs(7_200)),
            "Timeout exceeded: max queue time is 2 hours"
        );
        assert_eq!(
            timeout_message(Duration::from_secs(90)),
            "Timeout exceeded: max queue time is 90 seconds"
        );
        assert_eq!(
            timeout_message(Duration::from_millis(250)),
            "Timeout exceeded: max queue time is 250 ms"
        );
    }
}
