//! Partitioned task queue
//!
//! The queue carries one [`TaskMessage`] per task. Delivery is at-least-once:
//! a consumer settles each [`Delivery`] by acknowledging it, by asking for a
//! retry after an explicit delay, or by leaving it pending, in which case the
//! queue redelivers it after its default delay.

use async_trait::async_trait;
use fetcheach_common::RequestSpec;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;

pub use memory::{spawn_consumers, MemoryQueue, Partition};

/// Errors raised when sending to the queue
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Partition {partition} out of range (queue has {partitions})")]
    PartitionOutOfRange { partition: usize, partitions: usize },

    #[error("Batch of {size} messages exceeds the send limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Partition {0} is closed")]
    Closed(usize),
}

/// One task routed through the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub job_id: Uuid,
    pub index: usize,
    /// `None` for a placeholder item
    pub request: Option<RequestSpec>,
}

/// How a consumer settled a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not settled; the queue redelivers after its default delay
    Pending,
    Ack,
    Retry(Duration),
}

/// A message handed to a consumer, with its delivery count
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: TaskMessage,
    /// 1 on first delivery
    pub attempts: u32,
    disposition: Disposition,
}

impl Delivery {
    pub fn new(message: TaskMessage, attempts: u32) -> Self {
        Self {
            message,
            attempts,
            disposition: Disposition::Pending,
        }
    }

    /// Remove the message from the queue
    pub fn ack(&mut self) {
        self.disposition = Disposition::Ack;
    }

    /// Redeliver the message after `delay`
    pub fn retry(&mut self, delay: Duration) {
        self.disposition = Disposition::Retry(delay);
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }
}

/// Producer side of the queue
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Number of partitions messages can be sent to
    fn partitions(&self) -> usize;

    /// Largest batch accepted by [`TaskQueue::send_batch`]
    fn max_batch(&self) -> usize;

    async fn send_batch(&self, partition: usize, messages: Vec<TaskMessage>)
        -> Result<(), QueueError>;
}

/// Consumer side of the queue: settles every delivery of a batch
#[async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    async fn handle_batch(&self, partition: usize, batch: &mut [Delivery]);
}
