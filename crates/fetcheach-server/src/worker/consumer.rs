//! Queue consumer: executes delivered tasks and reports them to their coordinator

use async_trait::async_trait;
use fetcheach_common::retry::BackoffPolicy;
use fetcheach_common::ResultRecord;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::executor::TaskExecutor;
use crate::config::WorkerConfig;
use crate::coordinator::{CoordinatorClient, CoordinatorError};
use crate::queue::{BatchHandler, Delivery};

/// Handles delivery batches for every partition
pub struct QueueConsumer {
    executor: TaskExecutor,
    coordinator: Arc<dyn CoordinatorClient>,
    backoff: BackoffPolicy,
    write_retries: u32,
    write_backoff: Duration,
}

impl QueueConsumer {
    pub fn new(
        executor: TaskExecutor,
        coordinator: Arc<dyn CoordinatorClient>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            executor,
            coordinator,
            backoff: config.backoff,
            write_retries: config.write_retries.max(1),
            write_backoff: config.write_backoff,
        }
    }

    async fn handle(&self, partition: usize, delivery: &mut Delivery) {
        let job_id = delivery.message.job_id;
        let index = delivery.message.index;
        let attempt = delivery.attempts;

        let record = self
            .executor
            .execute(index, delivery.message.request.as_ref(), attempt)
            .await;
        let done = record.done;
        let status = record.status;

        if let Err(e) = self.write(job_id, record).await {
            // Left unsettled: the queue redelivers it
            error!(
                job_id = %job_id,
                index,
                attempt,
                partition,
                error = %e,
                "Failed to report task outcome"
            );
            return;
        }

        if done {
            debug!(job_id = %job_id, index, attempt, status, "Task done");
            delivery.ack();
        } else {
            let delay = self.backoff.delay(attempt);
            warn!(
                job_id = %job_id,
                index,
                attempt,
                status,
                delay_ms = delay.as_millis() as u64,
                "Task will be retried"
            );
            delivery.retry(delay);
        }
    }

    /// Write with bounded exponential backoff
    async fn write(&self, job_id: Uuid, record: ResultRecord) -> Result<(), CoordinatorError> {
        let mut attempt = 0;
        loop {
            match self.coordinator.record(job_id, record.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 < self.write_retries => {
                    let delay = write_delay(self.write_backoff, attempt);
                    warn!(
                        job_id = %job_id,
                        index = record.index,
                        attempt = attempt + 1,
                        max_attempts = self.write_retries,
                        error = %e,
                        "Coordinator write failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// `base * 2^attempt`, saturating instead of overflowing
fn write_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.checked_pow(attempt).unwrap_or(u32::MAX))
}

#[async_trait]
impl BatchHandler for QueueConsumer {
    async fn handle_batch(&self, partition: usize, batch: &mut [Delivery]) {
        join_all(
            batch
                .iter_mut()
                .map(|delivery| self.handle(partition, delivery)),
        )
        .await;
    }
}
