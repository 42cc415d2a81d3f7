//! In-process partitioned queue
//!
//! Each partition is an unbounded channel drained by its own consumer loop.
//! A consumer takes up to `consumer_batch` messages at a time and runs at most
//! `consumer_concurrency` batches concurrently, so the achievable concurrency
//! of the whole queue is `partitions * consumer_concurrency * consumer_batch`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{BatchHandler, Delivery, Disposition, QueueError, TaskMessage, TaskQueue};
use crate::config::QueueConfig;

#[derive(Debug)]
struct Envelope {
    message: TaskMessage,
    attempts: u32,
}

#[derive(Debug, Clone)]
struct ConsumerSettings {
    batch_size: usize,
    concurrency: usize,
    redelivery_delay: Duration,
    max_deliveries: u32,
}

/// Producer handle of the in-process queue
#[derive(Debug)]
pub struct MemoryQueue {
    senders: Vec<mpsc::UnboundedSender<Envelope>>,
    max_batch: usize,
}

/// Receiving end of one partition, consumed by [`Partition::spawn`]
#[derive(Debug)]
pub struct Partition {
    index: usize,
    receiver: mpsc::UnboundedReceiver<Envelope>,
    requeue: mpsc::UnboundedSender<Envelope>,
    settings: ConsumerSettings,
}

impl MemoryQueue {
    /// Create the queue and the receiving end of every partition
    pub fn new(config: &QueueConfig) -> (Self, Vec<Partition>) {
        let settings = ConsumerSettings {
            batch_size: config.consumer_batch.max(1),
            concurrency: config.consumer_concurrency.max(1),
            redelivery_delay: config.redelivery_delay,
            max_deliveries: config.max_deliveries,
        };

        let (senders, partitions) = (0..config.partitions)
            .map(|index| {
                let (sender, receiver) = mpsc::unbounded_channel();
                let partition = Partition {
                    index,
                    receiver,
                    requeue: sender.clone(),
                    settings: settings.clone(),
                };
                (sender, partition)
            })
            .unzip();

        let queue = Self {
            senders,
            max_batch: config.max_batch,
        };
        (queue, partitions)
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    fn partitions(&self) -> usize {
        self.senders.len()
    }

    fn max_batch(&self) -> usize {
        self.max_batch
    }

    async fn send_batch(
        &self,
        partition: usize,
        messages: Vec<TaskMessage>,
    ) -> Result<(), QueueError> {
        let sender = self
            .senders
            .get(partition)
            .ok_or(QueueError::PartitionOutOfRange {
                partition,
                partitions: self.senders.len(),
            })?;

        if messages.len() > self.max_batch {
            return Err(QueueError::BatchTooLarge {
                size: messages.len(),
                max: self.max_batch,
            });
        }

        for message in messages {
            sender
                .send(Envelope {
                    message,
                    attempts: 1,
                })
                .map_err(|_| QueueError::Closed(partition))?;
        }

        Ok(())
    }
}

impl Partition {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Start the consumer loop of this partition
    pub fn spawn(self, handler: Arc<dyn BatchHandler>) -> JoinHandle<()> {
        tokio::spawn(self.run(handler))
    }

    async fn run(mut self, handler: Arc<dyn BatchHandler>) {
        let permits = Arc::new(Semaphore::new(self.settings.concurrency));

        loop {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };

            let Some(first) = self.receiver.recv().await else {
                break;
            };
            let mut envelopes = vec![first];
            while envelopes.len() < self.settings.batch_size {
                match self.receiver.try_recv() {
                    Ok(envelope) => envelopes.push(envelope),
                    Err(_) => break,
                }
            }

            let handler = handler.clone();
            let requeue = self.requeue.clone();
            let settings = self.settings.clone();
            let partition = self.index;

            tokio::spawn(async move {
                let mut batch: Vec<Delivery> = envelopes
                    .into_iter()
                    .map(|envelope| Delivery::new(envelope.message, envelope.attempts))
                    .collect();

                handler.handle_batch(partition, &mut batch).await;
                drop(permit);

                for delivery in batch {
                    settle(partition, delivery, &requeue, &settings);
                }
            });
        }

        debug!(partition = self.index, "Partition consumer stopped");
    }
}

/// Start a consumer loop for every partition
pub fn spawn_consumers(
    partitions: Vec<Partition>,
    handler: Arc<dyn BatchHandler>,
) -> Vec<JoinHandle<()>> {
    partitions
        .into_iter()
        .map(|partition| partition.spawn(handler.clone()))
        .collect()
}

fn settle(
    partition: usize,
    delivery: Delivery,
    requeue: &mpsc::UnboundedSender<Envelope>,
    settings: &ConsumerSettings,
) {
    let delay = match delivery.disposition() {
        Disposition::Ack => return,
        Disposition::Retry(delay) => delay,
        Disposition::Pending => settings.redelivery_delay,
    };

    if delivery.attempts >= settings.max_deliveries {
        error!(
            partition,
            job_id = %delivery.message.job_id,
            index = delivery.message.index,
            attempts = delivery.attempts,
            "Message exhausted its deliveries, dead-lettering"
        );
        return;
    }

    let envelope = Envelope {
        message: delivery.message,
        attempts: delivery.attempts + 1,
    };
    let requeue = requeue.clone();

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if requeue.send(envelope).is_err() {
            warn!(partition, "Partition closed before redelivery");
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    #[derive(Clone, Copy)]
    enum Action {
        Ack,
        RetryUntil(u32),
        Ignore,
    }

    struct Recorder {
        action: Action,
        seen: Mutex<Vec<(usize, usize, u32)>>,
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl Recorder {
        fn new(action: Action) -> Arc<Self> {
            Arc::new(Self {
                action,
                seen: Mutex::new(Vec::new()),
                batch_sizes: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl BatchHandler for Recorder {
        async fn handle_batch(&self, partition: usize, batch: &mut [Delivery]) {
            self.batch_sizes.lock().await.push(batch.len());
            for delivery in batch.iter_mut() {
                self.seen
                    .lock()
                    .await
                    .push((partition, delivery.message.index, delivery.attempts));
                match self.action {
                    Action::Ack => delivery.ack(),
                    Action::RetryUntil(last) if delivery.attempts < last => {
                        delivery.retry(Duration::from_millis(5))
                    }
                    Action::RetryUntil(_) => delivery.ack(),
                    Action::Ignore => {}
                }
            }
        }
    }

    fn config(partitions: usize) -> QueueConfig {
        QueueConfig {
            partitions,
            min_batch: 2,
            max_batch: 10,
            consumer_batch: 3,
            consumer_concurrency: 4,
            redelivery_delay: Duration::from_millis(5),
            max_deliveries: 3,
        }
    }

    fn messages(job_id: Uuid, range: std::ops::Range<usize>) -> Vec<TaskMessage> {
        range
            .map(|index| TaskMessage {
                job_id,
                index,
                request: None,
            })
            .collect()
    }

    async fn wait_for(recorder: &Recorder, count: usize) -> Vec<(usize, usize, u32)> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let seen = recorder.seen.lock().await.clone();
                if seen.len() >= count {
                    return seen;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("deliveries did not arrive in time")
    }

    #[tokio::test]
    async fn test_send_batch_limits() {
        let (queue, _partitions) = MemoryQueue::new(&config(2));
        let job = Uuid::new_v4();

        assert!(matches!(
            queue.send_batch(2, messages(job, 0..1)).await,
            Err(QueueError::PartitionOutOfRange { partition: 2, .. })
        ));
        assert!(matches!(
            queue.send_batch(0, messages(job, 0..11)).await,
            Err(QueueError::BatchTooLarge { size: 11, max: 10 })
        ));
        assert!(queue.send_batch(1, messages(job, 0..10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_messages_reach_their_partition() {
        let (queue, partitions) = MemoryQueue::new(&config(2));
        let recorder = Recorder::new(Action::Ack);
        let _handles = spawn_consumers(partitions, recorder.clone());
        let job = Uuid::new_v4();

        queue.send_batch(0, messages(job, 0..4)).await.unwrap();
        queue.send_batch(1, messages(job, 4..6)).await.unwrap();

        let seen = wait_for(&recorder, 6).await;
        for (partition, index, attempts) in seen {
            assert_eq!(partition, usize::from(index >= 4));
            assert_eq!(attempts, 1);
        }
        assert!(recorder.batch_sizes.lock().await.iter().all(|size| *size <= 3));
    }

    #[tokio::test]
    async fn test_retry_redelivers_with_next_attempt() {
        let (queue, partitions) = MemoryQueue::new(&config(1));
        let recorder = Recorder::new(Action::RetryUntil(3));
        let _handles = spawn_consumers(partitions, recorder.clone());

        queue
            .send_batch(0, messages(Uuid::new_v4(), 0..1))
            .await
            .unwrap();

        let seen = wait_for(&recorder, 3).await;
        let attempts: Vec<_> = seen.iter().map(|(_, _, attempts)| *attempts).collect();
        assert_eq!(attempts, vec![1, 2, 3]);

        // Acked on the third attempt: no further deliveries
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.seen.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_unsettled_message_is_dead_lettered() {
        let (queue, partitions) = MemoryQueue::new(&config(1));
        let recorder = Recorder::new(Action::Ignore);
        let _handles = spawn_consumers(partitions, recorder.clone());

        queue
            .send_batch(0, messages(Uuid::new_v4(), 0..1))
            .await
            .unwrap();

        wait_for(&recorder, 3).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.seen.lock().await.len(), 3);
    }
}
