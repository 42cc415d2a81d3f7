//! Coordinator registry and completion watch

use async_trait::async_trait;
use fetcheach_common::{FinalResult, ResultRecord, StreamFrame, StreamUpdate};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::actor::{CoordinatorHandle, JobCoordinator, JobState};
use super::{timeout_message, CoordinatorClient, CoordinatorError};
use crate::config::CoordinatorConfig;
use crate::store::ResultStore;

const FRAME_BUFFER: usize = 16;

#[derive(Default)]
struct Jobs {
    live: HashMap<Uuid, CoordinatorHandle>,
    purged: PurgedJobs,
}

/// Recently purged jobs, so that late writes cannot bring them back
///
/// Entries are forgotten after `keep`, oldest first.
#[derive(Default)]
struct PurgedJobs {
    ids: HashSet<Uuid>,
    order: VecDeque<(Instant, Uuid)>,
}

impl PurgedJobs {
    fn contains(&self, job_id: &Uuid) -> bool {
        self.ids.contains(job_id)
    }

    fn insert(&mut self, job_id: Uuid, now: Instant, keep: Duration) {
        while let Some(&(at, old)) = self.order.front() {
            if now.duration_since(at) < keep {
                break;
            }
            self.order.pop_front();
            self.ids.remove(&old);
        }
        if self.ids.insert(job_id) {
            self.order.push_back((now, job_id));
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Expires the job if the waiting future is dropped before it settles
struct ExpireOnDrop {
    handle: Option<CoordinatorHandle>,
}

impl ExpireOnDrop {
    fn disarm(&mut self) {
        self.handle = None;
    }
}

impl Drop for ExpireOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(job_id = %handle.job_id(), "Waiter dropped, expiring job");
            handle.expire_now();
        }
    }
}

struct Inner {
    store: Arc<dyn ResultStore>,
    config: CoordinatorConfig,
    jobs: Mutex<Jobs>,
}

/// Spawns one coordinator per job and routes traffic to it
#[derive(Clone)]
pub struct CoordinatorRegistry {
    inner: Arc<Inner>,
}

impl CoordinatorRegistry {
    pub fn new(store: Arc<dyn ResultStore>, config: CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                jobs: Mutex::new(Jobs::default()),
            }),
        }
    }

    /// Handle of the job's coordinator, spawning it on first use;
    /// `None` once the job has been purged
    pub async fn handle(&self, job_id: Uuid) -> Option<CoordinatorHandle> {
        let mut jobs = self.inner.jobs.lock().await;
        if jobs.purged.contains(&job_id) {
            return None;
        }

        let handle = jobs
            .live
            .entry(job_id)
            .or_insert_with(|| self.spawn(job_id))
            .clone();
        Some(handle)
    }

    /// Lifecycle state of a job, without spawning a coordinator for it
    pub async fn state(&self, job_id: Uuid) -> Option<JobState> {
        let handle = {
            let jobs = self.inner.jobs.lock().await;
            if jobs.purged.contains(&job_id) {
                return Some(JobState::Purged);
            }
            jobs.live.get(&job_id).cloned()
        }?;

        match handle.state().await {
            Ok(state) => Some(state),
            // The actor exited between the lookup and the query
            Err(_) => Some(JobState::Purged),
        }
    }

    fn spawn(&self, job_id: Uuid) -> CoordinatorHandle {
        let config = &self.inner.config;
        let (actor, handle) = JobCoordinator::new(
            job_id,
            self.inner.store.clone(),
            config.retention,
            config.poll_ceiling + config.retention,
        );
        let registry = self.clone();

        tokio::spawn(async move {
            actor.run().await;
            registry.forget(job_id).await;
        });

        debug!(job_id = %job_id, "Coordinator started");
        handle
    }

    async fn forget(&self, job_id: Uuid) {
        let mut jobs = self.inner.jobs.lock().await;
        jobs.live.remove(&job_id);
        let keep = self.inner.config.poll_ceiling + self.inner.config.retention;
        jobs.purged.insert(job_id, Instant::now(), keep);
    }

    /// Wait for the job to complete and return its ordered result
    ///
    /// Fails with [`CoordinatorError::Timeout`] once the poll ceiling elapses.
    pub async fn await_completion(
        &self,
        job_id: Uuid,
        expected: usize,
    ) -> Result<FinalResult, CoordinatorError> {
        self.poll(job_id, expected, None).await
    }

    /// Stream the job's progress
    ///
    /// Yields an `update` frame each time the progress summary changes, then
    /// exactly one `result` frame, after which the channel closes. A timeout
    /// or an internal failure is reported in the `result` frame's `error`.
    pub fn watch(&self, job_id: Uuid, expected: usize) -> mpsc::Receiver<StreamFrame> {
        let (frames, receiver) = mpsc::channel(FRAME_BUFFER);
        let registry = self.clone();

        tokio::spawn(async move {
            let result = match registry.poll(job_id, expected, Some(&frames)).await {
                Ok(result) => result,
                Err(CoordinatorError::Timeout { partial, .. }) => partial,
                Err(CoordinatorError::Detached(_)) => {
                    debug!(job_id = %job_id, "Watcher went away");
                    return;
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Crash in stream");
                    FinalResult {
                        array: Vec::new(),
                        error: Some(format!("Crash in stream: {}", e)),
                    }
                }
            };

            if frames.send(StreamFrame::Result(result)).await.is_err() {
                debug!(job_id = %job_id, "Watcher went away before the result");
            }
        });

        receiver
    }

    async fn poll(
        &self,
        job_id: Uuid,
        expected: usize,
        updates: Option<&mpsc::Sender<StreamFrame>>,
    ) -> Result<FinalResult, CoordinatorError> {
        let handle = self
            .handle(job_id)
            .await
            .ok_or(CoordinatorError::Unavailable(job_id))?;
        handle.expect(expected).await?;

        let mut guard = ExpireOnDrop {
            handle: Some(handle),
        };
        let result = self.poll_records(job_id, expected, updates).await;
        if result.is_ok() {
            guard.disarm();
        }
        result
    }

    async fn poll_records(
        &self,
        job_id: Uuid,
        expected: usize,
        updates: Option<&mpsc::Sender<StreamFrame>>,
    ) -> Result<FinalResult, CoordinatorError> {
        let config = &self.inner.config;
        let deadline = Instant::now() + config.poll_ceiling;
        let mut last: Option<StreamUpdate> = None;

        loop {
            let handle = self
                .handle(job_id)
                .await
                .ok_or(CoordinatorError::Unavailable(job_id))?;

            let mut records = handle.snapshot().await?;
            records.retain(|record| record.index < expected);

            if let Some(frames) = updates {
                let update = StreamUpdate::from_records(&records);
                if last.as_ref() != Some(&update) {
                    if frames.send(StreamFrame::Update(update.clone())).await.is_err() {
                        handle.expire().await?;
                        return Err(CoordinatorError::Detached(job_id));
                    }
                    last = Some(update);
                }
            }

            if is_complete(&records, expected) {
                handle.complete().await?;
                return Ok(FinalResult::from_records(records, None));
            }

            let now = Instant::now();
            if now >= deadline {
                handle.expire().await?;
                let message = timeout_message(config.poll_ceiling);
                warn!(
                    job_id = %job_id,
                    expected,
                    received = records.len(),
                    "{}", message
                );
                return Err(CoordinatorError::Timeout {
                    partial: FinalResult::from_records(records, Some(message.clone())),
                    message,
                });
            }

            tokio::time::sleep(config.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Every index below `expected` has a record with `done` set
fn is_complete(records: &[ResultRecord], expected: usize) -> bool {
    records
        .iter()
        .filter(|record| record.done && record.index < expected)
        .count()
        == expected
}

#[async_trait]
impl CoordinatorClient for CoordinatorRegistry {
    async fn record(&self, job_id: Uuid, record: ResultRecord) -> Result<(), CoordinatorError> {
        match self.handle(job_id).await {
            Some(handle) => handle.record(record).await,
            None => {
                debug!(job_id = %job_id, index = record.index, "Dropping record for purged job");
                Ok(())
            }
        }
    }
}
