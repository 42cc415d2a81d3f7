//! The per-job coordinator actor

use fetcheach_common::ResultRecord;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::CoordinatorError;
use crate::store::ResultStore;

const COMMAND_BUFFER: usize = 256;

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Receiving records
    Open,
    /// Every expected index is done; cleanup is scheduled
    Complete,
    /// State deleted
    Purged,
}

enum Command {
    Record {
        record: ResultRecord,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Result<Vec<ResultRecord>, CoordinatorError>>,
    },
    State {
        reply: oneshot::Sender<JobState>,
    },
    Expect {
        expected: usize,
        reply: oneshot::Sender<()>,
    },
    Complete,
    Expire,
}

enum Wakeup {
    Command(Option<Command>),
    Cleanup,
}

/// Address of a running coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    job_id: Uuid,
    sender: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Record { record, .. } => write!(f, "Record({})", record.index),
            Command::Snapshot { .. } => write!(f, "Snapshot"),
            Command::State { .. } => write!(f, "State"),
            Command::Expect { expected, .. } => write!(f, "Expect({})", expected),
            Command::Complete => write!(f, "Complete"),
            Command::Expire => write!(f, "Expire"),
        }
    }
}

impl CoordinatorHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub async fn record(&self, record: ResultRecord) -> Result<(), CoordinatorError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Record { record, reply }).await?;
        response
            .await
            .map_err(|_| CoordinatorError::Unavailable(self.job_id))?
    }

    /// Current records, ordered by index
    pub async fn snapshot(&self) -> Result<Vec<ResultRecord>, CoordinatorError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        response
            .await
            .map_err(|_| CoordinatorError::Unavailable(self.job_id))?
    }

    pub async fn state(&self) -> Result<JobState, CoordinatorError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::State { reply }).await?;
        response
            .await
            .map_err(|_| CoordinatorError::Unavailable(self.job_id))
    }

    /// Tell the coordinator how many indices the job has
    ///
    /// From then on the coordinator completes the job itself once every
    /// index is done, whether or not anyone is still waiting on it.
    pub async fn expect(&self, expected: usize) -> Result<(), CoordinatorError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Expect { expected, reply }).await?;
        response
            .await
            .map_err(|_| CoordinatorError::Unavailable(self.job_id))
    }

    /// Mark the job complete and schedule its cleanup
    pub async fn complete(&self) -> Result<(), CoordinatorError> {
        self.send(Command::Complete).await
    }

    /// Schedule cleanup of a job nobody is waiting on any more
    pub async fn expire(&self) -> Result<(), CoordinatorError> {
        self.send(Command::Expire).await
    }

    /// Non-blocking [`expire`](Self::expire), usable from `Drop`
    pub fn expire_now(&self) {
        if self.sender.try_send(Command::Expire).is_err() {
            debug!(job_id = %self.job_id, "Coordinator gone or busy, expiry not sent");
        }
    }

    async fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| CoordinatorError::Unavailable(self.job_id))
    }
}

/// Single writer of one job's records
///
/// A coordinator that is never completed or expired purges itself `lifetime`
/// after it started, or after [`expect`](CoordinatorHandle::expect) if that
/// came later.
pub struct JobCoordinator {
    job_id: Uuid,
    store: Arc<dyn ResultStore>,
    retention: Duration,
    lifetime: Duration,
    state: JobState,
    expected: Option<usize>,
    done: HashSet<usize>,
    cleanup_at: Option<Instant>,
    expires_at: Instant,
    commands: mpsc::Receiver<Command>,
}

impl JobCoordinator {
    pub fn new(
        job_id: Uuid,
        store: Arc<dyn ResultStore>,
        retention: Duration,
        lifetime: Duration,
    ) -> (Self, CoordinatorHandle) {
        let (sender, commands) = mpsc::channel(COMMAND_BUFFER);
        let actor = Self {
            job_id,
            store,
            retention,
            lifetime,
            state: JobState::Open,
            expected: None,
            done: HashSet::new(),
            cleanup_at: None,
            expires_at: Instant::now() + lifetime,
            commands,
        };
        (actor, CoordinatorHandle { job_id, sender })
    }

    /// Serve commands until the job is purged
    pub async fn run(mut self) {
        while self.state != JobState::Purged {
            let cleanup_at = self
                .cleanup_at
                .map_or(self.expires_at, |at| at.min(self.expires_at));

            let wakeup = tokio::select! {
                command = self.commands.recv() => Wakeup::Command(command),
                () = sleep_until(cleanup_at) => Wakeup::Cleanup,
            };

            match wakeup {
                Wakeup::Command(Some(command)) => self.handle(command).await,
                Wakeup::Command(None) => break,
                Wakeup::Cleanup => self.purge().await,
            }
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Record { record, reply } => {
                let index = record.index;
                let result = self
                    .store
                    .upsert(self.job_id, &record)
                    .await
                    .map_err(CoordinatorError::from);
                match result {
                    Ok(()) if record.done => {
                        self.done.insert(index);
                        self.check_complete();
                    }
                    Ok(()) => {
                        self.done.remove(&index);
                    }
                    Err(ref e) => {
                        error!(job_id = %self.job_id, index, error = %e, "Failed to store record");
                    }
                }
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let result = self
                    .store
                    .scan(self.job_id)
                    .await
                    .map_err(CoordinatorError::from);
                let _ = reply.send(result);
            }
            Command::State { reply } => {
                let _ = reply.send(self.state);
            }
            Command::Expect { expected, reply } => {
                if self.expected.is_none() {
                    self.seed_done().await;
                    self.expected = Some(expected);
                    self.expires_at = Instant::now() + self.lifetime;
                    self.check_complete();
                }
                let _ = reply.send(());
            }
            Command::Complete => self.mark_complete(),
            Command::Expire => {
                if self.cleanup_at.is_none() {
                    self.schedule_cleanup();
                    info!(job_id = %self.job_id, "Job abandoned before completion");
                }
            }
        }
    }

    /// Pick up records stored before this coordinator started
    async fn seed_done(&mut self) {
        match self.store.scan(self.job_id).await {
            Ok(records) => self.done.extend(
                records
                    .iter()
                    .filter(|record| record.done)
                    .map(|record| record.index),
            ),
            Err(e) => error!(job_id = %self.job_id, error = %e, "Failed to read stored records"),
        }
    }

    fn check_complete(&mut self) {
        let Some(expected) = self.expected else {
            return;
        };
        if self.done.iter().filter(|index| **index < expected).count() == expected {
            self.mark_complete();
        }
    }

    fn mark_complete(&mut self) {
        if self.state == JobState::Open {
            self.state = JobState::Complete;
            self.schedule_cleanup();
            info!(job_id = %self.job_id, "Job complete");
        }
    }

    fn schedule_cleanup(&mut self) {
        self.cleanup_at = Some(Instant::now() + self.retention);
        debug!(
            job_id = %self.job_id,
            retention_secs = self.retention.as_secs(),
            "Cleanup scheduled"
        );
    }

    async fn purge(&mut self) {
        match self.store.purge(self.job_id).await {
            Ok(removed) => info!(job_id = %self.job_id, removed, "Job purged"),
            Err(e) => error!(job_id = %self.job_id, error = %e, "Failed to purge job"),
        }
        self.state = JobState::Purged;
        self.cleanup_at = None;
    }
}
