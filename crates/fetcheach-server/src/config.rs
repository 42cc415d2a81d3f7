//! Configuration management

use fetcheach_common::retry::{BackoffPolicy, DEFAULT_BACKOFF_CAP_SECS, DEFAULT_MAX_ATTEMPTS};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 3003;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Queue Constants
// ============================================================================

/// Default number of queue partitions.
pub const DEFAULT_PARTITIONS: usize = 100;

/// Smallest send chunk per partition, tuned for per-task concurrency.
pub const DEFAULT_MIN_BATCH: usize = 6;

/// Largest send chunk per partition; also the queue's batch-send limit.
pub const DEFAULT_MAX_BATCH: usize = 100;

/// Messages handed to a consumer per delivery batch.
pub const DEFAULT_CONSUMER_BATCH: usize = 6;

/// Concurrent delivery batches per partition.
pub const DEFAULT_CONSUMER_CONCURRENCY: usize = 250;

/// Redelivery delay for messages that were neither acked nor explicitly retried.
pub const DEFAULT_REDELIVERY_DELAY_MS: u64 = 30_000;

/// Deliveries after which an unsettled message is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u32 = 100;

// ============================================================================
// Worker Constants
// ============================================================================

/// Default outbound request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Attempts at writing one record to the coordinator.
pub const DEFAULT_WRITE_RETRIES: u32 = 5;

/// First delay between coordinator write attempts.
pub const DEFAULT_WRITE_BACKOFF_MS: u64 = 100;

// ============================================================================
// Coordinator Constants
// ============================================================================

/// Interval between completion checks.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Longest a caller waits for a job (1 day).
pub const DEFAULT_POLL_CEILING_SECS: u64 = 86_400;

/// How long a completed job's state is kept (1 hour).
pub const DEFAULT_RETENTION_SECS: u64 = 3_600;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub coordinator: CoordinatorConfig,
    /// PostgreSQL result store; the in-memory store is used when absent
    pub database: Option<DatabaseConfig>,
}

/// Server-specific configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Bearer credential expected on every submission
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig").field("secret", &"<redacted>").finish()
    }
}

/// Partitioned queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub partitions: usize,
    pub min_batch: usize,
    pub max_batch: usize,
    pub consumer_batch: usize,
    pub consumer_concurrency: usize,
    pub redelivery_delay: Duration,
    pub max_deliveries: u32,
}

/// Queue consumer / task executor configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub request_timeout: Duration,
    pub write_retries: u32,
    pub write_backoff: Duration,
}

/// Job coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub poll_interval: Duration,
    pub poll_ceiling: Duration,
    pub retention: Duration,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("FETCHEACH_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("FETCHEACH_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "FETCHEACH_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            auth: AuthConfig {
                secret: std::env::var("FETCHEACH_SECRET").unwrap_or_default(),
            },
            queue: QueueConfig {
                partitions: env_or("FETCHEACH_PARTITIONS", DEFAULT_PARTITIONS),
                min_batch: env_or("FETCHEACH_MIN_BATCH", DEFAULT_MIN_BATCH),
                max_batch: env_or("FETCHEACH_MAX_BATCH", DEFAULT_MAX_BATCH),
                consumer_batch: env_or("FETCHEACH_CONSUMER_BATCH", DEFAULT_CONSUMER_BATCH),
                consumer_concurrency: env_or(
                    "FETCHEACH_CONSUMER_CONCURRENCY",
                    DEFAULT_CONSUMER_CONCURRENCY,
                ),
                redelivery_delay: Duration::from_millis(env_or(
                    "FETCHEACH_REDELIVERY_DELAY_MS",
                    DEFAULT_REDELIVERY_DELAY_MS,
                )),
                max_deliveries: env_or("FETCHEACH_MAX_DELIVERIES", DEFAULT_MAX_DELIVERIES),
            },
            worker: WorkerConfig {
                max_attempts: env_or("FETCHEACH_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
                backoff: BackoffPolicy::new(
                    defaults.worker.backoff.unit,
                    Duration::from_secs(env_or(
                        "FETCHEACH_BACKOFF_CAP_SECS",
                        DEFAULT_BACKOFF_CAP_SECS,
                    )),
                ),
                request_timeout: Duration::from_secs(env_or(
                    "FETCHEACH_REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )),
                write_retries: env_or("FETCHEACH_WRITE_RETRIES", DEFAULT_WRITE_RETRIES),
                write_backoff: defaults.worker.write_backoff,
            },
            coordinator: CoordinatorConfig {
                poll_interval: Duration::from_millis(env_or(
                    "FETCHEACH_POLL_INTERVAL_MS",
                    DEFAULT_POLL_INTERVAL_MS,
                )),
                poll_ceiling: Duration::from_secs(env_or(
                    "FETCHEACH_POLL_CEILING_SECS",
                    DEFAULT_POLL_CEILING_SECS,
                )),
                retention: Duration::from_secs(env_or(
                    "FETCHEACH_RETENTION_SECS",
                    DEFAULT_RETENTION_SECS,
                )),
            },
            database: std::env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
                url,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            }),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.auth.secret.is_empty() {
            anyhow::bail!("FETCHEACH_SECRET must be set to a non-empty credential");
        }

        if self.queue.partitions == 0 {
            anyhow::bail!("Queue partitions must be greater than 0");
        }

        if self.queue.min_batch == 0 || self.queue.min_batch > self.queue.max_batch {
            anyhow::bail!(
                "Queue batch bounds are invalid: min {} / max {}",
                self.queue.min_batch,
                self.queue.max_batch
            );
        }

        if self.queue.consumer_batch == 0 || self.queue.consumer_concurrency == 0 {
            anyhow::bail!("Consumer batch size and concurrency must be greater than 0");
        }

        // The final attempt of a task must still be deliverable
        if self.queue.max_deliveries <= self.worker.max_attempts {
            anyhow::bail!(
                "FETCHEACH_MAX_DELIVERIES ({}) must be greater than FETCHEACH_MAX_ATTEMPTS ({})",
                self.queue.max_deliveries,
                self.worker.max_attempts
            );
        }

        if self.worker.write_retries == 0 {
            anyhow::bail!("Coordinator write retries must be at least 1");
        }

        if self.coordinator.poll_interval.is_zero() {
            anyhow::bail!("Coordinator poll interval must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            auth: AuthConfig {
                secret: String::new(),
            },
            queue: QueueConfig {
                partitions: DEFAULT_PARTITIONS,
                min_batch: DEFAULT_MIN_BATCH,
                max_batch: DEFAULT_MAX_BATCH,
                consumer_batch: DEFAULT_CONSUMER_BATCH,
                consumer_concurrency: DEFAULT_CONSUMER_CONCURRENCY,
                redelivery_delay: Duration::from_millis(DEFAULT_REDELIVERY_DELAY_MS),
                max_deliveries: DEFAULT_MAX_DELIVERIES,
            },
            worker: WorkerConfig {
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                backoff: BackoffPolicy::default(),
                request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
                write_retries: DEFAULT_WRITE_RETRIES,
                write_backoff: Duration::from_millis(DEFAULT_WRITE_BACKOFF_MS),
            },
            coordinator: CoordinatorConfig {
                poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
                poll_ceiling: Duration::from_secs(DEFAULT_POLL_CEILING_SECS),
                retention: Duration::from_secs(DEFAULT_RETENTION_SECS),
            },
            database: None,
        }
    }
}
