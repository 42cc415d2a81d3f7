//! Application assembly: state, router and background consumers

use axum::{
    http::StatusCode, middleware::from_fn_with_state, response::IntoResponse, routing::get,
    Router,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::coordinator::CoordinatorRegistry;
use crate::features;
use crate::middleware;
use crate::queue::{spawn_consumers, MemoryQueue, TaskQueue};
use crate::store::ResultStore;
use crate::worker::{QueueConsumer, TaskExecutor};

/// Usage string returned for `GET /` and unknown routes
pub const USAGE: &str = "Usage: POST / (array) => any[]";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: Arc<dyn TaskQueue>,
    pub coordinators: CoordinatorRegistry,
}

/// A fully wired server: the router plus the queue consumers feeding it
pub struct App {
    pub router: Router,
    pub state: AppState,
    consumers: Vec<JoinHandle<()>>,
}

impl App {
    /// Wire the queue, the coordinators and the consumers together
    ///
    /// Must be called from within a Tokio runtime: the partition consumers
    /// start immediately.
    pub fn build(config: Config, store: Arc<dyn ResultStore>) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let (queue, partitions) = MemoryQueue::new(&config.queue);
        let coordinators = CoordinatorRegistry::new(store, config.coordinator.clone());

        let executor = TaskExecutor::new(&config.worker)?;
        let consumer = QueueConsumer::new(
            executor,
            Arc::new(coordinators.clone()),
            &config.worker,
        );
        let consumers = spawn_consumers(partitions, Arc::new(consumer));
        tracing::info!(partitions = consumers.len(), "Queue consumers started");

        let state = AppState {
            config,
            queue: Arc::new(queue),
            coordinators,
        };

        Ok(Self {
            router: create_router(state.clone()),
            state,
            consumers,
        })
    }

    /// Stop the queue consumers; in-flight batches are dropped
    pub fn shutdown(self) {
        for consumer in self.consumers {
            consumer.abort();
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    features::router()
        .route_layer(from_fn_with_state(state.clone(), middleware::require_bearer))
        .route("/", get(usage))
        .route("/health", get(health))
        .fallback(usage)
        .with_state(state)
        .layer(middleware::tracing_layer())
}

async fn usage() -> impl IntoResponse {
    USAGE
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
