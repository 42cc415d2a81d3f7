//! Test helpers for fetch-each server integration tests
//!
//! Builds a server with fast timings: millisecond backoff, a short poll
//! interval and a handful of partitions.
#![allow(dead_code)]

use fetcheach_common::retry::BackoffPolicy;
use fetcheach_server::{api::App, config::Config, store::MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const SECRET: &str = "test-secret";

/// Configuration scaled down for tests
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.secret = SECRET.to_string();

    config.queue.partitions = 4;
    config.queue.consumer_concurrency = 8;
    config.queue.redelivery_delay = Duration::from_millis(200);

    config.worker.backoff = BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(200));
    config.worker.request_timeout = Duration::from_secs(5);
    config.worker.write_backoff = Duration::from_millis(10);

    config.coordinator.poll_interval = Duration::from_millis(20);
    config.coordinator.poll_ceiling = Duration::from_secs(10);
    config
}

/// Build an app over an in-memory store
pub fn test_app(config: Config) -> App {
    App::build(config, Arc::new(MemoryStore::new())).expect("Failed to build app")
}

/// A server listening on an ephemeral port
pub struct TestServer {
    pub base_url: String,
    app: App,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn shutdown(self) {
        self.handle.abort();
        self.app.shutdown();
    }
}

/// Start a server with `config` on 127.0.0.1:0
pub async fn spawn_server(config: Config) -> TestServer {
    let app = test_app(config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");

    let router = app.router.clone();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    TestServer {
        base_url: format!("http://{}", addr),
        app,
        handle,
    }
}
