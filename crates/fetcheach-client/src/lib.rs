//! fetch-each client library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Submits batches of HTTP requests to a fetch-each server and reassembles
//! the ordered results.
//!
//! # Overview
//!
//! - **Client**: [`FetchEachClient::submit_batch`] posts a batch, follows the
//!   progress stream and returns one entry per item, in submission order
//! - **Traversal**: [`traverse`] crawls outward from seed URLs, one batch per round
//! - **CLI**: the `fetcheach` binary wraps both (`fetcheach fetch`, `fetcheach crawl`)
//!
//! # Example
//!
//! ```no_run
//! use fetcheach_client::{ClientConfig, FetchEachClient};
//!
//! # async fn example() -> fetcheach_client::Result<()> {
//! let client = FetchEachClient::new(ClientConfig::new("http://localhost:3003", "secret"))?;
//! let results = client
//!     .submit_batch(vec!["https://example.com".into()], |update| {
//!         println!("{} done", update.done);
//!     })
//!     .await?;
//! assert_eq!(results.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod progress;
pub mod traverse;

// Re-export commonly used types
pub use api::FetchEachClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use traverse::{traverse, TraverseOptions, TraverseSummary};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fetch-each - bulk HTTP fetching through a rate-safe queue
#[derive(Parser, Debug)]
#[command(name = "fetcheach")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Server URL
    #[arg(long, env = "FETCHEACH_URL", default_value = config::DEFAULT_SERVER_URL, global = true)]
    pub server_url: String,

    /// Bearer credential for the server
    #[arg(long, env = "FETCHEACH_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Overall timeout of one batch, in seconds
    #[arg(long, env = "FETCHEACH_TIMEOUT_SECS", default_value_t = config::DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout_secs: u64,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a batch of URLs and print the ordered results
    Fetch {
        /// URLs to fetch
        urls: Vec<String>,

        /// JSON file holding an array of URLs, request objects or nulls
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Crawl from seed URLs, following references found in each result
    Crawl {
        /// Seed URLs
        #[arg(required = true)]
        seeds: Vec<String>,

        /// JSON pointer to the references in each result, e.g. /links
        #[arg(long)]
        links: String,

        /// Only follow references starting with this URL or its path
        #[arg(long)]
        prefix: Option<String>,

        /// Fetch every URL through this proxy, as {proxy}/{url}
        #[arg(long)]
        proxy: Option<String>,

        /// Maximum number of rounds
        #[arg(long)]
        max_rounds: Option<usize>,

        /// Stop after visiting this many URLs
        #[arg(long)]
        max_count: Option<usize>,
    },
}

impl Cli {
    /// Client configuration from the global arguments
    pub fn client_config(&self) -> Result<ClientConfig> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| ClientError::config("FETCHEACH_API_KEY is not set"))?;
        Ok(ClientConfig::new(self.server_url.clone(), api_key)
            .with_timeout(std::time::Duration::from_secs(self.timeout_secs)))
    }
}
