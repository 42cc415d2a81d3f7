//! fetch-each CLI - Main entry point

use clap::Parser;
use fetcheach_client::{
    commands, traverse::TraverseOptions, Cli, Commands, FetchEachClient,
};
use fetcheach_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Let .env supply the environment-backed arguments
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // stdout carries results; logs go to stderr
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("fetcheach")
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // CLI should work without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> fetcheach_client::Result<()> {
    let client = FetchEachClient::new(cli.client_config()?)?;

    match &cli.command {
        Commands::Fetch { urls, input } => {
            commands::fetch::run(&client, urls, input.as_deref()).await
        }
        Commands::Crawl {
            seeds,
            links,
            prefix,
            proxy,
            max_rounds,
            max_count,
        } => {
            let options = TraverseOptions {
                max_rounds: *max_rounds,
                max_count: *max_count,
                prefix: prefix.clone(),
                proxy: proxy.clone(),
                headers: None,
            };
            commands::crawl::run(&client, seeds.clone(), links, &options).await
        }
    }
}
