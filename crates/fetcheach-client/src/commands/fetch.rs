//! `fetcheach fetch` command implementation
//!
//! Submits one batch and prints the ordered results.

use fetcheach_common::BatchItem;
use serde_json::Value;
use std::path::Path;

use crate::api::FetchEachClient;
use crate::error::{ClientError, Result};
use crate::progress::{apply_update, create_progress_bar};

/// Fetch `urls` plus the items of `input`, if given
pub async fn run(client: &FetchEachClient, urls: &[String], input: Option<&Path>) -> Result<()> {
    let mut items: Vec<BatchItem> = urls.iter().cloned().map(BatchItem::from).collect();
    if let Some(path) = input {
        items.extend(read_items(path).await?);
    }

    if items.is_empty() {
        return Err(ClientError::config("No URLs given; pass URLs or --input <file.json>"));
    }

    let pb = create_progress_bar(items.len() as u64, "Fetching");
    let result = client.submit_batch(items, |update| apply_update(&pb, update)).await;
    pb.finish_and_clear();

    let array = result?;
    println!("{}", serde_json::to_string_pretty(&array)?);
    Ok(())
}

/// Read a JSON array of batch items from a file
pub async fn read_items(path: &Path) -> Result<Vec<BatchItem>> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_items(serde_json::from_str(&text)?)
}

fn parse_items(value: Value) -> Result<Vec<BatchItem>> {
    let Value::Array(values) = value else {
        return Err(ClientError::config("Input file must contain a JSON array"));
    };
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| BatchItem::from_value(index, value).map_err(ClientError::from))
        .collect()
}
