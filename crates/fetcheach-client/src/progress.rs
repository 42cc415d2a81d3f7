//! Progress bar utilities for the CLI
//!
//! A batch's progress bar is driven by the `update` frames of its stream.

use fetcheach_common::StreamUpdate;
use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar for a batch of `total` items
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Create a spinner for rounds of unknown size
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Move the bar to the finished count and show the status histogram
pub fn apply_update(pb: &ProgressBar, update: &StreamUpdate) {
    pb.set_position(update.done);
    pb.set_message(format_histogram(update));
}

/// Render a status histogram, e.g. `200: 3, 503: 1`
pub fn format_histogram(update: &StreamUpdate) -> String {
    update
        .status
        .iter()
        .map(|(status, count)| format!("{}: {}", status, count))
        .collect::<Vec<_>>()
        .join(", ")
}
