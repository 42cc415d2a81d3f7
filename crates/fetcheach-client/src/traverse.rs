//! Frontier traversal
//!
//! Crawls outward from a set of seed URLs. Each round submits the whole
//! frontier as one batch, hands every successful result to the caller, and
//! builds the next frontier from the references the caller extracts.

use fetcheach_common::{BatchItem, RequestSpec};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};
use url::Url;

use crate::api::FetchEachClient;
use crate::error::Result;

/// Limits and request shaping for [`traverse`]
#[derive(Debug, Clone, Default)]
pub struct TraverseOptions {
    /// Maximum number of batches to submit
    pub max_rounds: Option<usize>,

    /// Stop once this many URLs have been visited
    pub max_count: Option<usize>,

    /// Only follow references starting with this URL, or with its path
    pub prefix: Option<String>,

    /// Fetch every URL as `{proxy}/{url}`
    pub proxy: Option<String>,

    /// Headers sent with every request
    pub headers: Option<BTreeMap<String, String>>,
}

impl TraverseOptions {
    fn request_for(&self, url: &str) -> RequestSpec {
        let target = match &self.proxy {
            Some(proxy) => format!("{}/{}", proxy.trim_end_matches('/'), url),
            None => url.to_string(),
        };
        RequestSpec {
            url: target,
            method: None,
            headers: self.headers.clone(),
            body: None,
        }
    }

    fn accepts(&self, reference: &str) -> bool {
        let Some(prefix) = &self.prefix else {
            return true;
        };
        if reference.starts_with(prefix.as_str()) {
            return true;
        }
        Url::parse(prefix)
            .map(|url| reference.starts_with(url.path()))
            .unwrap_or(false)
    }
}

/// Outcome of a traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraverseSummary {
    /// Batches submitted
    pub rounds: usize,
    /// Distinct URLs fetched
    pub visited: usize,
}

/// Crawl from `seeds` until the frontier is exhausted or a limit is hit
///
/// `extract` returns the follow-up references of one successful result.
/// Relative references are resolved against the URL that produced them.
/// `on_result` is called with the URL and body of every successful result
/// as soon as its round completes.
pub async fn traverse<E, R>(
    client: &FetchEachClient,
    seeds: Vec<String>,
    options: &TraverseOptions,
    mut extract: E,
    mut on_result: R,
) -> Result<TraverseSummary>
where
    E: FnMut(&Value) -> Vec<String>,
    R: FnMut(&str, &Value),
{
    let mut visited: HashSet<String> = HashSet::new();
    let mut summary = TraverseSummary::default();
    let mut frontier = dedup(seeds);

    while !frontier.is_empty() {
        if options.max_rounds.is_some_and(|max| summary.rounds >= max) {
            info!(rounds = summary.rounds, "Round limit reached");
            break;
        }

        let items: Vec<BatchItem> = frontier
            .iter()
            .map(|url| BatchItem::Request(options.request_for(url)))
            .collect();
        debug!(round = summary.rounds + 1, urls = items.len(), "Submitting frontier");
        let results = client.fetch_each(items).await?;

        summary.rounds += 1;
        visited.extend(frontier.iter().cloned());
        summary.visited = visited.len();

        let mut next = Vec::new();
        let mut queued = HashSet::new();
        for (url, entry) in frontier.iter().zip(results.iter()) {
            if !entry.is_success() {
                continue;
            }
            on_result(url, &entry.result);

            for reference in extract(&entry.result) {
                if !options.accepts(&reference) {
                    continue;
                }
                let resolved = resolve(url, &reference);
                if visited.contains(&resolved) || !queued.insert(resolved.clone()) {
                    continue;
                }
                next.push(resolved);
            }
        }

        info!(
            round = summary.rounds,
            visited = summary.visited,
            next = next.len(),
            "Round complete"
        );

        if options.max_count.is_some_and(|max| summary.visited >= max) {
            info!(visited = summary.visited, "Visit limit reached");
            break;
        }
        frontier = next;
    }

    Ok(summary)
}

fn dedup(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|url| seen.insert(url.clone())).collect()
}

fn resolve(base: &str, reference: &str) -> String {
    if Url::parse(reference).is_ok() {
        return reference.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(reference))
        .map(String::from)
        .unwrap_or_else(|_| reference.to_string())
}
