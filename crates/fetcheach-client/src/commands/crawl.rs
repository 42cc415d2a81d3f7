//! `fetcheach crawl` command implementation
//!
//! Runs a traversal and prints every successful result as one JSON line.

use serde_json::{json, Value};

use crate::api::FetchEachClient;
use crate::error::Result;
use crate::progress::create_spinner;
use crate::traverse::{traverse, TraverseOptions};

/// Crawl from `seeds`, following the references found at `links`
///
/// `links` is a JSON pointer into each result, e.g. `/links`. It may point
/// at a string or an array of strings.
pub async fn run(
    client: &FetchEachClient,
    seeds: Vec<String>,
    links: &str,
    options: &TraverseOptions,
) -> Result<()> {
    let spinner = create_spinner("Crawling");
    let mut found = 0usize;

    let summary = traverse(
        client,
        seeds,
        options,
        |result| links_at(result, links),
        |url, result| {
            found += 1;
            spinner.set_message(format!("Crawling ({} results)", found));
            spinner.suspend(|| println!("{}", json!({ "url": url, "result": result })));
        },
    )
    .await;
    spinner.finish_and_clear();

    let summary = summary?;
    eprintln!(
        "Crawl finished: {} rounds, {} URLs visited, {} results",
        summary.rounds, summary.visited, found
    );
    Ok(())
}

/// Collect the string references at `pointer`
pub fn links_at(result: &Value, pointer: &str) -> Vec<String> {
    match result.pointer(pointer) {
        Some(Value::String(link)) => vec![link.clone()],
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_at() {
        let result = json!({
            "page": { "links": ["/a", 3, "/b"], "next": "/c" }
        });
        assert_eq!(links_at(&result, "/page/links"), vec!["/a", "/b"]);
        assert_eq!(links_at(&result, "/page/next"), vec!["/c"]);
        assert!(links_at(&result, "/missing").is_empty());
    }
}
