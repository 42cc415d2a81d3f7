//! Traversal tests against a mocked dispatcher serving a small site

use fetcheach_client::{traverse, ClientConfig, FetchEachClient, TraverseOptions};
use fetcheach_common::RequestSpec;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::{matchers::method, Mock, MockServer, Request, ResponseTemplate};

const PROXY: &str = "https://proxy.example";

/// Links of each page on the fake site
fn page_links(url: &str) -> Option<Value> {
    match url {
        "https://site.example/a" => Some(json!([
            "/b",
            "https://site.example/c",
            "https://other.example/x"
        ])),
        "https://site.example/b" => Some(json!(["/a", "/c"])),
        "https://site.example/c" => Some(json!([])),
        _ => None,
    }
}

/// Mount a dispatcher answering every batch from the fake site, recording batch URLs
async fn mount_site(server: &MockServer) -> Arc<Mutex<Vec<Vec<String>>>> {
    let batches = Arc::new(Mutex::new(Vec::new()));
    let recorded = batches.clone();

    Mock::given(method("POST"))
        .respond_with(move |request: &Request| {
            let specs: Vec<Option<RequestSpec>> = request.body_json().unwrap();
            let urls: Vec<String> = specs.into_iter().flatten().map(|spec| spec.url).collect();
            recorded.lock().unwrap().push(urls.clone());

            let array: Vec<Value> = urls
                .iter()
                .map(|url| {
                    let page = url.strip_prefix(&format!("{}/", PROXY)).unwrap_or(url);
                    match page_links(page) {
                        Some(links) => json!({ "status": 200, "result": { "links": links } }),
                        None => json!({ "status": 404, "error": "not found", "result": null }),
                    }
                })
                .collect();
            ResponseTemplate::new(200).set_body_json(array)
        })
        .mount(server)
        .await;

    batches
}

fn links(result: &Value) -> Vec<String> {
    result["links"]
        .as_array()
        .map(|links| {
            links
                .iter()
                .filter_map(|link| link.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn client(server: &MockServer) -> FetchEachClient {
    FetchEachClient::new(ClientConfig::new(server.uri(), "secret")).unwrap()
}

#[tokio::test]
async fn test_traverse_crawls_until_frontier_is_empty() {
    let server = MockServer::start().await;
    let batches = mount_site(&server).await;

    let options = TraverseOptions {
        prefix: Some("https://site.example/".to_string()),
        ..Default::default()
    };
    let mut seen = Vec::new();
    let summary = traverse(
        &client(&server),
        vec!["https://site.example/a".to_string()],
        &options,
        links,
        |url, _| seen.push(url.to_string()),
    )
    .await
    .unwrap();

    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.visited, 3);
    assert_eq!(
        seen,
        vec![
            "https://site.example/a",
            "https://site.example/b",
            "https://site.example/c"
        ]
    );

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(
        batches[1],
        vec!["https://site.example/b", "https://site.example/c"]
    );
}

#[tokio::test]
async fn test_traverse_respects_round_limit() {
    let server = MockServer::start().await;
    let batches = mount_site(&server).await;

    let options = TraverseOptions {
        max_rounds: Some(1),
        ..Default::default()
    };
    let summary = traverse(
        &client(&server),
        vec!["https://site.example/a".to_string()],
        &options,
        links,
        |_, _| {},
    )
    .await
    .unwrap();

    assert_eq!(summary.rounds, 1);
    assert_eq!(batches.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_traverse_respects_visit_limit() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let options = TraverseOptions {
        max_count: Some(1),
        ..Default::default()
    };
    let summary = traverse(
        &client(&server),
        vec!["https://site.example/a".to_string()],
        &options,
        links,
        |_, _| {},
    )
    .await
    .unwrap();

    assert_eq!(summary.visited, 1);
    assert_eq!(summary.rounds, 1);
}

#[tokio::test]
async fn test_traverse_through_proxy_skips_failures() {
    let server = MockServer::start().await;
    let batches = mount_site(&server).await;

    let options = TraverseOptions {
        proxy: Some(PROXY.to_string()),
        prefix: Some("https://site.example/".to_string()),
        ..Default::default()
    };
    let mut results = 0;
    let summary = traverse(
        &client(&server),
        vec![
            "https://site.example/missing".to_string(),
            "https://site.example/c".to_string(),
        ],
        &options,
        links,
        |_, _| results += 1,
    )
    .await
    .unwrap();

    // The 404 page produces no callback and no references
    assert_eq!(results, 1);
    assert_eq!(summary.rounds, 1);
    assert_eq!(
        batches.lock().unwrap()[0],
        vec![
            "https://proxy.example/https://site.example/missing",
            "https://proxy.example/https://site.example/c"
        ]
    );
}
