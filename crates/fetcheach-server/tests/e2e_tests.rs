//! End-to-end tests: client -> dispatcher -> queue -> worker -> coordinator
//!
//! A wiremock server plays the upstream sites. The fetch-each server runs on
//! an ephemeral port and is driven by the real client.

mod helpers;

use fetcheach_client::{ClientConfig, ClientError, FetchEachClient};
use fetcheach_common::{BatchItem, HttpMethod, RequestSpec};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use helpers::{spawn_server, test_config, SECRET};

fn client(base_url: &str) -> FetchEachClient {
    FetchEachClient::new(
        ClientConfig::new(base_url, SECRET).with_timeout(Duration::from_secs(30)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_batch_results_come_back_in_submission_order() {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "page": "a" }))
                .insert_header("x-upstream", "yes"),
        )
        .mount(&upstream)
        .await;

    // b is rate limited twice before it succeeds
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(503).set_body_string("slow down"))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain text b"))
        .with_priority(2)
        .expect(1)
        .mount(&upstream)
        .await;

    // 404 is terminal: fetched exactly once
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such page"))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = spawn_server(test_config()).await;
    let mut updates = Vec::new();
    let results = client(&server.base_url)
        .submit_batch(
            vec![
                format!("{}/a", upstream.uri()).into(),
                format!("{}/b", upstream.uri()).into(),
                BatchItem::Empty,
                format!("{}/c", upstream.uri()).into(),
            ],
            |update| updates.push(update.clone()),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 4);

    assert_eq!(results[0].status, 200);
    assert_eq!(results[0].result, json!({ "page": "a" }));
    let headers = results[0].headers.as_ref().unwrap();
    assert_eq!(headers.get("x-upstream").map(String::as_str), Some("yes"));

    assert_eq!(results[1].status, 200);
    assert_eq!(results[1].result, json!("plain text b"));

    assert_eq!(results[2].status, 200);
    assert!(results[2].result.is_null());

    assert_eq!(results[3].status, 404);
    assert_eq!(results[3].error.as_deref(), Some("no such page"));

    // Progress frames never repeat and never go backwards
    assert!(!updates.is_empty());
    assert!(updates.iter().any(|update| update.done < 4));
    for pair in updates.windows(2) {
        assert_ne!(pair[0], pair[1]);
        assert!(pair[0].done <= pair[1].done);
    }

    server.shutdown();
}

#[tokio::test]
async fn test_request_objects_are_sent_as_given() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_json(json!({ "q": "rust" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hits": 3 })))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("PUT"))
        .and(path("/raw"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "image/png"))
        .expect(1)
        .mount(&upstream)
        .await;

    let server = spawn_server(test_config()).await;
    let results = client(&server.base_url)
        .fetch_each(vec![
            RequestSpec::get(format!("{}/search", upstream.uri()))
                .with_body(json!({ "q": "rust" }))
                .into(),
            RequestSpec {
                url: format!("{}/raw", upstream.uri()),
                method: Some(HttpMethod::Put),
                headers: None,
                body: None,
            }
            .into(),
        ])
        .await
        .unwrap();

    assert_eq!(results[0].result, json!({ "hits": 3 }));
    // Binary media is acknowledged without a body
    assert_eq!(results[1].status, 200);
    assert!(results[1].result.is_null());

    server.shutdown();
}

#[tokio::test]
async fn test_job_past_ceiling_reports_timeout() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstream)
        .await;

    let mut config = test_config();
    config.coordinator.poll_ceiling = Duration::from_millis(500);
    let server = spawn_server(config).await;

    let err = client(&server.base_url)
        .fetch_each(vec![
            format!("{}/ok", upstream.uri()).into(),
            format!("{}/busy", upstream.uri()).into(),
        ])
        .await
        .unwrap_err();

    match err {
        ClientError::Timeout { message, partial } => {
            assert_eq!(message, "Timeout exceeded: max queue time is 500 ms");
            assert!(partial.iter().any(|entry| entry.result == json!("fine")));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    server.shutdown();
}

#[tokio::test]
async fn test_wrong_credential_is_rejected() {
    let server = spawn_server(test_config()).await;
    let client = FetchEachClient::new(ClientConfig::new(&server.base_url, "nope")).unwrap();

    let err = client
        .fetch_each(vec!["https://a.example".into()])
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 401, .. }));
    server.shutdown();
}

#[tokio::test]
async fn test_health_check_against_server() {
    let server = spawn_server(test_config()).await;
    assert!(client(&server.base_url).health_check().await.unwrap());
    server.shutdown();
}
