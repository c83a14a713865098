//! Brave adapter contract tests against a fake upstream.

use std::time::Duration;

use serde_json::json;
use trawl_client::{BraveClient, BraveConfig};
use trawl_core::{AppConfig, Cursor, Provider, SourceError};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> BraveClient {
    BraveClient::new(BraveConfig {
        api_key: Some("test-key".into()),
        base_url: server.uri(),
        timeout: Duration::from_millis(500),
        count: 3,
        min_interval: Duration::ZERO,
        ..Default::default()
    })
    .unwrap()
}

fn body(urls: &[&str], more: bool) -> serde_json::Value {
    let results: Vec<_> = urls
        .iter()
        .map(|u| json!({ "title": format!("Title {u}"), "url": u, "description": "" }))
        .collect();
    json!({ "query": { "original": "rust", "more_results_available": more }, "web": { "results": results } })
}

#[tokio::test]
async fn test_first_page_request_format() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/web/search"))
        .and(header("X-Subscription-Token", "test-key"))
        .and(query_param("q", "rust async"))
        .and(query_param("count", "3"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(
            &["https://a.example/1", "https://a.example/2", "https://a.example/3"],
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server).fetch_page("rust async", None).await.unwrap();

    assert_eq!(page.items.len(), 3);
    assert!(page.has_more);
    assert_eq!(page.next_cursor, Some(Cursor::PageOffset { page: 1, offset: 3 }));
}

#[tokio::test]
async fn test_configured_safesearch_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/web/search"))
        .and(query_param("safesearch", "strict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(&["https://a.example/1"], false)))
        .expect(1)
        .mount(&server)
        .await;

    let app = AppConfig {
        brave_api_key: Some("test-key".into()),
        brave_safesearch: Some("strict".into()),
        ..Default::default()
    };
    let client = BraveClient::new(BraveConfig {
        base_url: server.uri(),
        min_interval: Duration::ZERO,
        ..BraveConfig::from_app(&app)
    })
    .unwrap();

    let page = client.fetch_page("rust", None).await.unwrap();
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn test_cursor_selects_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/web/search"))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(&["https://a.example/13"], false)))
        .expect(1)
        .mount(&server)
        .await;

    let cursor = Cursor::PageOffset { page: 4, offset: 12 };
    let page = client(&server).fetch_page("rust", Some(&cursor)).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert!(!page.has_more);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_last_page_is_final_even_if_more_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("offset", "9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(&["https://a.example/x"], true)))
        .mount(&server)
        .await;

    let cursor = Cursor::PageOffset { page: 9, offset: 27 };
    let page = client(&server).fetch_page("rust", Some(&cursor)).await.unwrap();

    assert!(!page.has_more);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_auth_failure_is_not_configured() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server).fetch_page("rust", None).await.unwrap_err();
    assert!(err.is_setup_problem());
}

#[tokio::test]
async fn test_status_errors_are_upstream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("q", "limited"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("q", "broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let brave = client(&server);
    assert_eq!(
        brave.fetch_page("limited", None).await.unwrap_err(),
        SourceError::upstream("rate limited: too many requests")
    );
    assert_eq!(brave.fetch_page("broken", None).await.unwrap_err(), SourceError::upstream("HTTP error: 503"));
}

#[tokio::test]
async fn test_bad_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = client(&server).fetch_page("rust", None).await.unwrap_err();
    assert!(matches!(err, SourceError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body(&["https://a.example/1"], false))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = client(&server).fetch_page("rust", None).await.unwrap_err();
    assert_eq!(err, SourceError::Timeout { timeout_ms: 500 });
}
