//! In-process API surface tests with mock adapters.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use harmonia_core::testing::{torrent_source, MockAdapter};
use harmonia_core::{Config, RankedSearch, SearchEngine, SourceAdapter};
use harmonia_server::api::create_router;
use harmonia_server::state::AppState;

fn router_with(adapters: Vec<Arc<dyn SourceAdapter>>) -> Router {
    let engine = Arc::new(SearchEngine::new(adapters));
    let state = Arc::new(AppState::new(
        Config::default(),
        RankedSearch::new(engine),
        None,
        vec!["test".to_string()],
        "test".to_string(),
    ));
    create_router(state)
}

async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_readiness() {
    let adapter: Arc<dyn SourceAdapter> = Arc::new(MockAdapter::new("a"));
    let (status, body) = get(router_with(vec![adapter]), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "harmonia");
    assert_eq!(body["search_ready"], true);

    let (_, body) = get(router_with(vec![]), "/health").await;
    assert_eq!(body["search_ready"], false);
}

#[tokio::test]
async fn search_returns_ranked_wire_shape() {
    let adapter: Arc<dyn SourceAdapter> = Arc::new(MockAdapter::new("a").with_results(vec![
        torrent_source("Radiohead - OK Computer [FLAC]", "abc123", 60, 600),
        torrent_source("Radiohead - OK Computer [MP3 320]", "def456", 10, 150),
    ]));

    let (status, body) = post(
        router_with(vec![adapter]),
        "/search",
        json!({"query": "radiohead ok computer", "min_seeders": 1}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "radiohead ok computer");
    assert_eq!(body["total_found"], 2);
    assert!(body["sql_query"].as_str().unwrap().starts_with("SELECT"));

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);

    let top = &results[0];
    assert_eq!(top["rank"], 1);
    assert_eq!(top["source"]["format"], "FLAC");
    assert_eq!(top["source"]["source_type"], "torrent");
    assert!(top["source"]["magnet_link"]
        .as_str()
        .unwrap()
        .starts_with("magnet:"));
    assert!(top["source"]["size_formatted"].as_str().is_some());
    assert!(top["explanation"].as_str().unwrap().contains("FLAC"));
    let tags: Vec<&str> = top["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert!(tags.contains(&"best"));
    assert!(tags.contains(&"lossless"));
}

#[tokio::test]
async fn search_rejects_empty_query() {
    let (status, body) = post(router_with(vec![]), "/search", json!({"query": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("required"));
}

#[tokio::test]
async fn search_with_no_adapters_returns_empty() {
    let (status, body) = post(
        router_with(vec![]),
        "/search",
        json!({"query": "anything goes"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_found"], 0);
    assert_eq!(body["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn search_applies_min_seeders_filter() {
    let adapter: Arc<dyn SourceAdapter> = Arc::new(MockAdapter::new("a").with_results(vec![
        torrent_source("Well seeded [FLAC]", "aaa", 40, 500),
        torrent_source("Dying [FLAC]", "bbb", 1, 500),
    ]));

    let (_, body) = post(
        router_with(vec![adapter]),
        "/search",
        json!({"query": "well seeded flac", "min_seeders": 10}),
    )
    .await;

    assert_eq!(body["total_found"], 1);
}

#[tokio::test]
async fn resolve_without_stream_source_fails_cleanly() {
    let (status, body) = post(
        router_with(vec![]),
        "/resolve",
        json!({"video_id": "abc123xyz"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["video_id"], "abc123xyz");
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn indexers_lists_adapter_health() {
    let adapter: Arc<dyn SourceAdapter> = Arc::new(MockAdapter::new("my-indexer"));
    let (status, body) = get(router_with(vec![adapter]), "/indexers").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_profile"], "test");
    let indexers = body["indexers"].as_array().unwrap();
    assert_eq!(indexers.len(), 1);
    assert_eq!(indexers[0]["name"], "my-indexer");
    assert_eq!(indexers[0]["healthy"], true);
    assert_eq!(indexers[0]["consecutive_failures"], 0);
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let response = router_with(vec![])
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("# TYPE") || text.is_empty() || text.contains("harmonia"));
}
