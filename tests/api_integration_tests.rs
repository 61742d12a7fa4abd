//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::time::Duration;
use tidecache::{api::create_router, AppState, FileCache, MemCache};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_router(AppState::new(MemCache::new(), FileCache::new()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_json(uri: &str, json: &'static str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json))
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == SET / GET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let response = create_test_app()
        .oneshot(put_json("/set", r#"{"key":"test_key","value":"test_value"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_set_endpoint_rejects_empty_key() {
    let response = create_test_app()
        .oneshot(put_json("/set", r#"{"key":"","value":"v"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_get_endpoint_reports_ttl() {
    let app = create_test_app();

    let set_response = app
        .clone()
        .oneshot(put_json("/set", r#"{"key":"get_key","value":"get_value","ttl":60}"#))
        .await
        .unwrap();
    assert_eq!(set_response.status(), StatusCode::OK);

    let get_response = app.oneshot(request("GET", "/get/get_key")).await.unwrap();

    assert_eq!(get_response.status(), StatusCode::OK);
    let json = body_to_json(get_response.into_body()).await;
    assert_eq!(json["key"], "get_key");
    assert_eq!(json["value"], "get_value");
    let remaining = json["ttl_remaining_ms"].as_u64().unwrap();
    assert!(remaining > 0 && remaining <= 60_000);
}

#[tokio::test]
async fn test_get_endpoint_expired_is_not_found() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"short","value":"v","ttl":0}"#))
        .await
        .unwrap();

    let response = app.oneshot(request("GET", "/get/short")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_twice() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"delete_key","value":"v"}"#))
        .await
        .unwrap();

    let first = app.clone().oneshot(request("DELETE", "/del/delete_key")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(request("DELETE", "/del/delete_key")).await.unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);

    let get_response = app.oneshot(request("GET", "/get/delete_key")).await.unwrap();
    assert_eq!(get_response.status(), StatusCode::NOT_FOUND);
}

// == PURGE / STATS Endpoint Tests ==

#[tokio::test]
async fn test_purge_then_stats() {
    let state = AppState::new(MemCache::new(), FileCache::new());
    state.kv.insert("dead".to_string(), "v".to_string(), Some(Duration::ZERO));
    state.kv.insert("live".to_string(), "v".to_string(), None);
    let app = create_router(state);

    // Get (hit) and get (expired miss)
    app.clone().oneshot(request("GET", "/get/live")).await.unwrap();
    app.clone().oneshot(request("GET", "/get/dead")).await.unwrap();

    let purge = app.clone().oneshot(request("POST", "/purge")).await.unwrap();
    assert_eq!(purge.status(), StatusCode::OK);
    let json = body_to_json(purge.into_body()).await;
    assert_eq!(json["kv_removed"], 1);
    assert_eq!(json["files_removed"], 0);

    let stats = app.oneshot(request("GET", "/stats")).await.unwrap();
    let json = body_to_json(stats.into_body()).await;
    assert_eq!(json["kv"]["hits"], 1);
    assert_eq!(json["kv"]["misses"], 1);
    assert_eq!(json["kv"]["expired"], 1);
    assert_eq!(json["kv"]["purged"], 1);
    assert_eq!(json["kv"]["total_entries"], 1);
}

// == FILES Endpoint Tests ==

#[tokio::test]
async fn test_files_endpoint_loads_then_hits() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("css")).unwrap();
    std::fs::write(dir.path().join("css/site.css"), "body{}").unwrap();

    let state = AppState::new(MemCache::new(), FileCache::new())
        .with_file_root(dir.path(), Some(Duration::from_secs(60)));
    let files = state.files.clone();
    let app = create_router(state);

    let first = app.clone().oneshot(request("GET", "/files/css/site.css")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-cache"], "miss");
    let body = axum::body::to_bytes(first.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"body{}");

    // The file changes on disk, but the cache keeps serving the stored copy
    std::fs::write(dir.path().join("css/site.css"), "changed").unwrap();

    let second = app.clone().oneshot(request("GET", "/files/css//site.css")).await.unwrap();
    assert_eq!(second.headers()["x-cache"], "hit");
    let body = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"body{}");

    assert_eq!(files.find("css/site.css").as_deref(), Some(&b"body{}"[..]));

    let deleted = app.clone().oneshot(request("DELETE", "/files/css/site.css")).await.unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
    assert!(files.is_empty());
}

#[tokio::test]
async fn test_files_endpoint_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_router(
        AppState::new(MemCache::new(), FileCache::new()).with_file_root(dir.path(), None),
    );

    let response = app.oneshot(request("GET", "/files/nope.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let response = create_test_app()
        .oneshot(request("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

// == Live Server Test ==

#[tokio::test]
async fn test_live_server_roundtrip() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_test_app();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let set = client
        .put(format!("{}/set", base))
        .json(&serde_json::json!({"key": "live", "value": "wire"}))
        .send()
        .await
        .unwrap();
    assert_eq!(set.status(), reqwest::StatusCode::OK);

    let got: Value = client
        .get(format!("{}/get/live", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(got["value"], "wire");

    server.abort();
}
