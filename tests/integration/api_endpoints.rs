//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Valid payloads are stored and invalid ones are rejected before storage
//! - Read endpoints honor the hostname filter and the hours window
//! - Authentication protects everything except `/health`
//! - Manual cleanup reports what it removed

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use hostpulse::{
    api::{ApiConfig, ApiState, build_router},
    storage::{MetricStore, memory::MemoryStore},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::helpers::create_test_payload;

const TOKEN: &str = "test-token";

fn create_app(token: Option<&str>) -> (Router, Arc<dyn MetricStore>) {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        auth_token: token.map(str::to_string),
        enable_cors: true,
    };
    (build_router(&config, ApiState::new(store.clone())), store)
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn payload_json(hostname: &str, cpu: f64, memory: f64) -> Value {
    serde_json::to_value(create_test_payload(hostname, cpu, memory)).unwrap()
}

#[tokio::test]
async fn test_ingest_stores_valid_payload() {
    let (app, store) = create_app(Some(TOKEN));

    let (status, body) = send(
        &app,
        request(Method::POST, "/ingest", Some(payload_json("api-01", 55.0, 65.0))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Metrics stored for api-01");
    assert_eq!(body["id"], 1);

    let rows = store.recent(Some("api-01"), 1).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cpu_percent, 55.0);
}

#[tokio::test]
async fn test_ingest_rejects_invalid_payloads() {
    let (app, store) = create_app(Some(TOKEN));

    let mut out_of_range = payload_json("api-02", 55.0, 65.0);
    out_of_range["metrics"]["cpu"]["percent"] = json!(150.0);
    let (status, body) = send(&app, request(Method::POST, "/ingest", Some(out_of_range))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("metrics.cpu.percent"));

    let mut missing_field = payload_json("api-02", 55.0, 65.0);
    missing_field["metrics"].as_object_mut().unwrap().remove("memory");
    let (status, body) = send(&app, request(Method::POST, "/ingest", Some(missing_field))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/ingest")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let mut bad_timestamp = payload_json("api-02", 55.0, 65.0);
    bad_timestamp["metrics"]["timestamp"] = json!("not-a-time");
    let (status, _) = send(&app, request(Method::POST, "/ingest", Some(bad_timestamp))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(store.recent(None, 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_and_summary() {
    let (app, _store) = create_app(Some(TOKEN));

    for (host, memory) in [("api-03", 60.0), ("api-03", 70.0), ("other", 10.0)] {
        let (status, _) = send(
            &app,
            request(Method::POST, "/ingest", Some(payload_json(host, 50.0, memory))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, request(Method::GET, "/metrics?hostname=api-03", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["metrics"][0]["memory_percent"], 70.0);
    assert_eq!(body["metrics"][0]["raw_data"]["hostname"], "api-03");
    assert_eq!(body["metrics"][0]["raw_data"]["metrics"]["memory"]["percent"], 70.0);

    let (_, body) = send(&app, request(Method::GET, "/metrics", None)).await;
    assert_eq!(body["count"], 3);

    let (status, body) = send(
        &app,
        request(Method::GET, "/metrics/summary?hostname=api-03&hours=1", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["period_hours"], 1);
    assert_eq!(body["hostname"], "api-03");
    assert_eq!(body["summary"]["total_records"], 2);
    assert_eq!(body["summary"]["avg_memory"], 65.0);
    assert_eq!(body["summary"]["max_memory"], 70.0);

    let (status, body) = send(&app, request(Method::GET, "/metrics?hours=0", None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");

    let (status, _) = send(&app, request(Method::GET, "/metrics?hours=abc", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_summary() {
    let (app, _store) = create_app(None);

    let (status, body) = send(&app, request(Method::GET, "/metrics/summary", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total_records"], 0);
    assert_eq!(body["summary"]["avg_cpu"], Value::Null);
    assert_eq!(body["period_hours"], 24);
}

#[tokio::test]
async fn test_cleanup_endpoint() {
    let (app, store) = create_app(Some(TOKEN));
    store.store(&create_test_payload("api-04", 1.0, 1.0)).await.unwrap();
    store.store(&create_test_payload("api-04", 2.0, 2.0)).await.unwrap();

    let (status, body) = send(&app, request(Method::POST, "/cleanup", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_records"], 0);
    assert_eq!(body["days_kept"], 30);

    let (status, body) = send(&app, request(Method::POST, "/cleanup?days_to_keep=0", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["deleted_records"], 2);
    assert_eq!(body["days_kept"], 0);

    let (status, _) = send(&app, request(Method::POST, "/cleanup?days_to_keep=-1", None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_authentication() {
    let (app, _store) = create_app(Some(TOKEN));

    let no_header = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, no_header).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");

    let wrong_scheme = Request::builder()
        .uri("/metrics")
        .header(header::AUTHORIZATION, format!("Token {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, wrong_scheme).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong_token = Request::builder()
        .method(Method::POST)
        .uri("/ingest")
        .header(header::AUTHORIZATION, "Bearer nope")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload_json("api-05", 1.0, 1.0).to_string()))
        .unwrap();
    let (status, _) = send(&app, wrong_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let health = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, health).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "metrics-ingestion");
}

#[tokio::test]
async fn test_open_service_without_token() {
    let (app, _store) = create_app(None);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/ingest")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload_json("api-06", 1.0, 1.0).to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, store) = create_app(Some(TOKEN));
    store.store(&create_test_payload("api-07", 1.0, 1.0)).await.unwrap();

    let (status, body) = send(&app, request(Method::GET, "/stats", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["storage_healthy"], true);
    assert_eq!(body["storage"], "In-memory: 1 rows from 1 hosts");
}
