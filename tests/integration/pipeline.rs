//! End-to-end tests: collector cycles delivered to a live ingestion server
//!
//! These tests verify that:
//! - Delivered snapshots land in the store and are readable over HTTP
//! - Threshold violations reach the webhook channel once per cooldown window
//! - The scheduler loop stops cleanly on cancellation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hostpulse::{
    alerts::{AlertChannel, AlertRouter, CooldownTracker, channels::WebhookChannel},
    api::{ApiConfig, ApiServer, ApiState, MetricsResponse, spawn_api_server},
    delivery::DeliveryClient,
    monitors::thresholds::ThresholdSet,
    scheduler::Scheduler,
    storage::{MetricStore, memory::MemoryStore},
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use crate::helpers::{ScriptedSource, endpoint};

async fn spawn_ingest(
    store: Arc<dyn MetricStore>,
    token: Option<&str>,
    shutdown: CancellationToken,
) -> ApiServer {
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        auth_token: token.map(str::to_string),
        enable_cors: false,
    };

    spawn_api_server(config, ApiState::new(store), shutdown)
        .await
        .unwrap()
}

fn cpu_thresholds(limit: f64) -> ThresholdSet {
    ThresholdSet {
        cpu: Some(limit),
        ..ThresholdSet::default()
    }
}

#[tokio::test]
async fn test_cycles_are_stored_and_alerts_respect_cooldown() {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let shutdown = CancellationToken::new();
    let server = spawn_ingest(store.clone(), None, shutdown.clone()).await;

    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alerts"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&webhook)
        .await;

    let channels: Vec<Box<dyn AlertChannel>> = vec![Box::new(
        WebhookChannel::new(format!("{}/alerts", webhook.uri()), &HashMap::new()).unwrap(),
    )];
    let router = AlertRouter::new(CooldownTracker::new(Duration::from_secs(300)), channels);
    let sink = DeliveryClient::new(&endpoint(format!("http://{}/ingest", server.addr), 1));

    let mut scheduler = Scheduler::new(
        ScriptedSource::new("web-01", &[90.0, 95.0, 50.0]),
        cpu_thresholds(80.0),
        router,
        Box::new(sink),
        Duration::from_secs(60),
    );

    let first = scheduler.run_once().await;
    assert!(first.is_success());
    assert_eq!(first.alerts_fired, 1);

    let second = scheduler.run_once().await;
    assert!(second.delivered);
    assert_eq!(second.alerts_fired, 0);
    assert_eq!(second.alerts_suppressed, 1);

    let third = scheduler.run_once().await;
    assert!(third.delivered);
    assert_eq!(third.alerts_fired + third.alerts_suppressed, 0);

    let alerts = webhook.received_requests().await.unwrap();
    assert_eq!(alerts.len(), 1);
    let alert: Value = serde_json::from_slice(&alerts[0].body).unwrap();
    assert_eq!(alert["alert_type"], "cpu_high");
    assert_eq!(alert["hostname"], "web-01");
    assert_eq!(alert["value"], 90.0);
    assert_eq!(alert["threshold"], 80.0);

    let response: MetricsResponse = reqwest::get(format!(
        "http://{}/metrics?hostname=web-01&hours=1",
        server.addr
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(response.count, 3);
    let cpus: Vec<f64> = response.metrics.iter().map(|row| row.cpu_percent).collect();
    assert_eq!(cpus, vec![50.0, 95.0, 90.0]);

    shutdown.cancel();
    server.handle.await.unwrap();
}

#[tokio::test]
async fn test_delivery_with_bearer_token() {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let shutdown = CancellationToken::new();
    let server = spawn_ingest(store.clone(), Some("secret"), shutdown.clone()).await;

    let url = format!("http://{}/ingest", server.addr);
    let scheduler_for = |sink: DeliveryClient| {
        Scheduler::new(
            ScriptedSource::new("web-02", &[10.0]),
            ThresholdSet::default(),
            AlertRouter::new(CooldownTracker::new(Duration::from_secs(60)), vec![]),
            Box::new(sink),
            Duration::from_secs(60),
        )
    };

    // Without credentials the protected service rejects every attempt
    let anonymous = DeliveryClient::new(&endpoint(url.clone(), 2));
    let report = scheduler_for(anonymous.clone()).run_once().await;
    assert!(!report.delivered);
    assert!(store.recent(None, 1).await.unwrap().is_empty());

    let mut config = endpoint(url, 2);
    config.auth_token = Some("secret".to_string());
    let report = scheduler_for(DeliveryClient::new(&config)).run_once().await;
    assert!(report.delivered);
    assert_eq!(store.recent(None, 10).await.unwrap().len(), 1);

    // Health stays reachable without a token
    assert!(anonymous.check_health().await);

    shutdown.cancel();
    server.handle.await.unwrap();
}

#[tokio::test]
async fn test_scheduler_loop_stops_on_cancel() {
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let shutdown = CancellationToken::new();
    let server = spawn_ingest(store.clone(), None, shutdown.clone()).await;

    let scheduler = Scheduler::new(
        ScriptedSource::new("web-03", &[20.0]),
        ThresholdSet::default(),
        AlertRouter::new(CooldownTracker::new(Duration::from_secs(60)), vec![]),
        Box::new(DeliveryClient::new(&endpoint(
            format!("http://{}/ingest", server.addr),
            1,
        ))),
        Duration::from_millis(50),
    );

    let collector_token = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(collector_token.clone()));

    tokio::time::sleep(Duration::from_millis(220)).await;
    collector_token.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert!(stats.cycles >= 2, "only {} cycle(s) ran", stats.cycles);
    assert_eq!(stats.failed_cycles, 0);

    let stored = store.recent(Some("web-03"), 1).await.unwrap();
    assert_eq!(stored.len() as u64, stats.cycles);

    shutdown.cancel();
    server.handle.await.unwrap();
}
