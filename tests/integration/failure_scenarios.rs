//! Integration tests for failure handling
//!
//! These tests verify that:
//! - Transient ingest failures are retried until one attempt succeeds
//! - An unreachable endpoint fails the cycle without stopping the scheduler
//! - A failing alert channel does not block delivery or the other channels

use std::collections::HashMap;
use std::time::Duration;

use hostpulse::{
    alerts::{
        AlertChannel, AlertRouter, CooldownTracker,
        channels::{LogChannel, WebhookChannel},
    },
    delivery::{DeliveryClient, IDEMPOTENCY_HEADER},
    monitors::thresholds::ThresholdSet,
    scheduler::Scheduler,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use crate::helpers::{ScriptedSource, endpoint};

fn quiet_router() -> AlertRouter {
    AlertRouter::new(CooldownTracker::new(Duration::from_secs(60)), vec![])
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let ingest = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&ingest)
        .await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(2)
        .mount(&ingest)
        .await;

    let mut scheduler = Scheduler::new(
        ScriptedSource::new("db-01", &[30.0]),
        ThresholdSet::default(),
        quiet_router(),
        Box::new(DeliveryClient::new(&endpoint(
            format!("{}/ingest", ingest.uri()),
            3,
        ))),
        Duration::from_secs(60),
    );

    let report = scheduler.run_once().await;
    assert!(report.is_success());

    let requests = ingest.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    // Every retry carries the same idempotency key
    let keys: Vec<_> = requests
        .iter()
        .map(|request| request.headers.get(IDEMPOTENCY_HEADER).cloned())
        .collect();
    assert!(keys[0].is_some());
    assert!(keys.iter().all(|key| *key == keys[0]));
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_cycle_but_not_scheduler() {
    // Nothing listens on port 1
    let mut scheduler = Scheduler::new(
        ScriptedSource::new("db-02", &[30.0]),
        ThresholdSet::default(),
        quiet_router(),
        Box::new(DeliveryClient::new(&endpoint("http://127.0.0.1:1/ingest", 2))),
        Duration::from_secs(60),
    );

    let first = scheduler.run_once().await;
    assert!(!first.delivered);
    assert!(first.error.is_none());
    assert!(!first.is_success());

    let second = scheduler.run_once().await;
    assert!(!second.delivered);

    assert_eq!(scheduler.stats().cycles, 2);
    assert_eq!(scheduler.stats().failed_cycles, 2);
}

#[tokio::test]
async fn test_failing_channel_does_not_block_delivery() {
    let ingest = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ingest)
        .await;

    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&webhook)
        .await;

    let router = AlertRouter::new(
        CooldownTracker::new(Duration::from_secs(60)),
        vec![
            Box::new(LogChannel) as Box<dyn AlertChannel>,
            Box::new(WebhookChannel::new(webhook.uri(), &HashMap::new()).unwrap()),
        ],
    );

    let mut scheduler = Scheduler::new(
        ScriptedSource::new("db-03", &[99.0]),
        ThresholdSet {
            cpu: Some(90.0),
            ..ThresholdSet::default()
        },
        router,
        Box::new(DeliveryClient::new(&endpoint(
            format!("{}/ingest", ingest.uri()),
            1,
        ))),
        Duration::from_secs(60),
    );

    let report = scheduler.run_once().await;
    assert!(report.delivered);
    assert_eq!(report.alerts_fired, 1);
    assert_eq!(report.alert_failures, 1);
    assert_eq!(webhook.received_requests().await.unwrap().len(), 1);

    // The failed send still started the cooldown
    let report = scheduler.run_once().await;
    assert_eq!(report.alerts_suppressed, 1);
    assert_eq!(webhook.received_requests().await.unwrap().len(), 1);
}
