//! Delivery of snapshots to the ingestion endpoint
//!
//! Every attempt resolves to an [`AttemptOutcome`]. The loop in
//! [`DeliveryClient::deliver`] retries only `Retryable` outcomes, up to
//! `max_retries` attempts in total, sleeping `retry_delay` between them. Nothing
//! escapes the client: callers see a bool and the log.

use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::EndpointConfig;
use crate::{IngestPayload, Snapshot};

/// Timeout for `/health` probes
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the client-side identity of a payload
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Delivered,

    /// Timeout, connection failure or non-2xx answer
    Retryable(String),

    /// Local failure that another attempt cannot fix
    Fatal(String),
}

#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: Client,
    url: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    auth_token: Option<String>,
}

impl DeliveryClient {
    pub fn new(config: &EndpointConfig) -> Self {
        Self {
            client: Client::new(),
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_secs(config.retry_delay),
            auth_token: config.auth_token.clone(),
        }
    }

    /// `hostname:timestamp`, stable across retries of the same snapshot
    pub fn idempotency_key(snapshot: &Snapshot) -> String {
        format!("{}:{}", snapshot.hostname, snapshot.timestamp)
    }

    /// Send one snapshot, retrying transient failures.
    ///
    /// Returns `true` once an attempt is acknowledged with a 2xx status.
    #[instrument(skip(self, snapshot), fields(host = %snapshot.hostname))]
    pub async fn deliver(&self, snapshot: &Snapshot) -> bool {
        let key = Self::idempotency_key(snapshot);
        let body = match serde_json::to_vec(&IngestPayload::new(snapshot.clone())) {
            Ok(body) => body,
            Err(e) => {
                error!("failed to serialize metrics payload: {e}");
                return false;
            }
        };

        for attempt in 1..=self.max_retries {
            match self.attempt(&body, &key).await {
                AttemptOutcome::Delivered => {
                    info!("metrics sent successfully (attempt {attempt})");
                    return true;
                }
                AttemptOutcome::Fatal(reason) => {
                    error!("unrecoverable error sending metrics: {reason}");
                    return false;
                }
                AttemptOutcome::Retryable(reason) => {
                    warn!(
                        "network error on attempt {attempt}/{}: {reason}",
                        self.max_retries
                    );
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        error!("failed to send metrics after {} attempts", self.max_retries);
        false
    }

    async fn attempt(&self, body: &[u8], key: &str) -> AttemptOutcome {
        trace!("posting {} bytes to {}", body.len(), self.url);

        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(IDEMPOTENCY_HEADER, key);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.body(body.to_vec()).send().await;

        match response {
            Ok(response) if response.status().is_success() => AttemptOutcome::Delivered,
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                AttemptOutcome::Retryable(format!("HTTP {status}: {text}"))
            }
            Err(e) if e.is_builder() => AttemptOutcome::Fatal(e.to_string()),
            Err(e) => AttemptOutcome::Retryable(e.to_string()),
        }
    }

    /// Probe the endpoint's `/health` route
    #[instrument(skip(self))]
    pub async fn check_health(&self) -> bool {
        let url = match health_url(&self.url) {
            Some(url) => url,
            None => {
                warn!("cannot derive health URL from {}", self.url);
                return false;
            }
        };

        match self.client.get(url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => {
                debug!("health check returned {}", response.status());
                response.status().is_success()
            }
            Err(e) => {
                warn!("health check failed: {e}");
                false
            }
        }
    }
}

/// Same scheme and authority as the ingest URL, path `/health`
pub fn health_url(ingest_url: &str) -> Option<Url> {
    let mut url = Url::parse(ingest_url).ok()?;
    url.set_path("/health");
    url.set_query(None);
    Some(url)
}
