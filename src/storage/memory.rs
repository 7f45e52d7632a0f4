//! In-memory metric store (no persistence)
//!
//! Used when the ingestion service runs with `backend = "none"`, and in tests.
//! All data is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::backend::{
    HealthStatus, MetricStore, RECENT_ROW_LIMIT, retention_cutoff, window_start,
};
use super::error::{StorageError, StorageResult};
use super::schema::{MetricsSummary, StoredMetricRow};
use crate::IngestPayload;

#[derive(Default)]
struct Inner {
    /// Rows in insertion order
    rows: Vec<StoredMetricRow>,

    /// Last id handed out; survives cleanup so ids are never reused
    last_id: i64,

    closed: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with an explicit ingestion time
    pub async fn store_at(
        &self,
        payload: &IngestPayload,
        ingested_at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return Err(StorageError::Closed);
        }

        inner.last_id += 1;
        let id = inner.last_id;
        inner
            .rows
            .push(StoredMetricRow::from_payload(id, payload, ingested_at));

        debug!("stored metrics row {id}");
        Ok(id)
    }

    fn window<'a>(
        inner: &'a Inner,
        hostname: Option<&'a str>,
        hours: u32,
    ) -> impl Iterator<Item = &'a StoredMetricRow> {
        let since = window_start(Utc::now(), hours);
        inner
            .rows
            .iter()
            .filter(move |row| row.ingested_at > since)
            .filter(move |row| hostname.is_none_or(|host| row.hostname == host))
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn store(&self, payload: &IngestPayload) -> StorageResult<i64> {
        self.store_at(payload, Utc::now()).await
    }

    async fn recent(
        &self,
        hostname: Option<&str>,
        hours: u32,
    ) -> StorageResult<Vec<StoredMetricRow>> {
        let inner = self.inner.read().await;
        if inner.closed {
            return Err(StorageError::Closed);
        }

        let mut rows: Vec<StoredMetricRow> = Self::window(&inner, hostname, hours).cloned().collect();
        rows.sort_by(|a, b| b.ingested_at.cmp(&a.ingested_at).then(b.id.cmp(&a.id)));
        rows.truncate(RECENT_ROW_LIMIT);
        Ok(rows)
    }

    async fn summary(&self, hostname: Option<&str>, hours: u32) -> StorageResult<MetricsSummary> {
        let inner = self.inner.read().await;
        if inner.closed {
            return Err(StorageError::Closed);
        }

        Ok(MetricsSummary::from_rows(Self::window(&inner, hostname, hours)))
    }

    async fn cleanup(&self, days_to_keep: u32) -> StorageResult<usize> {
        let cutoff = retention_cutoff(Utc::now(), days_to_keep);

        let mut inner = self.inner.write().await;
        if inner.closed {
            return Err(StorageError::Closed);
        }

        let before = inner.rows.len();
        inner.rows.retain(|row| row.ingested_at > cutoff);
        let deleted = before - inner.rows.len();

        info!("cleaned up {} records older than {} days", deleted, days_to_keep);
        Ok(deleted)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let inner = self.inner.read().await;
        let mut metadata = HashMap::new();
        metadata.insert("backend".to_string(), "memory".to_string());

        Ok(HealthStatus {
            healthy: !inner.closed,
            message: if inner.closed {
                "in-memory backend closed".to_string()
            } else {
                "in-memory backend operational".to_string()
            },
            metadata,
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let inner = self.inner.read().await;
        let hosts: std::collections::HashSet<&str> =
            inner.rows.iter().map(|row| row.hostname.as_str()).collect();

        Ok(format!(
            "In-memory: {} rows from {} hosts",
            inner.rows.len(),
            hosts.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.write().await.closed = true;
        Ok(())
    }
}
