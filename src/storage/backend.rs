//! Metric store trait definition
//!
//! This module defines the `MetricStore` trait that every ingestion backend
//! implements.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::error::StorageResult;
use super::schema::{MetricsSummary, StoredMetricRow};
use crate::IngestPayload;

/// Upper bound on rows returned by [`MetricStore::recent`]
pub const RECENT_ROW_LIMIT: usize = 1000;

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Rows ingested strictly after this instant are inside an `hours` window
pub fn window_start(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    saturating_sub(now, Duration::hours(i64::from(hours)))
}

/// Rows ingested at or before this instant are removed by `cleanup(days)`
pub fn retention_cutoff(now: DateTime<Utc>, days_to_keep: u32) -> DateTime<Utc> {
    saturating_sub(now, Duration::days(i64::from(days_to_keep)))
}

fn saturating_sub(now: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(by).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Persistence for ingested snapshots
///
/// ## Concurrency
///
/// Implementations are shared across request handlers and the retention task,
/// so they must be `Send + Sync`. All mutations (`store`, `cleanup`) are
/// serialized by the implementation; readers may run alongside a writer and see
/// either the state before or after it, never a partial write.
///
/// ## Errors
///
/// A failed `store` leaves previously stored data unchanged.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Persist one payload and return its row id
    async fn store(&self, payload: &IngestPayload) -> StorageResult<i64>;

    /// Rows ingested within the last `hours`, newest first, at most
    /// [`RECENT_ROW_LIMIT`]
    async fn recent(&self, hostname: Option<&str>, hours: u32)
    -> StorageResult<Vec<StoredMetricRow>>;

    /// Count, averages and maxima over the same window as [`MetricStore::recent`]
    /// (without the row cap)
    async fn summary(&self, hostname: Option<&str>, hours: u32) -> StorageResult<MetricsSummary>;

    /// Delete rows ingested `days_to_keep` days ago or earlier.
    ///
    /// Returns the number of rows deleted.
    async fn cleanup(&self, days_to_keep: u32) -> StorageResult<usize>;

    /// Lightweight check that the backend is operational
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human-readable statistics about the backend
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
