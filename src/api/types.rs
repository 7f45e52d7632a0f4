//! API request and response types
//!
//! Every response carries a `status` discriminator so a dashboard can branch on
//! it without looking at the HTTP status.

use serde::{Deserialize, Serialize};

use crate::storage::{MetricsSummary, StoredMetricRow};

pub const DEFAULT_HOURS: i64 = 24;
pub const DEFAULT_DAYS_TO_KEEP: i64 = 30;

pub const SERVICE_NAME: &str = "metrics-ingestion";

/// Status discriminator shared by all responses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Healthy,
    Error,
}

// ============================================================================
// Query parameters
// ============================================================================

/// `?hostname=&hours=` for the read endpoints
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub hostname: Option<String>,
    pub hours: Option<i64>,
}

/// `?days_to_keep=` for `/cleanup`
#[derive(Debug, Default, Deserialize)]
pub struct CleanupQuery {
    pub days_to_keep: Option<i64>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: ResponseStatus,
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub status: ResponseStatus,
    pub count: usize,
    pub metrics: Vec<StoredMetricRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub status: ResponseStatus,
    pub summary: MetricsSummary,
    pub period_hours: u32,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ResponseStatus,
    pub timestamp: String,
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub status: ResponseStatus,
    pub deleted_records: usize,
    pub days_kept: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub status: ResponseStatus,
    pub timestamp: String,
    pub started_at: String,
    pub storage: String,
    pub storage_healthy: bool,
}
