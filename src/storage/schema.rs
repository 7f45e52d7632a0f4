//! Stored row and aggregate definitions
//!
//! ## Layout
//!
//! The values the dashboard filters and aggregates on are typed columns:
//! - `hostname`, `timestamp`, `ingested_at`
//! - `cpu_percent`, `memory_percent`, `swap_percent`
//! - `memory_total`, `memory_used`
//!
//! Everything else is kept as JSON: the disk list, the network counters, and
//! the complete payload as it was received (`raw_data`). New snapshot fields
//! therefore need no migration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DiskMetrics, IngestPayload, NetworkMetrics};

/// One persisted snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMetricRow {
    /// Assigned by the store; strictly increasing and never reused
    pub id: i64,

    /// Collection time as sent by the collector
    pub timestamp: String,

    pub hostname: String,

    // === Typed columns ===
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_total: u64,
    pub memory_used: u64,
    pub swap_percent: f64,

    // === JSON columns ===
    pub disk_data: Vec<DiskMetrics>,
    pub network_data: Option<NetworkMetrics>,
    pub raw_data: IngestPayload,

    /// When the ingestion service accepted the row; retention and the `hours`
    /// window are measured against this
    pub ingested_at: DateTime<Utc>,
}

impl StoredMetricRow {
    /// Project a payload onto the stored layout
    pub fn from_payload(id: i64, payload: &IngestPayload, ingested_at: DateTime<Utc>) -> Self {
        let metrics = &payload.metrics;

        Self {
            id,
            timestamp: metrics.timestamp.clone(),
            hostname: payload.hostname.clone(),
            cpu_percent: metrics.cpu.percent,
            memory_percent: metrics.memory.percent,
            memory_total: metrics.memory.total,
            memory_used: metrics.memory.used,
            swap_percent: metrics.swap.percent,
            disk_data: metrics.disk.clone(),
            network_data: metrics.network.clone(),
            raw_data: payload.clone(),
            ingested_at,
        }
    }
}

/// Aggregates over a window of rows; all `None` when the window is empty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_records: i64,
    pub avg_cpu: Option<f64>,
    pub max_cpu: Option<f64>,
    pub avg_memory: Option<f64>,
    pub max_memory: Option<f64>,
    pub avg_swap: Option<f64>,
    pub max_swap: Option<f64>,
}

impl MetricsSummary {
    /// Aggregate rows in memory
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a StoredMetricRow>) -> Self {
        let mut summary = Self::default();
        let (mut cpu, mut memory, mut swap) = (0.0, 0.0, 0.0);

        for row in rows {
            summary.total_records += 1;
            cpu += row.cpu_percent;
            memory += row.memory_percent;
            swap += row.swap_percent;
            summary.max_cpu = max_of(summary.max_cpu, row.cpu_percent);
            summary.max_memory = max_of(summary.max_memory, row.memory_percent);
            summary.max_swap = max_of(summary.max_swap, row.swap_percent);
        }

        if summary.total_records > 0 {
            let n = summary.total_records as f64;
            summary.avg_cpu = Some(cpu / n);
            summary.avg_memory = Some(memory / n);
            summary.avg_swap = Some(swap / n);
        }

        summary
    }
}

fn max_of(current: Option<f64>, value: f64) -> Option<f64> {
    Some(current.map_or(value, |m| m.max(value)))
}
