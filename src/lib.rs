pub mod alerts;
pub mod api;
pub mod config;
pub mod delivery;
pub mod monitors;
pub mod scheduler;
pub mod storage;
pub mod util;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped capture of a host's resource metrics.
///
/// This is also the wire format of the ingestion endpoint, so optional blocks are
/// omitted from the JSON instead of being sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Collection time, ISO-8601 in UTC
    pub timestamp: String,
    pub hostname: String,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub swap: SwapMetrics,
    #[serde(default)]
    pub disk: Vec<DiskMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_processes: Option<Vec<ProcessMetrics>>,
    /// Set by a source that could only partially collect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub percent: f64,
    pub count: usize,
    pub count_logical: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_avg: Option<[f64; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
    #[serde(default)]
    pub buffers: u64,
    #[serde(default)]
    pub cached: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapMetrics {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    #[serde(default)]
    pub errin: u64,
    #[serde(default)]
    pub errout: u64,
    #[serde(default)]
    pub dropin: u64,
    #[serde(default)]
    pub dropout: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Body of `POST /ingest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestPayload {
    pub hostname: String,
    pub metrics: Snapshot,
}

impl IngestPayload {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            hostname: snapshot.hostname.clone(),
            metrics: snapshot,
        }
    }
}

impl Snapshot {
    /// Current time formatted the way snapshots carry it
    pub fn now_timestamp() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parse the snapshot timestamp.
    ///
    /// Accepts RFC 3339 (`Z` or explicit offset) as well as naive ISO-8601, which is
    /// interpreted as UTC.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
