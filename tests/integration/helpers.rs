//! Helper functions for integration tests

use std::sync::Arc;

use async_trait::async_trait;
use hostpulse::{
    CpuMetrics, DiskMetrics, IngestPayload, MemoryMetrics, Snapshot, SwapMetrics,
    config::EndpointConfig, monitors::snapshot::SnapshotSource,
};
use tokio::sync::Mutex;

pub const GB: u64 = 1024 * 1024 * 1024;

pub fn create_test_snapshot(hostname: &str, cpu: f64, memory: f64, disks: &[(&str, f64)]) -> Snapshot {
    Snapshot {
        timestamp: Snapshot::now_timestamp(),
        hostname: hostname.to_string(),
        cpu: CpuMetrics {
            percent: cpu,
            count: 4,
            count_logical: 8,
            load_avg: Some([0.5, 0.4, 0.3]),
        },
        memory: MemoryMetrics {
            total: 16 * GB,
            available: 8 * GB,
            used: 8 * GB,
            free: 8 * GB,
            percent: memory,
            buffers: 0,
            cached: 0,
        },
        swap: SwapMetrics {
            total: 4 * GB,
            used: GB,
            free: 3 * GB,
            percent: 25.0,
        },
        disk: disks
            .iter()
            .map(|(mountpoint, percent)| DiskMetrics {
                device: format!("/dev/{}", mountpoint.trim_start_matches('/')),
                mountpoint: mountpoint.to_string(),
                fstype: "ext4".to_string(),
                total: 100 * GB,
                used: (*percent as u64) * GB,
                free: (100 - *percent as u64) * GB,
                percent: *percent,
            })
            .collect(),
        network: None,
        top_processes: None,
        error: None,
    }
}

pub fn create_test_payload(hostname: &str, cpu: f64, memory: f64) -> IngestPayload {
    IngestPayload::new(create_test_snapshot(hostname, cpu, memory, &[("/", 40.0)]))
}

/// Endpoint config that retries immediately
pub fn endpoint(url: impl ToString, max_retries: u32) -> EndpointConfig {
    EndpointConfig {
        url: url.to_string(),
        timeout: 2,
        max_retries,
        retry_delay: 0,
        auth_token: None,
    }
}

/// Source that replays a fixed list of CPU readings, repeating the last one
#[derive(Clone)]
pub struct ScriptedSource {
    hostname: String,
    readings: Arc<Mutex<Vec<f64>>>,
}

impl ScriptedSource {
    pub fn new(hostname: &str, readings: &[f64]) -> Self {
        Self {
            hostname: hostname.to_string(),
            readings: Arc::new(Mutex::new(readings.iter().rev().copied().collect())),
        }
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn snapshot(&mut self) -> anyhow::Result<Snapshot> {
        let mut readings = self.readings.lock().await;
        let cpu = if readings.len() > 1 {
            readings.pop().unwrap_or_default()
        } else {
            readings.last().copied().unwrap_or_default()
        };
        Ok(create_test_snapshot(&self.hostname, cpu, 50.0, &[("/", 40.0)]))
    }
}
