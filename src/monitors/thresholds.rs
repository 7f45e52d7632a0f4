//! Threshold evaluation
//!
//! Each metric family is checked on its own. A family without a configured limit
//! is skipped, and disk is checked per mount so one full volume cannot hide behind
//! others that still have room.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::Snapshot;
use crate::alerts::{AlertEvent, AlertType, Severity};

/// Configured ceilings (percent) per metric family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub disk: Option<f64>,
    pub swap: Option<f64>,
}

impl ThresholdSet {
    pub fn limit_for(&self, alert_type: AlertType) -> Option<f64> {
        match alert_type {
            AlertType::CpuHigh => self.cpu,
            AlertType::MemoryHigh => self.memory,
            AlertType::DiskHigh => self.disk,
            AlertType::SwapHigh => self.swap,
        }
    }
}

/// Strictly above the limit; equality never fires
pub fn exceeds(observed: f64, limit: f64) -> bool {
    observed > limit
}

/// Compare a snapshot against the thresholds.
///
/// Events come out in family order cpu, memory, disk (in snapshot mount order),
/// swap.
pub fn evaluate(snapshot: &Snapshot, thresholds: &ThresholdSet) -> Vec<AlertEvent> {
    let timestamp = snapshot.parsed_timestamp().unwrap_or_else(Utc::now);
    let mut events = Vec::new();

    let mut push = |alert_type, observed: f64, limit: f64, message: String, mount: Option<&str>| {
        events.push(AlertEvent {
            alert_type,
            hostname: snapshot.hostname.clone(),
            message,
            observed_value: observed,
            threshold: limit,
            severity: Severity::for_percent(observed),
            timestamp,
            mountpoint: mount.map(str::to_string),
        });
    };

    if let Some(limit) = thresholds.cpu
        && exceeds(snapshot.cpu.percent, limit)
    {
        let observed = snapshot.cpu.percent;
        push(
            AlertType::CpuHigh,
            observed,
            limit,
            format!("High CPU usage: {observed:.1}% (threshold: {limit}%)"),
            None,
        );
    }

    if let Some(limit) = thresholds.memory
        && exceeds(snapshot.memory.percent, limit)
    {
        let observed = snapshot.memory.percent;
        push(
            AlertType::MemoryHigh,
            observed,
            limit,
            format!("High memory usage: {observed:.1}% (threshold: {limit}%)"),
            None,
        );
    }

    if let Some(limit) = thresholds.disk {
        for disk in &snapshot.disk {
            if !exceeds(disk.percent, limit) {
                continue;
            }
            let observed = disk.percent;
            push(
                AlertType::DiskHigh,
                observed,
                limit,
                format!(
                    "High disk usage on {}: {observed:.1}% (threshold: {limit}%)",
                    disk.mountpoint
                ),
                Some(disk.mountpoint.as_str()),
            );
        }
    }

    if let Some(limit) = thresholds.swap
        && exceeds(snapshot.swap.percent, limit)
    {
        let observed = snapshot.swap.percent;
        push(
            AlertType::SwapHigh,
            observed,
            limit,
            format!("High swap usage: {observed:.1}% (threshold: {limit}%)"),
            None,
        );
    }

    trace!(
        "{}: {} threshold violation(s)",
        snapshot.hostname,
        events.len()
    );

    events
}
