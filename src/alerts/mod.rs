//! Alert events, notification channels and cooldown-based routing
//!
//! ```text
//! evaluate(snapshot) ─► AlertEvent ─► AlertRouter ─┬─► LogChannel
//!                                        │         ├─► SlackChannel
//!                                  CooldownTracker ├─► WebhookChannel
//!                                                  └─► EmailChannel
//! ```
//!
//! The router owns the cooldown state. An event whose dedup key fired within the
//! cooldown window is suppressed before any channel is touched.

pub mod channels;
pub mod cooldown;
pub mod router;
pub mod slack;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use channels::{AlertChannel, ChannelError};
pub use cooldown::{Clock, CooldownTracker, DedupKey, ManualClock, SystemClock};
pub use router::{AlertRouter, RouteOutcome};

/// Observed values at or above this percentage are reported as critical
pub const CRITICAL_PERCENT: f64 = 95.0;

/// Metric family an alert was raised for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    CpuHigh,
    MemoryHigh,
    DiskHigh,
    SwapHigh,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::CpuHigh => "cpu_high",
            AlertType::MemoryHigh => "memory_high",
            AlertType::DiskHigh => "disk_high",
            AlertType::SwapHigh => "swap_high",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Severity for a percentage that crossed its threshold
    pub fn for_percent(observed: f64) -> Self {
        if observed >= CRITICAL_PERCENT {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold violation, created by the evaluator and discarded after routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert_type: AlertType,
    pub hostname: String,
    pub message: String,
    #[serde(rename = "value")]
    pub observed_value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,

    /// Mount point for disk alerts, part of the dedup identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
}

impl AlertEvent {
    /// Identity used for cooldown grouping
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            hostname: self.hostname.clone(),
            alert_type: self.alert_type,
            mountpoint: self.mountpoint.clone(),
        }
    }
}
