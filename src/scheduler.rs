//! Collection scheduler
//!
//! Runs one cycle per interval until cancelled:
//!
//! ```text
//! ┌─► snapshot ─► evaluate ─► route alerts ─► deliver ─► sleep(T - elapsed) ─┐
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A cycle that overruns the interval is followed immediately by the next one; no
//! cycle is skipped and none is run twice. Cancellation is observed at the top
//! of the loop and during the sleep, so a cycle that has started always finishes.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::AlertRouter;
use crate::config::{CollectorConfig, ConfigError};
use crate::delivery::DeliveryClient;
use crate::monitors::snapshot::SnapshotSource;
use crate::monitors::thresholds::{ThresholdSet, evaluate};
use crate::Snapshot;

/// Where finished snapshots go
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn deliver(&self, snapshot: &Snapshot) -> bool;
}

#[async_trait]
impl MetricSink for DeliveryClient {
    async fn deliver(&self, snapshot: &Snapshot) -> bool {
        DeliveryClient::deliver(self, snapshot).await
    }
}

/// What happened during one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub alerts_fired: usize,
    pub alerts_suppressed: usize,
    pub alert_failures: usize,
    pub delivered: bool,
    pub elapsed: Duration,

    /// Set when no snapshot could be taken
    pub error: Option<String>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.delivered
    }
}

/// Running totals since the scheduler started
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub alerts_fired: u64,
    pub alerts_suppressed: u64,
    pub overruns: u64,
}

impl SchedulerStats {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if !report.is_success() {
            self.failed_cycles += 1;
        }
        self.alerts_fired += report.alerts_fired as u64;
        self.alerts_suppressed += report.alerts_suppressed as u64;
    }
}

pub struct Scheduler<S> {
    source: S,
    thresholds: ThresholdSet,
    router: AlertRouter,
    alerts_enabled: bool,
    sink: Box<dyn MetricSink>,
    interval: Duration,
    stats: SchedulerStats,
}

impl<S: SnapshotSource> Scheduler<S> {
    /// Wire a scheduler from the collector configuration
    pub fn from_config(source: S, config: &CollectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let router = AlertRouter::from_config(&config.alerts)?;

        Ok(Self::new(
            source,
            config.thresholds.clone(),
            router,
            Box::new(DeliveryClient::new(&config.endpoint)),
            config.interval(),
        )
        .alerts_enabled(config.alerts.enabled))
    }

    pub fn new(
        source: S,
        thresholds: ThresholdSet,
        router: AlertRouter,
        sink: Box<dyn MetricSink>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            thresholds,
            router,
            alerts_enabled: true,
            sink,
            interval,
            stats: SchedulerStats::default(),
        }
    }

    pub fn alerts_enabled(mut self, enabled: bool) -> Self {
        self.alerts_enabled = enabled;
        self
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Run exactly one collect, alert and deliver cycle
    #[instrument(skip(self))]
    pub async fn run_once(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        let snapshot = match self.source.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("failed to collect metrics: {e:#}");
                report.error = Some(e.to_string());
                report.elapsed = started.elapsed();
                self.stats.record(&report);
                return report;
            }
        };

        if self.alerts_enabled {
            let events = evaluate(&snapshot, &self.thresholds);
            for outcome in self.router.route_all(&events).await {
                if outcome.suppressed {
                    report.alerts_suppressed += 1;
                } else {
                    report.alerts_fired += 1;
                    if !outcome.success {
                        report.alert_failures += 1;
                    }
                }
            }
        }

        report.delivered = self.sink.deliver(&snapshot).await;
        report.elapsed = started.elapsed();

        debug!(
            "cycle finished in {:.2}s: delivered={}, {} alert(s) fired, {} suppressed",
            report.elapsed.as_secs_f64(),
            report.delivered,
            report.alerts_fired,
            report.alerts_suppressed
        );

        self.stats.record(&report);
        report
    }

    /// Loop until `shutdown` is cancelled and return the totals
    #[instrument(skip_all, fields(interval = self.interval.as_secs()))]
    pub async fn run(mut self, shutdown: CancellationToken) -> SchedulerStats {
        info!("starting metrics collector, interval {}s", self.interval.as_secs());

        while !shutdown.is_cancelled() {
            let report = self.run_once().await;

            match self.interval.checked_sub(report.elapsed) {
                Some(remaining) if !remaining.is_zero() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(remaining) => {}
                    }
                }
                _ => {
                    self.stats.overruns += 1;
                    warn!(
                        "metrics collection took {:.2}s, longer than interval of {}s",
                        report.elapsed.as_secs_f64(),
                        self.interval.as_secs()
                    );
                }
            }
        }

        info!(
            "metrics collector stopped after {} cycle(s), {} failed",
            self.stats.cycles, self.stats.failed_cycles
        );
        self.stats
    }
}
