//! Periodic retention sweep
//!
//! Runs `cleanup(retention_days)` once at startup and then on every interval
//! tick until cancelled. Sweeps go through the store's writer lock like any
//! other mutation.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::backend::MetricStore;

pub struct RetentionTask {
    store: Arc<dyn MetricStore>,
    retention_days: u32,
    every: Duration,
}

impl RetentionTask {
    pub fn new(store: Arc<dyn MetricStore>, retention_days: u32, every: Duration) -> Self {
        Self {
            store,
            retention_days,
            every,
        }
    }

    /// One sweep; errors are logged and reported as `None`
    pub async fn sweep(&self) -> Option<usize> {
        match self.store.cleanup(self.retention_days).await {
            Ok(deleted) => {
                info!(
                    "retention sweep removed {deleted} records older than {} days",
                    self.retention_days
                );
                Some(deleted)
            }
            Err(e) => {
                error!("retention sweep failed: {e}");
                None
            }
        }
    }

    #[instrument(skip_all, fields(days = self.retention_days))]
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                // the first tick completes immediately
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }

        debug!("retention task stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
