use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, instrument};

use super::channels::{AlertChannel, build_channels};
use super::cooldown::{Clock, CooldownTracker, SystemClock};
use super::AlertEvent;
use crate::config::{AlertsConfig, ConfigError};

/// Result of routing one alert event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// The dedup key was still cooling down; no channel was touched
    pub suppressed: bool,

    /// Every channel accepted the event. Always `false` when suppressed.
    pub success: bool,

    /// Names of the channels that failed
    pub failed_channels: Vec<String>,
}

impl RouteOutcome {
    fn suppressed() -> Self {
        Self {
            suppressed: true,
            ..Self::default()
        }
    }
}

/// Decides whether an alert fires and fans it out to the configured channels.
///
/// The router is the only owner of cooldown state; the scheduler holds it by
/// value and passes `&mut` into each cycle.
pub struct AlertRouter {
    cooldown: CooldownTracker,
    channels: Vec<Box<dyn AlertChannel>>,
}

impl AlertRouter {
    pub fn new(cooldown: CooldownTracker, channels: Vec<Box<dyn AlertChannel>>) -> Self {
        Self { cooldown, channels }
    }

    pub fn from_config(config: &AlertsConfig) -> Result<Self, ConfigError> {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(
        config: &AlertsConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let channels = build_channels(config)?;
        Ok(Self::new(
            CooldownTracker::with_clock(config.cooldown(), clock),
            channels,
        ))
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|channel| channel.name()).collect()
    }

    pub fn cooldown(&self) -> &CooldownTracker {
        &self.cooldown
    }

    /// Route a single event.
    ///
    /// The cooldown entry is updated before any channel is tried, and is kept
    /// even when every channel fails.
    #[instrument(skip(self, event), fields(key = %event.dedup_key()))]
    pub async fn route(&mut self, event: &AlertEvent) -> RouteOutcome {
        let key = event.dedup_key();
        if !self.cooldown.try_fire(&key) {
            debug!("alert {key} is in cooldown");
            return RouteOutcome::suppressed();
        }

        let results = join_all(self.channels.iter().map(|channel| async move {
            (channel.name(), channel.send(event).await)
        }))
        .await;

        let failed_channels: Vec<String> = results
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    error!("failed to send alert via {name}: {e}");
                    Some(name.to_string())
                }
            })
            .collect();

        RouteOutcome {
            suppressed: false,
            success: failed_channels.is_empty(),
            failed_channels,
        }
    }

    /// Route events one after another, in the order given
    pub async fn route_all(&mut self, events: &[AlertEvent]) -> Vec<RouteOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.route(event).await);
        }
        outcomes
    }
}
