//! Per-key alert cooldown
//!
//! The tracker remembers when each dedup key last fired. A key fires again only
//! once a full cooldown window has passed. Entries that have been quiet for
//! [`STALE_AFTER_WINDOWS`] windows are dropped by a sweep that runs at most once
//! per window, which keeps the map bounded on hosts with churning mount points.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::trace;

use super::AlertType;

/// Entries idle for this many cooldown windows are evicted
pub const STALE_AFTER_WINDOWS: u32 = 4;

/// Time source for cooldown decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Identity of an alert for cooldown grouping
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub hostname: String,
    pub alert_type: AlertType,
    pub mountpoint: Option<String>,
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.alert_type)?;
        if let Some(mount) = &self.mountpoint {
            write!(f, ":{mount}")?;
        }
        Ok(())
    }
}

pub struct CooldownTracker {
    window: Duration,
    last_fired: HashMap<DedupKey, Instant>,
    last_sweep: Option<Instant>,
    clock: Arc<dyn Clock>,
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            last_fired: HashMap::new(),
            last_sweep: None,
            clock,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `key` fired less than one window ago
    pub fn is_cooling_down(&self, key: &DedupKey) -> bool {
        let now = self.clock.now();
        self.last_fired
            .get(key)
            .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
    }

    /// Record a firing of `key` unless it is still cooling down.
    ///
    /// Returns `true` when the caller should emit the alert. The timestamp is
    /// recorded before any delivery happens, so a failed delivery still starts the
    /// window.
    pub fn try_fire(&mut self, key: &DedupKey) -> bool {
        let now = self.clock.now();
        self.sweep(now);

        if self.is_cooling_down(key) {
            trace!("{key} suppressed by cooldown");
            return false;
        }

        let entry = self.last_fired.entry(key.clone()).or_insert(now);
        *entry = (*entry).max(now);
        true
    }

    fn sweep(&mut self, now: Instant) {
        let due = self
            .last_sweep
            .is_none_or(|last| now.saturating_duration_since(last) >= self.window);
        if !due {
            return;
        }
        self.last_sweep = Some(now);

        let stale_after = self
            .window
            .checked_mul(STALE_AFTER_WINDOWS)
            .unwrap_or(Duration::MAX);
        let before = self.last_fired.len();
        self.last_fired
            .retain(|_, last| now.saturating_duration_since(*last) < stale_after);

        let evicted = before - self.last_fired.len();
        if evicted > 0 {
            trace!("evicted {evicted} stale cooldown entries");
        }
    }

    pub fn len(&self) -> usize {
        self.last_fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fired.is_empty()
    }
}
