//! API shared state

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::storage::MetricStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Store that ingested payloads are written to and queried from
    pub store: Arc<dyn MetricStore>,

    /// When the service started, reported by `/stats`
    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self {
            store,
            started_at: Utc::now(),
        }
    }
}
