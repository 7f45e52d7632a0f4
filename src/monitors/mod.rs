pub mod snapshot;
pub mod thresholds;
