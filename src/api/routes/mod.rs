pub mod cleanup;
pub mod health;
pub mod ingest;
pub mod metrics;
pub mod stats;
