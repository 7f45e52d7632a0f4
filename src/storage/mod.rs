//! Storage for ingested metrics
//!
//! ## Design
//!
//! - **Trait-based**: `MetricStore` lets the API run against any backend
//! - **Async**: All operations are async and shared across request handlers
//! - **Single writer**: mutations are serialized inside each backend
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database file
//! - **In-Memory**: No persistence, for `backend = "none"` and tests
//!
//! ## Usage
//!
//! ```no_run
//! use hostpulse::storage::{MetricStore, sqlite::SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteStore::new("./metrics.db").await?;
//!     println!("{}", store.get_stats().await?);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod retention;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;

use tracing::info;

pub use backend::{HealthStatus, MetricStore, RECENT_ROW_LIMIT};
pub use error::{StorageError, StorageResult};
pub use retention::RetentionTask;
pub use schema::{MetricsSummary, StoredMetricRow};

use crate::config::StorageConfig;

/// Open the backend selected in the configuration
pub async fn open_store(config: &StorageConfig) -> StorageResult<Arc<dyn MetricStore>> {
    match config {
        StorageConfig::None { .. } => {
            info!("using in-memory storage, data will not survive a restart");
            Ok(Arc::new(memory::MemoryStore::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path, .. } => Ok(Arc::new(sqlite::SqliteStore::new(path).await?)),
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::InvalidConfig(
            "SQLite storage requires the 'storage-sqlite' feature".to_string(),
        )),
    }
}
