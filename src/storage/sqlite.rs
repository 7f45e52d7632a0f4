//! SQLite metric store
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers proceed while a write is in progress
//! - **Connection pooling**: Readers share the pool without extra locking
//! - **Single writer**: `store` and `cleanup` take one async mutex, so writes
//!   are applied one at a time and ids come out in commit order
//! - **Migrations**: Schema versioning with sqlx

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::backend::{
    HealthStatus, MetricStore, RECENT_ROW_LIMIT, retention_cutoff, window_start,
};
use super::error::{StorageError, StorageResult};
use super::schema::{MetricsSummary, StoredMetricRow};
use crate::IngestPayload;

const ROW_COLUMNS: &str = "id, timestamp, hostname, cpu_percent, memory_percent, memory_total, \
     memory_used, swap_percent, disk_data, network_data, raw_data, ingested_at";

pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
    write_lock: Mutex<()>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
            write_lock: Mutex::new(()),
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            StorageError::SerializationError(format!("ingested_at {millis} is out of range"))
        })
    }

    /// SQLite integers are signed; byte counts above `i64::MAX` are rejected
    fn to_column(field: &str, value: u64) -> StorageResult<i64> {
        i64::try_from(value).map_err(|_| {
            StorageError::SerializationError(format!("{field} {value} does not fit in a column"))
        })
    }

    fn from_column(column: &str, value: i64) -> StorageResult<u64> {
        u64::try_from(value)
            .map_err(|_| StorageError::SerializationError(format!("{column} is negative: {value}")))
    }

    fn decode_row(row: &SqliteRow) -> StorageResult<StoredMetricRow> {
        let disk_data: String = row.try_get("disk_data")?;
        let network_data: Option<String> = row.try_get("network_data")?;
        let raw_data: String = row.try_get("raw_data")?;

        Ok(StoredMetricRow {
            id: row.try_get("id")?,
            timestamp: row.try_get("timestamp")?,
            hostname: row.try_get("hostname")?,
            cpu_percent: row.try_get("cpu_percent")?,
            memory_percent: row.try_get("memory_percent")?,
            memory_total: Self::from_column("memory_total", row.try_get("memory_total")?)?,
            memory_used: Self::from_column("memory_used", row.try_get("memory_used")?)?,
            swap_percent: row.try_get("swap_percent")?,
            disk_data: serde_json::from_str(&disk_data)?,
            network_data: network_data
                .map(|json| serde_json::from_str(&json))
                .transpose()?,
            raw_data: serde_json::from_str(&raw_data)?,
            ingested_at: Self::millis_to_timestamp(row.try_get("ingested_at")?)?,
        })
    }

    /// Insert with an explicit ingestion time
    #[instrument(skip(self, payload), fields(host = %payload.hostname))]
    pub async fn store_at(
        &self,
        payload: &IngestPayload,
        ingested_at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        let metrics = &payload.metrics;
        let disk_data = serde_json::to_string(&metrics.disk)?;
        let network_data = metrics
            .network
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let raw_data = serde_json::to_string(payload)?;
        let memory_total = Self::to_column("memory.total", metrics.memory.total)?;
        let memory_used = Self::to_column("memory.used", metrics.memory.used)?;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO metrics (
                timestamp, hostname, cpu_percent, memory_percent, memory_total,
                memory_used, swap_percent, disk_data, network_data, raw_data, ingested_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&metrics.timestamp)
        .bind(&payload.hostname)
        .bind(metrics.cpu.percent)
        .bind(metrics.memory.percent)
        .bind(memory_total)
        .bind(memory_used)
        .bind(metrics.swap.percent)
        .bind(disk_data)
        .bind(network_data)
        .bind(raw_data)
        .bind(Self::timestamp_to_millis(&ingested_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let id = result.last_insert_rowid();
        debug!("stored metrics row {id}");
        Ok(id)
    }
}

#[async_trait]
impl MetricStore for SqliteStore {
    async fn store(&self, payload: &IngestPayload) -> StorageResult<i64> {
        self.store_at(payload, Utc::now()).await
    }

    #[instrument(skip(self))]
    async fn recent(
        &self,
        hostname: Option<&str>,
        hours: u32,
    ) -> StorageResult<Vec<StoredMetricRow>> {
        let since = Self::timestamp_to_millis(&window_start(Utc::now(), hours));

        let sql = format!(
            r#"
            SELECT {ROW_COLUMNS}
            FROM metrics
            WHERE ingested_at > ? AND (? IS NULL OR hostname = ?)
            ORDER BY ingested_at DESC, id DESC
            LIMIT ?
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(since)
            .bind(hostname)
            .bind(hostname)
            .bind(RECENT_ROW_LIMIT as i64)
            .fetch_all(&self.pool)
            .await?;

        let results = rows
            .iter()
            .map(Self::decode_row)
            .collect::<StorageResult<Vec<_>>>()?;

        debug!("query returned {} rows", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn summary(&self, hostname: Option<&str>, hours: u32) -> StorageResult<MetricsSummary> {
        let since = Self::timestamp_to_millis(&window_start(Utc::now(), hours));

        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total_records,
                   AVG(cpu_percent) AS avg_cpu, MAX(cpu_percent) AS max_cpu,
                   AVG(memory_percent) AS avg_memory, MAX(memory_percent) AS max_memory,
                   AVG(swap_percent) AS avg_swap, MAX(swap_percent) AS max_swap
            FROM metrics
            WHERE ingested_at > ? AND (? IS NULL OR hostname = ?)
            "#,
        )
        .bind(since)
        .bind(hostname)
        .bind(hostname)
        .fetch_one(&self.pool)
        .await?;

        Ok(MetricsSummary {
            total_records: row.try_get("total_records")?,
            avg_cpu: row.try_get("avg_cpu")?,
            max_cpu: row.try_get("max_cpu")?,
            avg_memory: row.try_get("avg_memory")?,
            max_memory: row.try_get("max_memory")?,
            avg_swap: row.try_get("avg_swap")?,
            max_swap: row.try_get("max_swap")?,
        })
    }

    #[instrument(skip(self))]
    async fn cleanup(&self, days_to_keep: u32) -> StorageResult<usize> {
        let cutoff = retention_cutoff(Utc::now(), days_to_keep);

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM metrics WHERE ingested_at <= ?")
            .bind(Self::timestamp_to_millis(&cutoff))
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() as usize;
        info!("cleaned up {} records older than {} days", deleted, days_to_keep);

        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let (total_rows, oldest, newest): (i64, Option<i64>, Option<i64>) =
            sqlx::query_as("SELECT COUNT(*), MIN(ingested_at), MAX(ingested_at) FROM metrics")
                .fetch_one(&self.pool)
                .await?;

        let hosts: (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT hostname) FROM metrics")
            .fetch_one(&self.pool)
            .await?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let file_size_mb = file_size as f64 / 1_000_000.0;

        let time_range = match (oldest, newest) {
            (Some(old), Some(new)) => format!(
                "{} to {}",
                Self::millis_to_timestamp(old)?.format("%Y-%m-%d"),
                Self::millis_to_timestamp(new)?.format("%Y-%m-%d")
            ),
            _ => "no data".to_string(),
        };

        Ok(format!(
            "SQLite: {} rows from {} hosts, {:.2} MB on disk, time range: {}",
            total_rows, hosts.0, file_size_mb, time_range
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite store");
        self.pool.close().await;
        Ok(())
    }
}
