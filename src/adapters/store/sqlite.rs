//! SQLite-backed sample log.
//!
//! One `metrics` table indexed on `timestamp`. The structured maps live
//! in JSON text columns so the auxiliary key set can grow without schema
//! changes; columns added after the first release are back-filled by an
//! idempotent migration.

use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use crate::domain::Sample;
use crate::ports::{MetricStore, StoreError};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS metrics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp REAL NOT NULL,
        cpu_percent REAL NOT NULL,
        ram_percent REAL NOT NULL,
        ram_used_gb REAL NOT NULL,
        ram_total_gb REAL NOT NULL,
        disk_percent REAL NOT NULL,
        disk_used_gb REAL NOT NULL,
        disk_total_gb REAL NOT NULL,
        net_sent_bytes REAL NOT NULL,
        net_recv_bytes REAL NOT NULL,
        net_sent_rate REAL NOT NULL DEFAULT 0.0,
        net_recv_rate REAL NOT NULL DEFAULT 0.0,
        conn_json TEXT DEFAULT '{}',
        extra_json TEXT DEFAULT '{}'
    )
"#;

const CREATE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON metrics(timestamp)";

/// Columns that older databases may lack, with the DDL that adds them
const ADDITIVE_COLUMNS: &[(&str, &str)] = &[
    ("net_sent_rate", "ALTER TABLE metrics ADD COLUMN net_sent_rate REAL NOT NULL DEFAULT 0.0"),
    ("net_recv_rate", "ALTER TABLE metrics ADD COLUMN net_recv_rate REAL NOT NULL DEFAULT 0.0"),
    ("conn_json", "ALTER TABLE metrics ADD COLUMN conn_json TEXT DEFAULT '{}'"),
    ("extra_json", "ALTER TABLE metrics ADD COLUMN extra_json TEXT DEFAULT '{}'"),
];

const INSERT: &str = r#"
    INSERT INTO metrics
        (timestamp, cpu_percent, ram_percent, ram_used_gb, ram_total_gb,
         disk_percent, disk_used_gb, disk_total_gb,
         net_sent_bytes, net_recv_bytes, net_sent_rate, net_recv_rate, conn_json, extra_json)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const DELETE_BEFORE: &str = "DELETE FROM metrics WHERE timestamp < ?";

const COLUMNS: &str = "timestamp, cpu_percent, ram_percent, ram_used_gb, ram_total_gb, \
                       disk_percent, disk_used_gb, disk_total_gb, net_sent_bytes, net_recv_bytes, \
                       net_sent_rate, net_recv_rate, conn_json, extra_json";

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn migration_err(e: sqlx::Error) -> StoreError {
    StoreError::Migration(e.to_string())
}

/// Missing or empty payloads read as empty maps; malformed ones are logged
/// and dropped rather than failing the whole query.
fn decode_payload<T: DeserializeOwned + Default>(raw: Option<String>) -> T {
    match raw.as_deref() {
        None | Some("") => T::default(),
        Some(text) => serde_json::from_str(text).unwrap_or_else(|e| {
            warn!("Ignoring malformed payload column: {}", e);
            T::default()
        }),
    }
}

fn sample_from_row(row: &SqliteRow) -> Result<Sample, sqlx::Error> {
    Ok(Sample {
        timestamp: row.try_get("timestamp")?,
        cpu_percent: row.try_get("cpu_percent")?,
        ram_percent: row.try_get("ram_percent")?,
        ram_used_gb: row.try_get("ram_used_gb")?,
        ram_total_gb: row.try_get("ram_total_gb")?,
        disk_percent: row.try_get("disk_percent")?,
        disk_used_gb: row.try_get("disk_used_gb")?,
        disk_total_gb: row.try_get("disk_total_gb")?,
        net_sent_bytes: row.try_get::<f64, _>("net_sent_bytes")? as u64,
        net_recv_bytes: row.try_get::<f64, _>("net_recv_bytes")? as u64,
        net_sent_rate: row.try_get("net_sent_rate")?,
        net_recv_rate: row.try_get("net_recv_rate")?,
        connections: decode_payload(row.try_get("conn_json")?),
        extra: decode_payload(row.try_get("extra_json")?),
    })
}

fn insert_query(
    sample: &Sample,
) -> Result<Query<'static, Sqlite, SqliteArguments<'static>>, StoreError> {
    Ok(sqlx::query(INSERT)
        .bind(sample.timestamp)
        .bind(sample.cpu_percent)
        .bind(sample.ram_percent)
        .bind(sample.ram_used_gb)
        .bind(sample.ram_total_gb)
        .bind(sample.disk_percent)
        .bind(sample.disk_used_gb)
        .bind(sample.disk_total_gb)
        .bind(sample.net_sent_bytes as f64)
        .bind(sample.net_recv_bytes as f64)
        .bind(sample.net_sent_rate)
        .bind(sample.net_recv_rate)
        .bind(serde_json::to_string(&sample.connections)?)
        .bind(serde_json::to_string(&sample.extra)?))
}

/// Sample log persisted in a local SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`.
    ///
    /// WAL journaling lets queries read while the sampler writes.
    #[instrument(skip(db_path))]
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        info!("Opening metrics database at {:?}", db_path);

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Database(format!("Failed to create directory {}: {}", parent.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    #[instrument(skip(self))]
    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(migration_err)?;
        sqlx::query(CREATE_INDEX)
            .execute(&self.pool)
            .await
            .map_err(migration_err)?;

        let existing: Vec<String> = sqlx::query("PRAGMA table_info(metrics)")
            .fetch_all(&self.pool)
            .await
            .map_err(migration_err)?
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<_, _>>()
            .map_err(migration_err)?;

        for (column, ddl) in ADDITIVE_COLUMNS {
            if !existing.iter().any(|name| name == column) {
                info!("Adding column {} to metrics table", column);
                sqlx::query(ddl)
                    .execute(&self.pool)
                    .await
                    .map_err(migration_err)?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MetricStore for SqliteStore {
    async fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        insert_query(sample)?
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn evict_before(&self, cutoff: f64) -> Result<u64, StoreError> {
        let result = sqlx::query(DELETE_BEFORE)
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected())
    }

    async fn query_range(&self, from: f64) -> Result<Vec<Sample>, StoreError> {
        let sql = format!(
            "SELECT {} FROM metrics WHERE timestamp >= ? ORDER BY timestamp ASC, id ASC",
            COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(from)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(sample_from_row)
            .collect::<Result<_, _>>()
            .map_err(db_err)
    }

    async fn latest(&self) -> Result<Option<Sample>, StoreError> {
        let sql = format!(
            "SELECT {} FROM metrics ORDER BY timestamp DESC, id DESC LIMIT 1",
            COLUMNS
        );
        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(sample_from_row).transpose().map_err(db_err)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM metrics")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(count as usize)
    }

    /// Insert and retention delete commit together, so readers see either
    /// neither or both.
    async fn append_and_evict(&self, sample: &Sample, cutoff: f64) -> Result<u64, StoreError> {
        let insert = insert_query(sample)?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        insert.execute(&mut *tx).await.map_err(db_err)?;
        let evicted = sqlx::query(DELETE_BEFORE)
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        tx.commit().await.map_err(db_err)?;

        if evicted > 0 {
            debug!(evicted, "Evicted samples past retention");
        }
        Ok(evicted)
    }
}
