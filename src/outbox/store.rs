//! # Outbox Store
//!
//! SQLite-backed implementation of the outbox queue.
//!
//! Every operation opens its own connection and drops it before returning,
//! so a failed drain never leaves a connection behind. Writes run with
//! `synchronous = FULL`, which makes `enqueue` durable once it returns.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::record::OutboxRecord;
use crate::config::{invalid, is_sql_identifier, DatabaseConfig};
use crate::error::Result;

/// Queue operations used by the ingestion path and the uploader
#[cfg_attr(test, mockall::automock)]
pub trait Outbox: Send + Sync {
    /// Append a reading; returns its id once it is durable
    fn enqueue(&self, origin_device: &str, payload: &Value) -> Result<u64>;

    /// Snapshot of unprocessed records, ascending by id
    fn pending(&self) -> Result<Vec<OutboxRecord>>;

    /// Flag a record as delivered. Unknown ids are logged, not failed.
    fn mark_processed(&self, id: u64) -> Result<()>;

    /// Number of records still waiting for upload
    fn unprocessed_count(&self) -> Result<u64>;
}

/// Outbox persisted in a local SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteOutbox {
    path: PathBuf,
    table: String,
    busy_timeout: Duration,
}

/// Raw row before the payload is parsed
struct StoredRow {
    id: i64,
    origin_device: String,
    payload: String,
    processed: bool,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            origin_device: row.get(1)?,
            payload: row.get(2)?,
            processed: row.get(3)?,
        })
    }

    fn into_record(self) -> Result<OutboxRecord> {
        Ok(OutboxRecord {
            id: self.id as u64,
            origin_device: self.origin_device,
            payload: serde_json::from_str(&self.payload)?,
            processed: self.processed,
        })
    }
}

impl SqliteOutbox {
    /// Open (and create if needed) the outbox table in `path`
    ///
    /// # Errors
    ///
    /// Returns error if the table name is not a plain identifier or the
    /// database cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P, table: &str, busy_timeout: Duration) -> Result<Self> {
        if !is_sql_identifier(table) {
            return Err(invalid(format!("invalid outbox table name '{}'", table)));
        }

        let store = Self {
            path: path.as_ref().to_path_buf(),
            table: table.to_string(),
            busy_timeout,
        };

        let conn = store.connect()?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Outbox journal mode: {}", mode);

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                origin_device TEXT NOT NULL,
                payload TEXT NOT NULL,
                processed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {t}_pending ON {t} (processed, id);",
            t = store.table
        ))?;

        Ok(store)
    }

    /// Open the outbox described by the `[database]` section
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::open(
            &config.path,
            &config.table,
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a single record regardless of its processed flag
    pub fn record(&self, id: u64) -> Result<Option<OutboxRecord>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT id, origin_device, payload, processed FROM {} WHERE id = ?1",
                    self.table
                ),
                params![id as i64],
                StoredRow::from_row,
            )
            .optional()?;
        row.map(StoredRow::into_record).transpose()
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        Ok(conn)
    }
}

impl Outbox for SqliteOutbox {
    fn enqueue(&self, origin_device: &str, payload: &Value) -> Result<u64> {
        let body = serde_json::to_string(payload)?;
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (origin_device, payload, processed, created_at) \
                 VALUES (?1, ?2, 0, ?3)",
                self.table
            ),
            params![origin_device, body, Utc::now().to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid() as u64;
        debug!(record_id = id, device = origin_device, "Queued reading");
        Ok(id)
    }

    fn pending(&self) -> Result<Vec<OutboxRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, origin_device, payload, processed FROM {} \
             WHERE processed = 0 ORDER BY id ASC",
            self.table
        ))?;
        let rows = stmt
            .query_map([], StoredRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.into_record() {
                Ok(record) => records.push(record),
                // Left unprocessed so an operator can inspect it
                Err(e) => error!(record_id = id, "Unreadable outbox payload: {}", e),
            }
        }
        Ok(records)
    }

    fn mark_processed(&self, id: u64) -> Result<()> {
        let conn = self.connect()?;
        let changed = conn.execute(
            &format!("UPDATE {} SET processed = 1 WHERE id = ?1", self.table),
            params![id as i64],
        )?;
        if changed == 0 {
            warn!(record_id = id, "Cannot mark unknown outbox record as processed");
        }
        Ok(())
    }

    fn unprocessed_count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE processed = 0", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
