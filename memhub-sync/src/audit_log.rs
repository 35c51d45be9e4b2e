//! Persistent sync-run audit trail backed by SQLite.
//!
//! Uses its own database file so audit history is isolated from the
//! knowledge store.

use crate::audit::{AuditError, AuditSink, SyncRunRecord, SyncRunStatus};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use memhub_types::InstanceId;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// SQLite-backed [`AuditSink`].
pub struct SqliteAuditLog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAuditLog {
    /// Opens (or creates) an audit log at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| AuditError::Storage(format!("failed to open audit log: {e}")))?;
        Self::init(conn)
    }

    /// Opens an in-memory audit log (for testing).
    pub fn open_in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AuditError::Storage(format!("failed to open in-memory audit log: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sync_runs (
                id TEXT PRIMARY KEY,
                source_instance_id TEXT NOT NULL,
                target_instance_id TEXT NOT NULL,
                categories TEXT NOT NULL,
                status TEXT NOT NULL,
                synced_count INTEGER NOT NULL,
                updated_count INTEGER NOT NULL,
                conflict_count INTEGER NOT NULL,
                error TEXT,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| AuditError::Storage(format!("failed to init audit schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Unavailable("audit connection poisoned".into()))
    }

    /// Saves a run record.
    pub fn save_run(&self, record: &SyncRunRecord) -> Result<(), AuditError> {
        let categories = serde_json::to_string(&record.categories)
            .map_err(|e| AuditError::Storage(format!("failed to encode categories: {e}")))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sync_runs (id, source_instance_id, target_instance_id, categories, status, \
             synced_count, updated_count, conflict_count, error, started_at, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id.to_string(),
                record.source_instance_id.as_str(),
                record.target_instance_id.as_str(),
                categories,
                record.status.to_string(),
                record.synced_count as i64,
                record.updated_count as i64,
                record.conflict_count as i64,
                record.error,
                format_time(&record.started_at),
                format_time(&record.completed_at),
            ],
        )
        .map_err(|e| AuditError::Storage(format!("failed to save sync run: {e}")))?;
        Ok(())
    }

    /// Loads the most recent runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<SyncRunRecord>, AuditError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, source_instance_id, target_instance_id, categories, status, \
                 synced_count, updated_count, conflict_count, error, started_at, completed_at \
                 FROM sync_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
            )
            .map_err(|e| AuditError::Storage(format!("failed to prepare run query: {e}")))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                ))
            })
            .map_err(|e| AuditError::Storage(format!("failed to query sync runs: {e}")))?;

        let mut result = Vec::new();
        for row in rows {
            let (id, source, target, categories, status, synced, updated, conflicts, error, started, completed) =
                row.map_err(|e| AuditError::Storage(format!("failed to read sync run: {e}")))?;

            result.push(SyncRunRecord {
                id: Uuid::parse_str(&id)
                    .map_err(|e| AuditError::Storage(format!("invalid run id: {e}")))?,
                source_instance_id: InstanceId::new(source),
                target_instance_id: InstanceId::new(target),
                categories: serde_json::from_str(&categories)
                    .map_err(|e| AuditError::Storage(format!("invalid categories: {e}")))?,
                status: status.parse()?,
                synced_count: synced.max(0) as usize,
                updated_count: updated.max(0) as usize,
                conflict_count: conflicts.max(0) as usize,
                error,
                started_at: parse_time(&started)?,
                completed_at: parse_time(&completed)?,
            });
        }
        Ok(result)
    }

    /// Returns the total number of recorded runs.
    pub fn run_count(&self) -> Result<usize, AuditError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sync_runs", [], |row| row.get(0))
            .map_err(|e| AuditError::Storage(format!("failed to count sync runs: {e}")))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn record_sync_run(&self, record: &SyncRunRecord) -> Result<(), AuditError> {
        let log = Self {
            conn: Arc::clone(&self.conn),
        };
        let record = record.clone();
        tokio::task::spawn_blocking(move || log.save_run(&record))
            .await
            .map_err(|e| AuditError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, AuditError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AuditError::Storage(format!("invalid timestamp {s:?}: {e}")))
}
