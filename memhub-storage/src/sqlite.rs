//! SQLite-backed store.
//!
//! One table holds every version of every key. The primary key on
//! `(category, key, version)` is what makes version numbers unique across
//! every process sharing the database file; in-process callers additionally
//! serialize per key through [`KeyLocks`](crate::KeyLocks).
//!
//! rusqlite is blocking, so each call runs on `spawn_blocking` against a
//! mutex-guarded connection.

use crate::error::{StorageError, StorageResult};
use crate::store::{EntryFilter, KnowledgeStore, category_allowed};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use memhub_types::{ContentHash, InstanceId, KnowledgeEntry, Metadata, Payload, Tags};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS knowledge_entries (
        category TEXT NOT NULL,
        key TEXT NOT NULL,
        version INTEGER NOT NULL,
        value TEXT NOT NULL,
        hash TEXT NOT NULL,
        source_instance_id TEXT NOT NULL,
        confidence REAL NOT NULL,
        tags TEXT NOT NULL,
        metadata TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (category, key, version)
    );

    CREATE INDEX IF NOT EXISTS idx_knowledge_instance
        ON knowledge_entries (source_instance_id, version);
";

const COLUMNS: &str = "category, key, version, value, hash, source_instance_id, \
                       confidence, tags, metadata, created_at, updated_at";

/// Persistent [`KnowledgeStore`] backed by SQLite.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn)
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StorageError::Unavailable("sqlite connection poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

/// Raw column values, converted to an entry outside the rusqlite callback so
/// decode failures surface as `StorageError` rather than `rusqlite::Error`.
struct RawRow {
    category: String,
    key: String,
    version: i64,
    value: String,
    hash: String,
    source_instance_id: String,
    confidence: f64,
    tags: String,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            category: row.get(0)?,
            key: row.get(1)?,
            version: row.get(2)?,
            value: row.get(3)?,
            hash: row.get(4)?,
            source_instance_id: row.get(5)?,
            confidence: row.get(6)?,
            tags: row.get(7)?,
            metadata: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_entry(self) -> StorageResult<KnowledgeEntry> {
        let version = u64::try_from(self.version)
            .map_err(|_| StorageError::InvalidData(format!("negative version {}", self.version)))?;
        let hash = ContentHash::from_hex(&self.hash)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        let tags: Tags = serde_json::from_str(&self.tags)?;
        let metadata: Metadata = serde_json::from_str(&self.metadata)?;
        Ok(KnowledgeEntry {
            category: self.category,
            key: self.key,
            value: Payload::raw(self.value),
            version,
            hash,
            source_instance_id: InstanceId::new(self.source_instance_id),
            confidence: self.confidence,
            tags,
            metadata,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

fn parse_time(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("bad timestamp {s:?}: {e}")))
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn to_sql_version(version: u64) -> StorageResult<i64> {
    i64::try_from(version)
        .map_err(|_| StorageError::InvalidData(format!("version {version} out of range")))
}

fn collect(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> StorageResult<Vec<KnowledgeEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let raw = stmt
        .query_map(params, RawRow::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.into_iter().map(RawRow::into_entry).collect()
}

fn write_row(conn: &Connection, verb: &str, entry: &KnowledgeEntry) -> StorageResult<()> {
    let sql = format!(
        "{verb} INTO knowledge_entries ({COLUMNS}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
    );
    conn.execute(
        &sql,
        params![
            entry.category,
            entry.key,
            to_sql_version(entry.version)?,
            entry.value.as_str(),
            entry.hash.as_str(),
            entry.source_instance_id.as_str(),
            entry.confidence,
            serde_json::to_string(&entry.tags)?,
            serde_json::to_string(&entry.metadata)?,
            format_time(&entry.created_at),
            format_time(&entry.updated_at),
        ],
    )?;
    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn get_latest(
        &self,
        category: &str,
        key: &str,
    ) -> StorageResult<Option<KnowledgeEntry>> {
        let (category, key) = (category.to_string(), key.to_string());
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM knowledge_entries \
                 WHERE category = ?1 AND key = ?2 ORDER BY version DESC LIMIT 1"
            );
            conn.query_row(&sql, params![category, key], RawRow::read)
                .optional()?
                .map(RawRow::into_entry)
                .transpose()
        })
        .await
    }

    async fn get_version(
        &self,
        category: &str,
        key: &str,
        version: u64,
    ) -> StorageResult<Option<KnowledgeEntry>> {
        let (category, key) = (category.to_string(), key.to_string());
        let version = to_sql_version(version)?;
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM knowledge_entries \
                 WHERE category = ?1 AND key = ?2 AND version = ?3"
            );
            conn.query_row(&sql, params![category, key, version], RawRow::read)
                .optional()?
                .map(RawRow::into_entry)
                .transpose()
        })
        .await
    }

    async fn list_by_category(
        &self,
        category: &str,
        filter: &EntryFilter,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        let category = category.to_string();
        let filter = filter.clone();
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let base = format!(
                "SELECT {COLUMNS} FROM knowledge_entries \
                 WHERE category = ?1 AND (?2 IS NULL OR confidence >= ?2) \
                 ORDER BY version DESC, key ASC"
            );
            if filter.tags.is_empty() {
                let sql = format!("{base} LIMIT ?3");
                return collect(conn, &sql, params![category, filter.min_confidence, limit]);
            }

            // Tag sets are stored as JSON, so the superset check runs here.
            let mut out: Vec<KnowledgeEntry> =
                collect(conn, &base, params![category, filter.min_confidence])?
                    .into_iter()
                    .filter(|e| filter.matches(e))
                    .collect();
            out.truncate(filter.limit);
            Ok(out)
        })
        .await
    }

    async fn list_versions(
        &self,
        category: &str,
        key: &str,
        limit: usize,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        let (category, key) = (category.to_string(), key.to_string());
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM knowledge_entries \
                 WHERE category = ?1 AND key = ?2 ORDER BY version DESC LIMIT ?3"
            );
            collect(conn, &sql, params![category, key, limit])
        })
        .await
    }

    async fn list_by_instance_up_to(
        &self,
        instance: &InstanceId,
        categories: Option<&[String]>,
        max_version: u64,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        let instance = instance.as_str().to_string();
        let categories = categories.map(<[String]>::to_vec);
        let max_version = i64::try_from(max_version).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM knowledge_entries \
                 WHERE source_instance_id = ?1 AND version <= ?2 \
                 ORDER BY version ASC, category ASC, key ASC"
            );
            let rows = collect(conn, &sql, params![instance, max_version])?;
            Ok(rows
                .into_iter()
                .filter(|e| category_allowed(categories.as_deref(), &e.category))
                .collect())
        })
        .await
    }

    async fn list_by_instance_since(
        &self,
        instance: &InstanceId,
        categories: &[String],
        since: Option<u64>,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        let instance = instance.as_str().to_string();
        let categories = categories.to_vec();
        let since = since.map(to_sql_version).transpose()?;
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM knowledge_entries \
                 WHERE source_instance_id = ?1 AND (?2 IS NULL OR version > ?2) \
                 ORDER BY version ASC, category ASC, key ASC"
            );
            let rows = collect(conn, &sql, params![instance, since])?;
            Ok(rows
                .into_iter()
                .filter(|e| category_allowed(Some(&categories), &e.category))
                .collect())
        })
        .await
    }

    async fn insert(&self, entry: &KnowledgeEntry) -> StorageResult<()> {
        let entry = entry.clone();
        self.with_conn(move |conn| match write_row(conn, "INSERT", &entry) {
            Err(StorageError::Database(e)) if is_constraint_violation(&e) => {
                debug!(
                    "Version {} of {}/{} already stored",
                    entry.version, entry.category, entry.key
                );
                Err(StorageError::Duplicate {
                    category: entry.category,
                    key: entry.key,
                    version: entry.version,
                })
            }
            other => other,
        })
        .await
    }

    async fn upsert(&self, entry: &KnowledgeEntry) -> StorageResult<()> {
        let entry = entry.clone();
        self.with_conn(move |conn| write_row(conn, "INSERT OR REPLACE", &entry))
            .await
    }
}
