//! Shared test helpers for sync tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use memhub_storage::{KeyLocks, KnowledgeStore, MemoryStore};
use memhub_sync::{AuditError, AuditSink, SyncRunRecord};
use memhub_types::{InstanceId, KnowledgeDraft, KnowledgeEntry, Payload};
use std::sync::{Arc, Mutex};

/// A fixed instant so recency comparisons are deterministic.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Builds an entry authored by `author` with explicit confidence and
/// `updated_at = base_time() + offset_secs`.
pub fn entry_at(
    category: &str,
    key: &str,
    version: u64,
    author: &str,
    value: &str,
    confidence: f64,
    offset_secs: i64,
) -> KnowledgeEntry {
    let draft = KnowledgeDraft::new(category, key, Payload::raw(value)).with_confidence(confidence);
    let mut entry = KnowledgeEntry::from_draft(draft, version, InstanceId::new(author), base_time());
    entry.updated_at = base_time() + Duration::seconds(offset_secs);
    entry
}

/// Builds an entry with full confidence at `base_time()`.
pub fn entry(category: &str, key: &str, version: u64, author: &str, value: &str) -> KnowledgeEntry {
    entry_at(category, key, version, author, value, 1.0, 0)
}

/// A local store, a remote store, and shared locks.
pub struct Stores {
    pub local: Arc<MemoryStore>,
    pub remote: Arc<MemoryStore>,
    pub locks: Arc<KeyLocks>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            local: Arc::new(MemoryStore::new()),
            remote: Arc::new(MemoryStore::new()),
            locks: Arc::new(KeyLocks::new()),
        }
    }

    pub fn local_dyn(&self) -> Arc<dyn KnowledgeStore> {
        self.local.clone()
    }

    pub fn remote_dyn(&self) -> Arc<dyn KnowledgeStore> {
        self.remote.clone()
    }
}

/// An audit sink that remembers every record, or fails every call.
#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<SyncRunRecord>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<SyncRunRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn record_sync_run(&self, record: &SyncRunRecord) -> Result<(), AuditError> {
        if self.fail {
            return Err(AuditError::Unavailable("sink offline".into()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
