//! In-process store backed by ordered maps.
//!
//! Used for tests and for instances that keep their memory ephemeral. The
//! `unavailable` switch simulates an unreachable backend so callers can
//! exercise their failure paths.

use crate::error::{StorageError, StorageResult};
use crate::store::{EntryFilter, KnowledgeStore, category_allowed};
use async_trait::async_trait;
use memhub_types::{InstanceId, KnowledgeEntry};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

type KeyId = (String, String);

/// In-memory [`KnowledgeStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<KeyId, BTreeMap<u64, KnowledgeEntry>>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StorageError::Unavailable`
    /// (or succeed again when `false`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Total number of rows across all keys.
    pub async fn len(&self) -> usize {
        self.rows.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("memory store switched off".into()))
        } else {
            Ok(())
        }
    }

    async fn collect_by_instance<F>(&self, instance: &InstanceId, keep: F) -> Vec<KnowledgeEntry>
    where
        F: Fn(&KnowledgeEntry) -> bool,
    {
        let rows = self.rows.read().await;
        let mut out: Vec<KnowledgeEntry> = rows
            .values()
            .flat_map(BTreeMap::values)
            .filter(|e| &e.source_instance_id == instance && keep(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then_with(|| a.category.cmp(&b.category))
                .then_with(|| a.key.cmp(&b.key))
        });
        out
    }
}

fn key_id(category: &str, key: &str) -> KeyId {
    (category.to_string(), key.to_string())
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn get_latest(
        &self,
        category: &str,
        key: &str,
    ) -> StorageResult<Option<KnowledgeEntry>> {
        self.check()?;
        let rows = self.rows.read().await;
        Ok(rows
            .get(&key_id(category, key))
            .and_then(|versions| versions.values().next_back())
            .cloned())
    }

    async fn get_version(
        &self,
        category: &str,
        key: &str,
        version: u64,
    ) -> StorageResult<Option<KnowledgeEntry>> {
        self.check()?;
        let rows = self.rows.read().await;
        Ok(rows
            .get(&key_id(category, key))
            .and_then(|versions| versions.get(&version))
            .cloned())
    }

    async fn list_by_category(
        &self,
        category: &str,
        filter: &EntryFilter,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        self.check()?;
        let rows = self.rows.read().await;
        let mut out: Vec<KnowledgeEntry> = rows
            .iter()
            .filter(|((c, _), _)| c == category)
            .flat_map(|(_, versions)| versions.values())
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.version.cmp(&a.version).then_with(|| a.key.cmp(&b.key)));
        out.truncate(filter.limit);
        Ok(out)
    }

    async fn list_versions(
        &self,
        category: &str,
        key: &str,
        limit: usize,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        self.check()?;
        let rows = self.rows.read().await;
        Ok(rows
            .get(&key_id(category, key))
            .map(|versions| versions.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_by_instance_up_to(
        &self,
        instance: &InstanceId,
        categories: Option<&[String]>,
        max_version: u64,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        self.check()?;
        Ok(self
            .collect_by_instance(instance, |e| {
                e.version <= max_version && category_allowed(categories, &e.category)
            })
            .await)
    }

    async fn list_by_instance_since(
        &self,
        instance: &InstanceId,
        categories: &[String],
        since: Option<u64>,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        self.check()?;
        Ok(self
            .collect_by_instance(instance, |e| {
                since.is_none_or(|s| e.version > s)
                    && category_allowed(Some(categories), &e.category)
            })
            .await)
    }

    async fn insert(&self, entry: &KnowledgeEntry) -> StorageResult<()> {
        self.check()?;
        let mut rows = self.rows.write().await;
        let versions = rows.entry(key_id(&entry.category, &entry.key)).or_default();
        if versions.contains_key(&entry.version) {
            return Err(StorageError::Duplicate {
                category: entry.category.clone(),
                key: entry.key.clone(),
                version: entry.version,
            });
        }
        versions.insert(entry.version, entry.clone());
        Ok(())
    }

    async fn upsert(&self, entry: &KnowledgeEntry) -> StorageResult<()> {
        self.check()?;
        self.rows
            .write()
            .await
            .entry(key_id(&entry.category, &entry.key))
            .or_default()
            .insert(entry.version, entry.clone());
        Ok(())
    }
}
