//! Shared helpers for hub tests.

#![allow(dead_code)]

use async_trait::async_trait;
use memhub::{CollectiveMemoryHub, HubConfig, KnowledgeDraft, MemoryStore, Payload};
use memhub_storage::{EntryFilter, KnowledgeStore, StorageError, StorageResult};
use memhub_types::{InstanceId, KnowledgeEntry};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test log subscriber once per binary. Set `RUST_LOG` to see
/// output.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(false)
            .compact()
            .with_test_writer()
            .try_init();
    });
}

/// A hub for `instance` over a fresh memory store. The store is returned
/// too so another hub can pull from it.
pub fn memory_hub(instance: &str) -> (CollectiveMemoryHub, Arc<MemoryStore>) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let hub = CollectiveMemoryHub::new(HubConfig::for_instance(instance), store.clone());
    (hub, store)
}

pub fn draft(category: &str, key: &str, value: &str) -> KnowledgeDraft {
    KnowledgeDraft::new(category, key, Payload::raw(value))
}

/// A store whose every insert loses to a phantom writer.
#[derive(Default)]
pub struct AlwaysTaken {
    inner: MemoryStore,
}

#[async_trait]
impl KnowledgeStore for AlwaysTaken {
    async fn get_latest(&self, category: &str, key: &str) -> StorageResult<Option<KnowledgeEntry>> {
        self.inner.get_latest(category, key).await
    }

    async fn get_version(
        &self,
        category: &str,
        key: &str,
        version: u64,
    ) -> StorageResult<Option<KnowledgeEntry>> {
        self.inner.get_version(category, key, version).await
    }

    async fn list_by_category(
        &self,
        category: &str,
        filter: &EntryFilter,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        self.inner.list_by_category(category, filter).await
    }

    async fn list_versions(
        &self,
        category: &str,
        key: &str,
        limit: usize,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        self.inner.list_versions(category, key, limit).await
    }

    async fn list_by_instance_up_to(
        &self,
        instance: &InstanceId,
        categories: Option<&[String]>,
        max_version: u64,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        self.inner
            .list_by_instance_up_to(instance, categories, max_version)
            .await
    }

    async fn list_by_instance_since(
        &self,
        instance: &InstanceId,
        categories: &[String],
        since: Option<u64>,
    ) -> StorageResult<Vec<KnowledgeEntry>> {
        self.inner
            .list_by_instance_since(instance, categories, since)
            .await
    }

    async fn insert(&self, entry: &KnowledgeEntry) -> StorageResult<()> {
        Err(StorageError::Duplicate {
            category: entry.category.clone(),
            key: entry.key.clone(),
            version: entry.version,
        })
    }

    async fn upsert(&self, entry: &KnowledgeEntry) -> StorageResult<()> {
        self.inner.upsert(entry).await
    }
}
