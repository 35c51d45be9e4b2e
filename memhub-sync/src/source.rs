//! Where remote knowledge comes from.
//!
//! The sync engine only needs "give me what this instance authored". In a
//! single-database deployment that is a filtered query on a store; across
//! processes it would be a network call. Both satisfy [`KnowledgeSource`].

use crate::error::{SyncError, SyncOutcome};
use async_trait::async_trait;
use memhub_storage::KnowledgeStore;
use memhub_types::{InstanceId, KnowledgeEntry};
use std::sync::Arc;

/// Supplies knowledge authored by a remote instance.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Returns entries authored by `instance` in `categories` (all when
    /// empty) with `version > since`, ordered by version ascending.
    async fn fetch(
        &self,
        instance: &InstanceId,
        categories: &[String],
        since: Option<u64>,
    ) -> SyncOutcome<Vec<KnowledgeEntry>>;
}

/// A [`KnowledgeSource`] backed by any [`KnowledgeStore`].
#[derive(Clone)]
pub struct StoreSource {
    store: Arc<dyn KnowledgeStore>,
}

impl StoreSource {
    #[must_use]
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KnowledgeSource for StoreSource {
    async fn fetch(
        &self,
        instance: &InstanceId,
        categories: &[String],
        since: Option<u64>,
    ) -> SyncOutcome<Vec<KnowledgeEntry>> {
        self.store
            .list_by_instance_since(instance, categories, since)
            .await
            .map_err(|e| SyncError::Source {
                instance: instance.to_string(),
                reason: e.to_string(),
            })
    }
}
