//! The versioned record store contract.

use crate::error::StorageResult;
use async_trait::async_trait;
use memhub_types::{InstanceId, KnowledgeEntry, Tags};

/// Default row cap for category listings.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Default row cap for version history.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Filter for [`KnowledgeStore::list_by_category`].
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFilter {
    /// Entries must carry every one of these tags.
    pub tags: Tags,
    /// Entries below this confidence are skipped.
    pub min_confidence: Option<f64>,
    pub limit: usize,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            tags: Tags::new(),
            min_confidence: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl EntryFilter {
    /// Returns true if `entry` passes the tag and confidence checks.
    /// The limit is applied by the caller.
    #[must_use]
    pub fn matches(&self, entry: &KnowledgeEntry) -> bool {
        if let Some(min) = self.min_confidence {
            if entry.confidence < min {
                return false;
            }
        }
        entry.has_tags(&self.tags)
    }
}

/// Durable mapping from `(category, key)` to an ordered sequence of versions.
///
/// Implementations must treat `(category, key, version)` as a unique key.
/// Callers that need read-then-write atomicity serialize through
/// [`KeyLocks`](crate::KeyLocks); the store itself only guarantees that
/// [`insert`](Self::insert) never overwrites.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Returns the highest version stored for the key.
    async fn get_latest(&self, category: &str, key: &str)
    -> StorageResult<Option<KnowledgeEntry>>;

    /// Returns one exact version.
    async fn get_version(
        &self,
        category: &str,
        key: &str,
        version: u64,
    ) -> StorageResult<Option<KnowledgeEntry>>;

    /// Lists entries in a category, version descending.
    async fn list_by_category(
        &self,
        category: &str,
        filter: &EntryFilter,
    ) -> StorageResult<Vec<KnowledgeEntry>>;

    /// Lists every version of one key, version descending.
    async fn list_versions(
        &self,
        category: &str,
        key: &str,
        limit: usize,
    ) -> StorageResult<Vec<KnowledgeEntry>>;

    /// Lists entries authored by `instance` with `version <= max_version`,
    /// version ascending.
    async fn list_by_instance_up_to(
        &self,
        instance: &InstanceId,
        categories: Option<&[String]>,
        max_version: u64,
    ) -> StorageResult<Vec<KnowledgeEntry>>;

    /// Lists entries authored by `instance` with `version > since`,
    /// version ascending. An empty `categories` slice means every category.
    async fn list_by_instance_since(
        &self,
        instance: &InstanceId,
        categories: &[String],
        since: Option<u64>,
    ) -> StorageResult<Vec<KnowledgeEntry>>;

    /// Writes a new row. Fails with `StorageError::Duplicate` if the version
    /// is taken.
    async fn insert(&self, entry: &KnowledgeEntry) -> StorageResult<()>;

    /// Writes a row, replacing any existing row at the same version.
    async fn upsert(&self, entry: &KnowledgeEntry) -> StorageResult<()>;
}

/// Returns true if `category` passes an optional category restriction.
pub(crate) fn category_allowed(categories: Option<&[String]>, category: &str) -> bool {
    match categories {
        Some(list) if !list.is_empty() => list.iter().any(|c| c == category),
        _ => true,
    }
}
