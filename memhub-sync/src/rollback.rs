//! Point-in-time rollback for one instance's knowledge.
//!
//! Every entry the instance authored at or below the target version is
//! selected, and the selection is what the result counts. Per key, the
//! highest selected version is the restore point. If the key has moved on
//! since, the restore point's content is written again as a fresh version
//! on top of the history. Old rows are never rewritten, so version numbers
//! stay monotonic and a rollback can itself be rolled back.

use memhub_storage::{KeyLocks, KnowledgeStore, StorageResult, append_version};
use memhub_types::{KnowledgeEntry, RollbackRequest, RollbackResult};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Metadata key stamped on rows written by a rollback.
pub const ROLLBACK_OF_KEY: &str = "rollback_of_version";

/// Restores older versions as the current value of their keys.
pub struct RollbackEngine {
    store: Arc<dyn KnowledgeStore>,
    locks: Arc<KeyLocks>,
    max_retries: usize,
}

impl RollbackEngine {
    pub fn new(store: Arc<dyn KnowledgeStore>, locks: Arc<KeyLocks>) -> Self {
        Self {
            store,
            locks,
            max_retries: 3,
        }
    }

    /// Sets how many times a version collision with another process is
    /// retried before giving up.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn rollback(&self, request: &RollbackRequest) -> StorageResult<RollbackResult> {
        let candidates = self
            .store
            .list_by_instance_up_to(
                &request.instance_id,
                request.categories.as_deref(),
                request.target_version,
            )
            .await?;

        let selected = candidates.len();
        let mut restore_points: BTreeMap<(String, String), KnowledgeEntry> = BTreeMap::new();
        for entry in candidates {
            let id = (entry.category.clone(), entry.key.clone());
            match restore_points.get(&id) {
                Some(existing) if existing.version >= entry.version => {}
                _ => {
                    restore_points.insert(id, entry);
                }
            }
        }

        let mut affected = BTreeSet::new();
        let mut rewritten = 0;
        for ((category, key), point) in restore_points {
            if self.restore(&point).await? {
                rewritten += 1;
                debug!("Rolled back {}/{} to v{}", point.category, key, point.version);
            }
            affected.insert(category);
        }

        info!(
            "Rolled back {} to v{}: {} entries selected, {} keys rewritten",
            request.instance_id, request.target_version, selected, rewritten
        );
        Ok(RollbackResult {
            rolled_back_count: selected,
            affected_categories: affected.into_iter().collect(),
        })
    }

    /// Makes `point`'s content current for its key. Returns true if a new
    /// row was written.
    async fn restore(&self, point: &KnowledgeEntry) -> StorageResult<bool> {
        let _guard = self.locks.acquire(&point.category, &point.key).await;

        let latest = self.store.get_latest(&point.category, &point.key).await?;
        let already_current = latest
            .as_ref()
            .is_none_or(|l| l.version <= point.version || l.value == point.value);
        if already_current {
            return Ok(false);
        }

        append_version(
            self.store.as_ref(),
            &point.category,
            &point.key,
            self.max_retries,
            |_, version| {
                let mut restored = point.restamped(version);
                restored
                    .metadata
                    .insert(ROLLBACK_OF_KEY.to_string(), json!(point.version));
                restored
            },
        )
        .await?;
        Ok(true)
    }
}
