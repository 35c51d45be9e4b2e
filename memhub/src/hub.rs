//! The hub facade: one instance's view of the shared knowledge.

use crate::config::HubConfig;
use crate::error::{HubError, HubResult};
use chrono::Utc;
use memhub_storage::{EntryFilter, KeyLocks, KnowledgeStore, StorageError, append_version};
use memhub_sync::{
    AuditSink, ConflictResolver, KnowledgeSource, RollbackEngine, SourceSyncStatus, SyncEngine,
    SyncState,
};
use memhub_types::{
    InstanceId, KnowledgeDraft, KnowledgeEntry, RollbackRequest, RollbackResult, SyncRequest,
    SyncResult, Tags,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Filters for [`CollectiveMemoryHub::query`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Entries must carry every one of these tags.
    pub tags: Tags,
    pub min_confidence: Option<f64>,
    /// Falls back to [`HubConfig::query_limit`].
    pub limit: Option<usize>,
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    #[must_use]
    pub fn min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = Some(min);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Versioned knowledge store for one assistant instance, with sync and
/// rollback.
///
/// Every write path (`store`, `sync`, `rollback`) shares one set of key
/// locks, so they can be called concurrently from any number of tasks.
pub struct CollectiveMemoryHub {
    config: HubConfig,
    store: Arc<dyn KnowledgeStore>,
    locks: Arc<KeyLocks>,
    sync_engine: SyncEngine,
    rollback_engine: RollbackEngine,
    state: Arc<RwLock<SyncState>>,
}

impl CollectiveMemoryHub {
    /// Creates a hub over `store` that audits sync runs to `tracing`.
    pub fn new(config: HubConfig, store: Arc<dyn KnowledgeStore>) -> Self {
        let locks = Arc::new(KeyLocks::new());
        let sync_engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&locks))
            .with_resolver(ConflictResolver::new(config.resolver_config()));
        let rollback_engine = RollbackEngine::new(Arc::clone(&store), Arc::clone(&locks))
            .with_max_retries(config.store_retries);

        Self {
            config,
            store,
            locks,
            sync_engine,
            rollback_engine,
            state: Arc::new(RwLock::new(SyncState::new())),
        }
    }

    /// Sends sync-run records to `sink` instead of `tracing`.
    #[must_use]
    pub fn with_audit_sink(self, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sync_engine: self.sync_engine.with_audit_sink(sink),
            ..self
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.config.instance_id
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Writes `draft` as the next version of its key, authored by this
    /// instance.
    pub async fn store(&self, draft: KnowledgeDraft) -> HubResult<KnowledgeEntry> {
        draft.validate()?;
        let category = draft.category.clone();
        let key = draft.key.clone();
        let author = &self.config.instance_id;
        let retries = self.config.store_retries;

        let _guard = self.locks.acquire(&category, &key).await;
        let written = append_version(
            self.store.as_ref(),
            &category,
            &key,
            retries,
            |latest, version| {
                let created_at = latest.map_or_else(Utc::now, |e| e.created_at);
                KnowledgeEntry::from_draft(draft.clone(), version, author.clone(), created_at)
            },
        )
        .await
        .map_err(|e| match e {
            StorageError::Duplicate { .. } => HubError::VersionContention {
                category: category.clone(),
                key: key.clone(),
                attempts: retries + 1,
            },
            other => other.into(),
        })?;

        debug!("Stored {}/{} v{}", category, key, written.version);
        Ok(written)
    }

    /// Pulls knowledge authored by the request's source into this hub.
    ///
    /// The request must target this hub's instance id.
    pub async fn sync(
        &self,
        source: &dyn KnowledgeSource,
        request: &SyncRequest,
    ) -> HubResult<SyncResult> {
        if request.target_instance_id != self.config.instance_id {
            return Err(HubError::TargetMismatch {
                requested: request.target_instance_id.clone(),
                local: self.config.instance_id.clone(),
            });
        }

        let result = self.sync_engine.sync(source, request).await?;
        self.state
            .write()
            .await
            .record_run(&request.source_instance_id, &result);
        Ok(result)
    }

    /// Makes the content `request.instance_id` had at `target_version`
    /// current again, as fresh versions on top of the history.
    pub async fn rollback(&self, request: &RollbackRequest) -> HubResult<RollbackResult> {
        let result = self.rollback_engine.rollback(request).await?;
        info!(
            "Rollback of {} to v{} touched {:?}",
            request.instance_id, request.target_version, result.affected_categories
        );
        Ok(result)
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Latest version of a key.
    pub async fn get(&self, category: &str, key: &str) -> HubResult<Option<KnowledgeEntry>> {
        Ok(self.store.get_latest(category, key).await?)
    }

    pub async fn get_version(
        &self,
        category: &str,
        key: &str,
        version: u64,
    ) -> HubResult<Option<KnowledgeEntry>> {
        Ok(self.store.get_version(category, key, version).await?)
    }

    /// Entries in a category matching `options`, newest version first.
    pub async fn query(
        &self,
        category: &str,
        options: &QueryOptions,
    ) -> HubResult<Vec<KnowledgeEntry>> {
        let filter = EntryFilter {
            tags: options.tags.clone(),
            min_confidence: options.min_confidence,
            limit: options.limit.unwrap_or(self.config.query_limit),
        };
        Ok(self.store.list_by_category(category, &filter).await?)
    }

    /// Versions of one key, newest first.
    pub async fn get_history(
        &self,
        category: &str,
        key: &str,
        limit: Option<usize>,
    ) -> HubResult<Vec<KnowledgeEntry>> {
        let limit = limit.unwrap_or(self.config.history_limit);
        Ok(self.store.list_versions(category, key, limit).await?)
    }

    // ── Sync status ──────────────────────────────────────────────

    pub async fn sync_status(&self, source: &InstanceId) -> Option<SourceSyncStatus> {
        self.state.read().await.source(source).cloned()
    }

    /// Snapshot of every source's sync status.
    pub async fn sync_state(&self) -> SyncState {
        self.state.read().await.clone()
    }
}
