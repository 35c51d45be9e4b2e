//! Sync engine: one-directional pull from a source instance.
//!
//! For each entry the source authored (ascending by version):
//! 1. No local row for the key: replicate it.
//! 2. Same version, different hash: conflict, resolved automatically when
//!    the resolver finds a winner.
//! 3. Newer remote version: replicate it as an update.
//! 4. Otherwise the remote row is stale or identical and is skipped.
//!
//! Every per-entry step holds the key's lock, so concurrent syncs and local
//! `store()` calls on the same key never interleave their read-then-write.
//! Any storage failure aborts the run; nothing partial is returned.

use crate::audit::{AuditSink, SyncRunRecord, TracingAuditSink};
use crate::conflict::ConflictResolver;
use crate::error::SyncOutcome;
use crate::source::KnowledgeSource;
use chrono::Utc;
use memhub_storage::{KeyLocks, KnowledgeStore, StorageResult};
use memhub_types::{KnowledgeConflict, KnowledgeEntry, SyncRequest, SyncResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pulls knowledge from a [`KnowledgeSource`] into the local store.
pub struct SyncEngine {
    store: Arc<dyn KnowledgeStore>,
    locks: Arc<KeyLocks>,
    resolver: ConflictResolver,
    audit: Arc<dyn AuditSink>,
}

impl SyncEngine {
    /// Creates an engine with the default resolver and the tracing audit sink.
    pub fn new(store: Arc<dyn KnowledgeStore>, locks: Arc<KeyLocks>) -> Self {
        Self {
            store,
            locks,
            resolver: ConflictResolver::default(),
            audit: Arc::new(TracingAuditSink),
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: ConflictResolver) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// Runs one sync and reports what it did.
    pub async fn sync(
        &self,
        source: &dyn KnowledgeSource,
        request: &SyncRequest,
    ) -> SyncOutcome<SyncResult> {
        let started_at = Utc::now();
        info!(
            "Syncing {:?} from {} into {}",
            request.categories, request.source_instance_id, request.target_instance_id
        );

        let mut result = SyncResult::default();
        let outcome = self.run(source, request, &mut result).await;

        let error = outcome.as_ref().err().map(ToString::to_string);
        if let Some(e) = &error {
            warn!(
                "Sync from {} aborted after {} changes and {} conflicts: {}",
                request.source_instance_id,
                result.changes(),
                result.conflict_count,
                e
            );
        } else {
            info!(
                "Sync from {} done: {} synced, {} updated, {} conflicts",
                request.source_instance_id,
                result.synced_count,
                result.updated_count,
                result.conflict_count
            );
        }

        let record = SyncRunRecord::new(request, &result, started_at, error);
        if let Err(e) = self.audit.record_sync_run(&record).await {
            warn!("Failed to record sync run {}: {}", record.id, e);
        }

        outcome.map(|()| result)
    }

    async fn run(
        &self,
        source: &dyn KnowledgeSource,
        request: &SyncRequest,
        result: &mut SyncResult,
    ) -> SyncOutcome<()> {
        let remote_entries = source
            .fetch(
                &request.source_instance_id,
                &request.categories,
                request.since_version,
            )
            .await?;
        debug!(
            "Fetched {} entries from {}",
            remote_entries.len(),
            request.source_instance_id
        );

        for remote in remote_entries {
            let version = remote.version;
            self.apply_remote(remote, result).await?;
            result.high_water_version =
                Some(result.high_water_version.map_or(version, |v| v.max(version)));
        }
        Ok(())
    }

    /// Reconciles one remote entry with the local store. Counters in
    /// `result` only move once the step's writes have succeeded.
    async fn apply_remote(
        &self,
        remote: KnowledgeEntry,
        result: &mut SyncResult,
    ) -> SyncOutcome<()> {
        let _guard = self.locks.acquire(&remote.category, &remote.key).await;
        let local = self.store.get_latest(&remote.category, &remote.key).await?;

        let Some(local) = local else {
            self.store.upsert(&remote).await?;
            debug!(
                "Replicated new key {}/{} v{}",
                remote.category, remote.key, remote.version
            );
            result.synced_count += 1;
            return Ok(());
        };

        if let Some(conflict) = self.resolver.detect(&local, &remote) {
            self.apply_resolution(&conflict).await?;
            result.conflict_count += 1;
            result.conflicts.push(conflict);
        } else if remote.version > local.version {
            self.store.upsert(&remote).await?;
            debug!(
                "Updated {}/{} v{} -> v{}",
                remote.category, remote.key, local.version, remote.version
            );
            result.updated_count += 1;
        } else {
            debug!(
                "Skipped {}/{} v{} (local at v{})",
                remote.category, remote.key, remote.version, local.version
            );
        }
        Ok(())
    }

    /// Applies a conflict's resolution. Returns true if the store was
    /// written.
    ///
    /// `Local` and `Remote` re-assert the winner at the conflicting version.
    /// `Manual` and `Merge` leave the key untouched for an operator.
    pub async fn apply_resolution(&self, conflict: &KnowledgeConflict) -> StorageResult<bool> {
        match conflict.winner() {
            Some(winner) => {
                self.store.upsert(winner).await?;
                info!(
                    "Resolved conflict on {}/{} v{} as {}",
                    conflict.category, conflict.key, conflict.version, conflict.resolution
                );
                Ok(true)
            }
            None => {
                warn!(
                    category = %conflict.category,
                    key = %conflict.key,
                    version = conflict.version,
                    local_instance = %conflict.local.source_instance_id,
                    remote_instance = %conflict.remote.source_instance_id,
                    resolution = %conflict.resolution,
                    "Conflict requires manual resolution"
                );
                Ok(false)
            }
        }
    }
}
