//! Sync state tracking.
//!
//! Remembers, per source instance, how the last runs went so the
//! application can show sync status and pick a `since_version` when it
//! wants to resume. Purely in-memory; callers that need it across restarts
//! serialize it.

use chrono::{DateTime, Utc};
use memhub_types::{InstanceId, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tracks sync status for every source this instance has pulled from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    sources: HashMap<InstanceId, SourceSyncStatus>,
}

impl SyncState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed run from `source`.
    pub fn record_run(&mut self, source: &InstanceId, result: &SyncResult) {
        self.sources
            .entry(source.clone())
            .or_insert_with(|| SourceSyncStatus::new(source.clone()))
            .record(result);
    }

    /// Status for one source.
    #[must_use]
    pub fn source(&self, source: &InstanceId) -> Option<&SourceSyncStatus> {
        self.sources.get(source)
    }

    /// All sources, in no particular order.
    pub fn sources(&self) -> impl Iterator<Item = &SourceSyncStatus> {
        self.sources.values()
    }

    /// Highest source version seen across all runs from `source`.
    #[must_use]
    pub fn high_water_version(&self, source: &InstanceId) -> Option<u64> {
        self.sources.get(source).and_then(|s| s.high_water_version)
    }
}

/// Sync status for one source instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSyncStatus {
    pub source_instance_id: InstanceId,
    pub runs: usize,
    pub high_water_version: Option<u64>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Counts from the most recent run.
    pub last_changes: usize,
    pub last_conflicts: usize,
    /// Conflicts from the most recent run still awaiting an operator.
    pub pending_manual: usize,
}

impl SourceSyncStatus {
    #[must_use]
    pub fn new(source_instance_id: InstanceId) -> Self {
        Self {
            source_instance_id,
            runs: 0,
            high_water_version: None,
            last_synced_at: None,
            last_changes: 0,
            last_conflicts: 0,
            pending_manual: 0,
        }
    }

    fn record(&mut self, result: &SyncResult) {
        self.runs += 1;
        self.high_water_version = match (self.high_water_version, result.high_water_version) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.last_synced_at = Some(Utc::now());
        self.last_changes = result.changes();
        self.last_conflicts = result.conflict_count;
        self.pending_manual = result.manual_conflicts().count();
    }
}
