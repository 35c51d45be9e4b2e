//! Request and response value objects for sync and rollback.
//!
//! None of these are persisted; they only cross the hub's API boundary.

use crate::{InstanceId, KnowledgeConflict, Resolution};
use serde::{Deserialize, Serialize};

/// Pull knowledge authored by `source_instance_id` into the target's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub source_instance_id: InstanceId,
    pub target_instance_id: InstanceId,
    /// Categories to pull. Empty means every category.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Only pull versions strictly greater than this.
    #[serde(default)]
    pub since_version: Option<u64>,
}

impl SyncRequest {
    #[must_use]
    pub fn new(source: impl Into<InstanceId>, target: impl Into<InstanceId>) -> Self {
        Self {
            source_instance_id: source.into(),
            target_instance_id: target.into(),
            categories: Vec::new(),
            since_version: None,
        }
    }

    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn since(mut self, version: u64) -> Self {
        self.since_version = Some(version);
        self
    }
}

/// Summary of one sync run.
///
/// Counts cover only entries that were fully processed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Keys that did not exist locally and were replicated.
    pub synced_count: usize,
    /// Keys where the remote held a newer version.
    pub updated_count: usize,
    /// Version collisions with differing content.
    pub conflict_count: usize,
    pub conflicts: Vec<KnowledgeConflict>,
    /// Highest source version seen. Persist it and pass it back as
    /// `since_version` to resume incrementally.
    pub high_water_version: Option<u64>,
}

impl SyncResult {
    /// Conflicts that were left for an operator.
    pub fn manual_conflicts(&self) -> impl Iterator<Item = &KnowledgeConflict> {
        self.conflicts
            .iter()
            .filter(|c| !c.resolution.is_automatic())
    }

    /// Number of conflicts settled with the given resolution.
    #[must_use]
    pub fn resolved_as(&self, resolution: Resolution) -> usize {
        self.conflicts
            .iter()
            .filter(|c| c.resolution == resolution)
            .count()
    }

    /// Total number of replicated rows.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.synced_count + self.updated_count
    }
}

/// Restore an instance's knowledge to how it stood at `target_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub instance_id: InstanceId,
    pub target_version: u64,
    /// Restrict to these categories. `None` means every category.
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

impl RollbackRequest {
    #[must_use]
    pub fn new(instance_id: impl Into<InstanceId>, target_version: u64) -> Self {
        Self {
            instance_id: instance_id.into(),
            target_version,
            categories: None,
        }
    }

    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }
}

/// Outcome of a rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResult {
    /// Entries selected at or below the target version.
    pub rolled_back_count: usize,
    /// Distinct categories touched, sorted.
    pub affected_categories: Vec<String>,
}
