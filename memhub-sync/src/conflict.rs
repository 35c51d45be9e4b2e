//! Conflict detection and automatic resolution.
//!
//! Two entries conflict when they claim the same `(category, key, version)`
//! but carry different content hashes. A newer remote version is not a
//! conflict (it is an update) and an older one is simply stale.
//!
//! Resolution is a heuristic, not a CRDT merge: a clearly more confident
//! author wins, then the more recently updated entry, and anything still
//! tied goes to an operator.

use memhub_types::{KnowledgeConflict, KnowledgeEntry, Resolution};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Tuning for [`ConflictResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// A side must be more confident by strictly more than this to win on
    /// confidence alone.
    pub confidence_margin: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            confidence_margin: 0.1,
        }
    }
}

/// Detects conflicts and picks a winner.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    config: ResolverConfig,
}

impl ConflictResolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the conflict between `local` and `remote`, already carrying
    /// the automatic resolution, or `None` if they do not conflict.
    #[must_use]
    pub fn detect(
        &self,
        local: &KnowledgeEntry,
        remote: &KnowledgeEntry,
    ) -> Option<KnowledgeConflict> {
        if !local.same_key(remote) || local.version != remote.version || local.hash == remote.hash
        {
            return None;
        }
        let resolution = self.auto_resolve(local, remote);
        Some(KnowledgeConflict::new(
            local.clone(),
            remote.clone(),
            resolution,
        ))
    }

    /// Picks a winner by confidence margin, then recency. Never returns
    /// `Merge`.
    #[must_use]
    pub fn auto_resolve(&self, local: &KnowledgeEntry, remote: &KnowledgeEntry) -> Resolution {
        let margin = self.config.confidence_margin;
        if local.confidence - remote.confidence > margin {
            return Resolution::Local;
        }
        if remote.confidence - local.confidence > margin {
            return Resolution::Remote;
        }
        match local.updated_at.cmp(&remote.updated_at) {
            Ordering::Greater => Resolution::Local,
            Ordering::Less => Resolution::Remote,
            Ordering::Equal => Resolution::Manual,
        }
    }
}
