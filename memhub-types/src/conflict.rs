//! Conflicts between two instances' views of the same key version.

use crate::{ContentHash, KnowledgeEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a conflict was (or must be) settled.
///
/// `Merge` is never produced by the automatic resolver. It exists so a
/// future merge strategy has a typed place to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Keep the local entry.
    Local,
    /// Take the remote entry.
    Remote,
    /// Combine both entries with custom merge logic.
    Merge,
    /// No automatic winner; an operator must decide.
    Manual,
}

impl Resolution {
    /// Returns true if the store can apply this resolution without a human.
    #[must_use]
    pub const fn is_automatic(self) -> bool {
        matches!(self, Self::Local | Self::Remote)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Merge => "merge",
            Self::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Two entries that share `(category, key, version)` but not content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConflict {
    pub category: String,
    pub key: String,
    pub version: u64,
    pub local: KnowledgeEntry,
    pub remote: KnowledgeEntry,
    pub resolution: Resolution,
    pub detected_at: DateTime<Utc>,
}

impl KnowledgeConflict {
    /// Records a conflict between `local` and `remote`.
    #[must_use]
    pub fn new(local: KnowledgeEntry, remote: KnowledgeEntry, resolution: Resolution) -> Self {
        Self {
            category: local.category.clone(),
            key: local.key.clone(),
            version: local.version,
            local,
            remote,
            resolution,
            detected_at: Utc::now(),
        }
    }

    /// The entry that wins under the current resolution, if any.
    #[must_use]
    pub fn winner(&self) -> Option<&KnowledgeEntry> {
        match self.resolution {
            Resolution::Local => Some(&self.local),
            Resolution::Remote => Some(&self.remote),
            Resolution::Merge | Resolution::Manual => None,
        }
    }

    /// The two fingerprints in a fixed order, independent of which side was
    /// local.
    #[must_use]
    pub fn hash_pair(&self) -> (&ContentHash, &ContentHash) {
        let (a, b) = (&self.local.hash, &self.remote.hash);
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Returns true if this conflict is between `a` and `b` in either order.
    #[must_use]
    pub fn involves(&self, a: &KnowledgeEntry, b: &KnowledgeEntry) -> bool {
        (self.local.hash == a.hash && self.remote.hash == b.hash)
            || (self.local.hash == b.hash && self.remote.hash == a.hash)
    }
}
