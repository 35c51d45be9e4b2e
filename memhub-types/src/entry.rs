//! Knowledge entries: the unit of shared memory.
//!
//! An entry is immutable once written. Every change to a `(category, key)`
//! produces a new row with the next version number, so the full history of a
//! key is simply all of its rows ordered by version.

use crate::hash::{self, ContentHash};
use crate::{Error, InstanceId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Confidence assigned when the author does not report one.
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

/// Order-irrelevant tag set.
pub type Tags = BTreeSet<String>;

/// Free-form metadata attached to an entry.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Opaque serialized payload.
///
/// The hub never inspects the structure of a value; it only hashes and
/// compares the serialized text. The schema is owned by whoever writes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(String);

impl Payload {
    /// Wraps already-serialized text.
    #[must_use]
    pub fn raw(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Serializes a value as JSON.
    pub fn from_json<T: Serialize + ?Sized>(value: &T) -> crate::Result<Self> {
        Ok(Self(serde_json::to_string(value)?))
    }

    /// Deserializes the payload as JSON.
    pub fn to_json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_str(&self.0)?)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// What a caller submits to `store()`. Version, hash, author and timestamps
/// are assigned by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDraft {
    pub category: String,
    pub key: String,
    pub value: Payload,
    pub confidence: f64,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub metadata: Metadata,
}

impl KnowledgeDraft {
    /// Creates a draft with default confidence and no tags or metadata.
    #[must_use]
    pub fn new(category: impl Into<String>, key: impl Into<String>, value: Payload) -> Self {
        Self {
            category: category.into(),
            key: key.into(),
            value,
            confidence: DEFAULT_CONFIDENCE,
            tags: Tags::new(),
            metadata: Metadata::new(),
        }
    }

    /// Creates a draft whose value is the JSON serialization of `value`.
    pub fn json<T: Serialize + ?Sized>(
        category: impl Into<String>,
        key: impl Into<String>,
        value: &T,
    ) -> crate::Result<Self> {
        Ok(Self::new(category, key, Payload::from_json(value)?))
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Checks the draft can become an entry.
    pub fn validate(&self) -> crate::Result<()> {
        if self.category.trim().is_empty() {
            return Err(Error::InvalidEntry("category must not be empty".into()));
        }
        if self.key.trim().is_empty() {
            return Err(Error::InvalidEntry("key must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidConfidence(self.confidence));
        }
        Ok(())
    }
}

/// One stored version of a knowledge key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Logical namespace (e.g. "navigation", "maintenance").
    pub category: String,

    /// Identifier within the category.
    pub key: String,

    /// Opaque payload.
    pub value: Payload,

    /// Per-key version, starting at 1.
    pub version: u64,

    /// Fingerprint of `(category, key, value, version)`.
    pub hash: ContentHash,

    /// The instance that authored this version.
    pub source_instance_id: InstanceId,

    /// Author's self-reported certainty in `[0, 1]`.
    pub confidence: f64,

    #[serde(default)]
    pub tags: Tags,

    #[serde(default)]
    pub metadata: Metadata,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    /// Builds an entry from a draft at the given version.
    ///
    /// `created_at` is when the key first appeared; `updated_at` is now.
    #[must_use]
    pub fn from_draft(
        draft: KnowledgeDraft,
        version: u64,
        author: InstanceId,
        created_at: DateTime<Utc>,
    ) -> Self {
        let hash = hash::hash(&draft.category, &draft.key, &draft.value, version);
        Self {
            category: draft.category,
            key: draft.key,
            value: draft.value,
            version,
            hash,
            source_instance_id: author,
            confidence: draft.confidence,
            tags: draft.tags,
            metadata: draft.metadata,
            created_at,
            updated_at: Utc::now(),
        }
    }

    /// Copies this entry's content to a new version number, recomputing the
    /// hash and stamping `updated_at`. Used to re-surface old content as the
    /// current row without rewriting history.
    #[must_use]
    pub fn restamped(&self, version: u64) -> Self {
        Self {
            version,
            hash: hash::hash(&self.category, &self.key, &self.value, version),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Recomputes the fingerprint and compares it to the stored one.
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        hash::hash(&self.category, &self.key, &self.value, self.version) == self.hash
    }

    /// Returns true if both entries address the same `(category, key)`.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.category == other.category && self.key == other.key
    }

    /// Returns true if every tag in `required` is on this entry.
    #[must_use]
    pub fn has_tags(&self, required: &Tags) -> bool {
        required.is_subset(&self.tags)
    }
}
