//! Core type definitions for the collective memory hub.
//!
//! This crate defines the plain data shared by every layer of the hub:
//! - Instance identifiers for the AI assistants that author knowledge
//! - Versioned knowledge entries and the drafts callers submit
//! - The content hasher used for conflict detection
//! - Conflict, sync and rollback value objects
//!
//! Nothing here performs I/O. Storage lives in `memhub-storage`, replication
//! and rollback in `memhub-sync`.

mod conflict;
mod entry;
pub mod hash;
mod ids;
mod requests;

pub use conflict::{KnowledgeConflict, Resolution};
pub use entry::{DEFAULT_CONFIDENCE, KnowledgeDraft, KnowledgeEntry, Metadata, Payload, Tags};
pub use hash::{ContentHash, hash};
pub use ids::InstanceId;
pub use requests::{RollbackRequest, RollbackResult, SyncRequest, SyncResult};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    #[error("confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),

    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}
