//! Error types for the sync layer.

use memhub_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
///
/// Named `SyncOutcome` because `SyncResult` is the summary a sync run
/// returns.
pub type SyncOutcome<T> = Result<T, SyncError>;

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source instance could not be read.
    #[error("failed to fetch from source instance {instance}: {reason}")]
    Source { instance: String, reason: String },

    /// Writing to the local store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
