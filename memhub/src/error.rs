//! Error types for the hub facade.

use memhub_storage::StorageError;
use memhub_sync::SyncError;
use memhub_types::InstanceId;
use thiserror::Error;

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Errors returned by [`CollectiveMemoryHub`](crate::CollectiveMemoryHub).
#[derive(Debug, Error)]
pub enum HubError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The draft passed to `store` failed validation.
    #[error("invalid entry: {0}")]
    InvalidEntry(#[from] memhub_types::Error),

    /// A sync request addressed a different instance than this hub.
    #[error("sync request targets {requested} but this hub is {local}")]
    TargetMismatch {
        requested: InstanceId,
        local: InstanceId,
    },

    /// Other writers kept claiming the next version of the key.
    #[error("gave up writing {category}/{key} after {attempts} version collisions")]
    VersionContention {
        category: String,
        key: String,
        attempts: usize,
    },
}
