//! Collective memory hub.
//!
//! A replicated, versioned knowledge store shared by several assistant
//! instances. Each instance owns a [`CollectiveMemoryHub`] over its own
//! [`KnowledgeStore`]; entries carry a per-key version and a content hash,
//! instances pull from each other with [`CollectiveMemoryHub::sync`], and
//! [`CollectiveMemoryHub::rollback`] re-surfaces older content.
//!
//! ```
//! use memhub::{CollectiveMemoryHub, HubConfig};
//! use memhub_storage::MemoryStore;
//! use memhub_types::{KnowledgeDraft, Payload};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let hub = CollectiveMemoryHub::new(
//!     HubConfig::for_instance("bridge-a"),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! hub.store(KnowledgeDraft::new("nav", "heading", Payload::raw("90"))).await.unwrap();
//! let second = hub.store(KnowledgeDraft::new("nav", "heading", Payload::raw("95"))).await.unwrap();
//! assert_eq!(second.version, 2);
//! # });
//! ```

mod config;
mod error;
mod hub;

pub use config::HubConfig;
pub use error::{HubError, HubResult};
pub use hub::{CollectiveMemoryHub, QueryOptions};

pub use memhub_storage::{KnowledgeStore, MemoryStore, SqliteStore};
pub use memhub_sync::{
    AuditSink, KnowledgeSource, SourceSyncStatus, SqliteAuditLog, StoreSource, SyncState,
};
pub use memhub_types::{
    InstanceId, KnowledgeConflict, KnowledgeDraft, KnowledgeEntry, Payload, Resolution,
    RollbackRequest, RollbackResult, SyncRequest, SyncResult,
};
