//! Replication, conflict resolution and rollback for the collective memory hub.
//!
//! # Architecture
//!
//! Instances do not share a clock or a consensus protocol. Each key carries
//! a per-store version counter and a content hash, and that is all the sync
//! layer reasons about.
//!
//! ## Components
//!
//! - **Source**: supplies the entries a remote instance authored
//! - **Conflict**: detects same-version/different-hash pairs and picks a winner
//! - **Engine**: pulls from a source into the local store, one key at a time
//! - **Rollback**: re-surfaces older content as a fresh version
//! - **Audit**: best-effort record of every sync run
//! - **State**: per-source sync status for the application to display
//!
//! # Example
//!
//! ```
//! use memhub_storage::{KeyLocks, MemoryStore};
//! use memhub_sync::{StoreSource, SyncEngine};
//! use memhub_types::SyncRequest;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let local = Arc::new(MemoryStore::new());
//! let remote = StoreSource::new(Arc::new(MemoryStore::new()));
//! let engine = SyncEngine::new(local, Arc::new(KeyLocks::new()));
//!
//! let request = SyncRequest::new("bridge-b", "bridge-a").with_categories(["fuel"]);
//! let result = engine.sync(&remote, &request).await.unwrap();
//! assert_eq!(result.synced_count, 0);
//! # });
//! ```

mod audit;
mod audit_log;
mod conflict;
mod engine;
mod error;
mod rollback;
mod source;
pub mod state;

pub use audit::{AuditError, AuditSink, SyncRunRecord, SyncRunStatus, TracingAuditSink};
pub use audit_log::SqliteAuditLog;
pub use conflict::{ConflictResolver, ResolverConfig};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncOutcome};
pub use rollback::{ROLLBACK_OF_KEY, RollbackEngine};
pub use source::{KnowledgeSource, StoreSource};
pub use state::{SourceSyncStatus, SyncState};
