//! Versioned record storage for the collective memory hub.
//!
//! Provides the [`KnowledgeStore`] contract the rest of the hub is written
//! against, plus two implementations:
//!
//! - [`MemoryStore`] keeps rows in ordered maps (tests, ephemeral instances)
//! - [`SqliteStore`] persists rows in a single SQLite table
//!
//! # Versioning
//!
//! Rows are keyed by `(category, key, version)`. Stores never pick version
//! numbers themselves. Writers hold the key's lock from [`KeyLocks`] and go
//! through [`append_version`], which reads the latest row, inserts at the
//! next version with [`KnowledgeStore::insert`] (which refuses to
//! overwrite) and retries when a writer in another process got there first.

mod append;
mod error;
mod locks;
mod memory;
mod sqlite;
mod store;

pub use append::append_version;
pub use error::{StorageError, StorageResult};
pub use locks::{KeyGuard, KeyLocks};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{DEFAULT_HISTORY_LIMIT, DEFAULT_LIST_LIMIT, EntryFilter, KnowledgeStore};
