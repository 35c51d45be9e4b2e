//! Per-key write serialization.
//!
//! Every read-then-write sequence on a `(category, key)` (assigning the next
//! version, replicating, rolling back) must hold that key's lock so two
//! writers cannot both compute the same next version.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type KeyId = (String, String);

/// Guard for one key. The key is unlocked when this is dropped.
pub type KeyGuard = OwnedMutexGuard<()>;

/// A map of async mutexes, one per `(category, key)`.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<KeyId, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `(category, key)`.
    pub async fn acquire(&self, category: &str, key: &str) -> KeyGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Drop entries nobody holds or waits on.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(
                locks
                    .entry((category.to_string(), key.to_string()))
                    .or_default(),
            )
        };
        lock.lock_owned().await
    }

    /// Number of keys currently held or waited on.
    #[must_use]
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|l| Arc::strong_count(l) > 1).count()
    }
}
