//! Appending the next version of a key.

use crate::error::{StorageError, StorageResult};
use crate::store::KnowledgeStore;
use memhub_types::KnowledgeEntry;
use tracing::warn;

/// Writes the entry produced by `build` at version `latest + 1`.
///
/// `build` receives the current latest row (if any) and the version to
/// write. If another writer sharing the same database takes that version
/// first, the latest row is re-read and `build` is called again, up to
/// `max_retries` extra attempts; after that the `Duplicate` error is
/// returned.
///
/// Callers must hold the key's [`KeyLocks`](crate::KeyLocks) guard so
/// in-process writers never race here.
pub async fn append_version<F>(
    store: &dyn KnowledgeStore,
    category: &str,
    key: &str,
    max_retries: usize,
    mut build: F,
) -> StorageResult<KnowledgeEntry>
where
    F: FnMut(Option<&KnowledgeEntry>, u64) -> KnowledgeEntry + Send,
{
    let mut attempt = 0;
    loop {
        let latest = store.get_latest(category, key).await?;
        let version = latest.as_ref().map_or(1, |e| e.version + 1);
        let entry = build(latest.as_ref(), version);

        match store.insert(&entry).await {
            Ok(()) => return Ok(entry),
            Err(err @ StorageError::Duplicate { .. }) if attempt < max_retries => {
                attempt += 1;
                warn!(
                    "Version {} of {}/{} taken by another writer, retrying ({}/{}): {}",
                    version, category, key, attempt, max_retries, err
                );
            }
            Err(err) => return Err(err),
        }
    }
}
