//! Behaviour every `KnowledgeStore` must share. Each check runs against both
//! the in-memory and the SQLite store.

use chrono::Utc;
use memhub_storage::{
    DEFAULT_LIST_LIMIT, EntryFilter, KnowledgeStore, MemoryStore, SqliteStore, StorageError,
};
use memhub_types::{InstanceId, KnowledgeDraft, KnowledgeEntry, Payload, Tags};
use pretty_assertions::assert_eq;
use serde_json::json;

fn entry(category: &str, key: &str, version: u64, author: &str, value: &str) -> KnowledgeEntry {
    KnowledgeEntry::from_draft(
        KnowledgeDraft::new(category, key, Payload::raw(value)),
        version,
        InstanceId::new(author),
        Utc::now(),
    )
}

fn tagged(mut e: KnowledgeEntry, tags: &[&str], confidence: f64) -> KnowledgeEntry {
    e.tags = tags.iter().map(|t| t.to_string()).collect();
    e.confidence = confidence;
    e
}

fn versions(entries: &[KnowledgeEntry]) -> Vec<u64> {
    entries.iter().map(|e| e.version).collect()
}

macro_rules! contract_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test]
                async fn $name() {
                    let store = memhub_storage::MemoryStore::new();
                    super::$name(&store).await;
                }
            )*
        }

        mod sqlite {
            $(
                #[tokio::test]
                async fn $name() {
                    let store = memhub_storage::SqliteStore::open_in_memory().unwrap();
                    super::$name(&store).await;
                }
            )*
        }
    };
}

contract_tests!(
    latest_is_highest_version,
    missing_key_is_none,
    get_exact_version,
    insert_refuses_duplicate_version,
    upsert_replaces_existing_row,
    history_is_descending_and_capped,
    category_listing_orders_and_filters,
    category_listing_respects_limit,
    category_limit_applies_after_filters,
    instance_since_is_ascending_and_filtered,
    instance_up_to_bounds_version,
    roundtrip_preserves_every_field,
);

async fn latest_is_highest_version(store: &dyn KnowledgeStore) {
    for v in [1, 3, 2] {
        store.insert(&entry("nav", "heading", v, "a", &v.to_string())).await.unwrap();
    }
    let latest = store.get_latest("nav", "heading").await.unwrap().unwrap();
    assert_eq!(latest.version, 3);
    assert_eq!(latest.value.as_str(), "3");
}

async fn missing_key_is_none(store: &dyn KnowledgeStore) {
    assert!(store.get_latest("nav", "nothing").await.unwrap().is_none());
    assert!(store.get_version("nav", "nothing", 1).await.unwrap().is_none());
    assert!(store.list_versions("nav", "nothing", 10).await.unwrap().is_empty());
}

async fn get_exact_version(store: &dyn KnowledgeStore) {
    store.insert(&entry("nav", "heading", 1, "a", "90")).await.unwrap();
    store.insert(&entry("nav", "heading", 2, "a", "95")).await.unwrap();

    let v1 = store.get_version("nav", "heading", 1).await.unwrap().unwrap();
    assert_eq!(v1.value.as_str(), "90");
    assert!(store.get_version("nav", "heading", 3).await.unwrap().is_none());
}

async fn insert_refuses_duplicate_version(store: &dyn KnowledgeStore) {
    store.insert(&entry("nav", "heading", 1, "a", "90")).await.unwrap();
    let err = store
        .insert(&entry("nav", "heading", 1, "b", "91"))
        .await
        .unwrap_err();

    assert!(err.is_duplicate());
    assert!(matches!(
        err,
        StorageError::Duplicate { ref category, version: 1, .. } if category == "nav"
    ));
    // The original row is untouched.
    let row = store.get_version("nav", "heading", 1).await.unwrap().unwrap();
    assert_eq!(row.value.as_str(), "90");
}

async fn upsert_replaces_existing_row(store: &dyn KnowledgeStore) {
    store.insert(&entry("nav", "heading", 1, "a", "90")).await.unwrap();
    store.upsert(&entry("nav", "heading", 1, "b", "91")).await.unwrap();
    store.upsert(&entry("nav", "course", 1, "b", "10")).await.unwrap();

    let row = store.get_latest("nav", "heading").await.unwrap().unwrap();
    assert_eq!(row.value.as_str(), "91");
    assert_eq!(row.source_instance_id, InstanceId::new("b"));
    assert_eq!(store.list_versions("nav", "heading", 10).await.unwrap().len(), 1);
    assert!(store.get_latest("nav", "course").await.unwrap().is_some());
}

async fn history_is_descending_and_capped(store: &dyn KnowledgeStore) {
    for v in 1..=12 {
        store.insert(&entry("nav", "heading", v, "a", "x")).await.unwrap();
    }
    let history = store.list_versions("nav", "heading", 10).await.unwrap();
    assert_eq!(versions(&history), (3..=12).rev().collect::<Vec<_>>());

    let short = store.list_versions("nav", "heading", 2).await.unwrap();
    assert_eq!(versions(&short), vec![12, 11]);
}

async fn category_listing_orders_and_filters(store: &dyn KnowledgeStore) {
    store
        .insert(&tagged(entry("nav", "heading", 1, "a", "1"), &["bridge", "gps"], 0.9))
        .await
        .unwrap();
    store
        .insert(&tagged(entry("nav", "heading", 2, "a", "2"), &["bridge"], 0.5))
        .await
        .unwrap();
    store
        .insert(&tagged(entry("nav", "course", 1, "a", "3"), &["gps"], 0.8))
        .await
        .unwrap();
    store
        .insert(&tagged(entry("fuel", "rate", 5, "a", "4"), &["gps"], 1.0))
        .await
        .unwrap();

    let all = store.list_by_category("nav", &EntryFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].version, 2);
    assert!(all.iter().all(|e| e.category == "nav"));

    let confident = EntryFilter {
        min_confidence: Some(0.8),
        ..Default::default()
    };
    let rows = store.list_by_category("nav", &confident).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|e| e.confidence >= 0.8));

    let mut tags = Tags::new();
    tags.insert("gps".into());
    tags.insert("bridge".into());
    let both = EntryFilter {
        tags,
        ..Default::default()
    };
    let rows = store.list_by_category("nav", &both).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, "heading");
    assert_eq!(rows[0].version, 1);
}

async fn category_listing_respects_limit(store: &dyn KnowledgeStore) {
    for v in 1..=5 {
        store.insert(&entry("nav", "heading", v, "a", "x")).await.unwrap();
    }
    let filter = EntryFilter {
        limit: 2,
        ..Default::default()
    };
    let rows = store.list_by_category("nav", &filter).await.unwrap();
    assert_eq!(versions(&rows), vec![5, 4]);
    assert_eq!(EntryFilter::default().limit, DEFAULT_LIST_LIMIT);
}

async fn category_limit_applies_after_filters(store: &dyn KnowledgeStore) {
    for v in 1..=6 {
        let confidence = if v % 2 == 0 { 0.9 } else { 0.2 };
        let tags: &[&str] = if v <= 2 { &["gps"] } else { &[] };
        store
            .insert(&tagged(entry("nav", "heading", v, "a", "x"), tags, confidence))
            .await
            .unwrap();
    }

    let confident = EntryFilter {
        min_confidence: Some(0.5),
        limit: 2,
        ..Default::default()
    };
    let rows = store.list_by_category("nav", &confident).await.unwrap();
    assert_eq!(versions(&rows), vec![6, 4]);

    let mut tags = Tags::new();
    tags.insert("gps".into());
    let gps = EntryFilter {
        tags,
        limit: 1,
        ..Default::default()
    };
    let rows = store.list_by_category("nav", &gps).await.unwrap();
    assert_eq!(versions(&rows), vec![2]);

    let none = EntryFilter {
        limit: 0,
        ..Default::default()
    };
    assert!(store.list_by_category("nav", &none).await.unwrap().is_empty());
}

async fn instance_since_is_ascending_and_filtered(store: &dyn KnowledgeStore) {
    store.insert(&entry("fuel", "rate", 2, "b", "x")).await.unwrap();
    store.insert(&entry("fuel", "rate", 1, "b", "x")).await.unwrap();
    store.insert(&entry("fuel", "temp", 3, "b", "x")).await.unwrap();
    store.insert(&entry("nav", "heading", 1, "b", "x")).await.unwrap();
    store.insert(&entry("fuel", "level", 1, "a", "x")).await.unwrap();

    let b = InstanceId::new("b");
    let fuel = vec!["fuel".to_string()];

    let rows = store.list_by_instance_since(&b, &fuel, None).await.unwrap();
    assert_eq!(versions(&rows), vec![1, 2, 3]);
    assert!(rows.iter().all(|e| e.source_instance_id == b));

    let rows = store.list_by_instance_since(&b, &fuel, Some(1)).await.unwrap();
    assert_eq!(versions(&rows), vec![2, 3]);

    let rows = store.list_by_instance_since(&b, &[], None).await.unwrap();
    assert_eq!(rows.len(), 4);
}

async fn instance_up_to_bounds_version(store: &dyn KnowledgeStore) {
    for v in 1..=3 {
        store.insert(&entry("fuel", "rate", v, "a", "x")).await.unwrap();
        store.insert(&entry("nav", "heading", v, "a", "x")).await.unwrap();
    }
    let a = InstanceId::new("a");

    let rows = store.list_by_instance_up_to(&a, None, 2).await.unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|e| e.version <= 2));

    let fuel = vec!["fuel".to_string()];
    let rows = store.list_by_instance_up_to(&a, Some(&fuel), 1).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category, "fuel");

    let other = InstanceId::new("z");
    assert!(store.list_by_instance_up_to(&other, None, 9).await.unwrap().is_empty());
}

async fn roundtrip_preserves_every_field(store: &dyn KnowledgeStore) {
    let draft = KnowledgeDraft::json("maintenance", "pump-3", &json!({"hours": 1200}))
        .unwrap()
        .with_confidence(0.65)
        .with_tag("engine-room")
        .with_metadata("inspector", json!({"name": "k", "shift": 2}));
    let original = KnowledgeEntry::from_draft(draft, 1, InstanceId::new("a"), Utc::now());

    store.insert(&original).await.unwrap();
    let loaded = store.get_latest("maintenance", "pump-3").await.unwrap().unwrap();
    assert_eq!(loaded, original);
    assert!(loaded.verify_hash());
}

// ── Backend-specific ─────────────────────────────────────────────

#[tokio::test]
async fn memory_store_unavailable_fails_every_call() {
    let store = MemoryStore::new();
    store.insert(&entry("nav", "heading", 1, "a", "x")).await.unwrap();
    store.set_unavailable(true);

    assert!(matches!(
        store.get_latest("nav", "heading").await,
        Err(StorageError::Unavailable(_))
    ));
    assert!(store.upsert(&entry("nav", "heading", 2, "a", "x")).await.is_err());

    store.set_unavailable(false);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.insert(&entry("nav", "heading", 1, "a", "90")).await.unwrap();
        store.insert(&entry("nav", "heading", 2, "a", "95")).await.unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let latest = store.get_latest("nav", "heading").await.unwrap().unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.value.as_str(), "95");
}

#[tokio::test]
async fn sqlite_store_shares_uniqueness_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.db");
    let first = SqliteStore::open(&path).unwrap();
    let second = SqliteStore::open(&path).unwrap();

    first.insert(&entry("nav", "heading", 1, "a", "90")).await.unwrap();
    let err = second
        .insert(&entry("nav", "heading", 1, "b", "91"))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());
}
