use super::*;
use sf_core::SchemaName;
use sf_db::DuckDbConnector;
use std::sync::Arc;

fn memory_db() -> Database {
    Database::new(Arc::new(DuckDbConnector::in_memory().unwrap()))
}

#[tokio::test]
async fn test_read_is_cached() {
    let cache = VersionCache::new();
    let table = VersionTable::default();
    let mut db = memory_db();
    let mut other = db.try_clone().await.unwrap();

    assert!(!cache.is_version_loaded(&db, &table));
    cache.ensure_table_exists(&mut db, &table).await.unwrap();
    assert!(!cache.is_version_loaded(&db, &table));
    assert_eq!(cache.read_version(&mut db, &table).await.unwrap(), 0);
    assert!(cache.is_version_loaded(&db, &table));

    // Another handle advances the version behind the cache's back.
    table.write_version(&mut other, 5).await.unwrap();
    assert_eq!(cache.read_version(&mut db, &table).await.unwrap(), 0);

    // The locked read is authoritative and refreshes the entry.
    db.begin_transaction().await.unwrap();
    assert_eq!(cache.read_version_with_lock(&mut db, &table).await.unwrap(), 5);
    db.commit().await.unwrap();
    assert_eq!(cache.read_version(&mut db, &table).await.unwrap(), 5);
}

#[tokio::test]
async fn test_write_updates_cache() {
    let cache = VersionCache::new();
    let table = VersionTable::default();
    let mut db = memory_db();
    cache.ensure_table_exists(&mut db, &table).await.unwrap();
    cache.write_version(&mut db, &table, 4).await.unwrap();
    assert!(cache.is_version_loaded(&db, &table));
    assert_eq!(cache.read_version(&mut db, &table).await.unwrap(), 4);

    cache.invalidate(&db, &table);
    assert!(!cache.is_version_loaded(&db, &table));
    assert_eq!(cache.read_version(&mut db, &table).await.unwrap(), 4);
}

#[tokio::test]
async fn test_entries_are_per_database_and_table() {
    let cache = VersionCache::new();
    let table = VersionTable::default();
    let ops = VersionTable::new(Some(SchemaName::try_new("ops").unwrap()), Default::default());
    let mut first = memory_db();
    let mut second = memory_db();

    for db in [&mut first, &mut second] {
        cache.ensure_table_exists(db, &table).await.unwrap();
    }
    cache.write_version(&mut first, &table, 2).await.unwrap();

    assert!(cache.is_version_loaded(&first, &table));
    assert!(!cache.is_version_loaded(&second, &table));
    assert!(!cache.is_version_loaded(&first, &ops));
    assert_eq!(cache.read_version(&mut second, &table).await.unwrap(), 0);
}
