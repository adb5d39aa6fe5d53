use super::*;
use std::time::Duration;

async fn count(conn: &mut Box<dyn Connection>, sql: &str) -> i64 {
    conn.query_i64(sql).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_in_memory() {
    let connector = DuckDbConnector::in_memory().unwrap();
    assert_eq!(connector.database_name(), "memory");
    assert!(connector.identity().starts_with("memory:"));
}

#[tokio::test]
async fn test_in_memory_identities_are_unique() {
    let a = DuckDbConnector::in_memory().unwrap();
    let b = DuckDbConnector::in_memory().unwrap();
    assert_ne!(a.identity(), b.identity());
}

#[tokio::test]
async fn test_empty_target_rejected() {
    let err = DuckDbConnector::new("   ").err().unwrap();
    assert!(matches!(err, DbError::InvalidTarget(_)));
}

#[tokio::test]
async fn test_file_target_name_and_identity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.duckdb");
    let connector = DuckDbConnector::new(path.to_str().unwrap()).unwrap();
    assert_eq!(connector.database_name(), "orders");
    assert!(connector.identity().ends_with("orders.duckdb"));
    assert!(path.exists());
}

#[tokio::test]
async fn test_connectors_on_one_file_share_instance_and_locks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.duckdb");
    let first = DuckDbConnector::from_path(&path).unwrap();
    // A relative spelling of the same file resolves to the same instance.
    let second = DuckDbConnector::from_path(&dir.path().join(".").join("shared.duckdb")).unwrap();
    assert_eq!(first.identity(), second.identity());

    let mut writer = first.connect().await.unwrap();
    let mut reader = second.connect().await.unwrap();
    writer
        .execute_batch("CREATE TABLE t (id INT); INSERT INTO t VALUES (1);")
        .await
        .unwrap();
    assert_eq!(count(&mut reader, "SELECT COUNT(*) FROM t").await, 1);

    writer.begin().await.unwrap();
    writer.lock_table("DatabaseVersion").await.unwrap();
    reader.begin().await.unwrap();
    let blocked =
        tokio::time::timeout(Duration::from_millis(100), reader.lock_table("DatabaseVersion"))
            .await;
    assert!(blocked.is_err(), "lock must be shared across connectors");
    writer.commit().await.unwrap();
    reader.rollback().await.unwrap();
}

#[tokio::test]
async fn test_file_reopened_after_last_connector_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reopen.duckdb");
    {
        let connector = DuckDbConnector::from_path(&path).unwrap();
        let mut conn = connector.connect().await.unwrap();
        conn.execute_batch("CREATE TABLE kept (id INT); INSERT INTO kept VALUES (7);")
            .await
            .unwrap();
    }
    let identity = canonical_identity(&path);
    assert!(!open_files().contains_key(&identity));

    let connector = DuckDbConnector::from_path(&path).unwrap();
    let mut conn = connector.connect().await.unwrap();
    assert_eq!(count(&mut conn, "SELECT MAX(id) FROM kept").await, 7);
}

#[tokio::test]
async fn test_connections_share_in_memory_instance() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut first = connector.connect().await.unwrap();
    let mut second = connector.connect().await.unwrap();

    first
        .execute_batch("CREATE TABLE shared (id INT); INSERT INTO shared VALUES (1), (2);")
        .await
        .unwrap();
    assert_eq!(count(&mut second, "SELECT COUNT(*) FROM shared").await, 2);
}

#[tokio::test]
async fn test_execute_returns_row_count() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut conn = connector.connect().await.unwrap();
    conn.execute_batch("CREATE TABLE t (id INT); INSERT INTO t VALUES (1), (2), (3);")
        .await
        .unwrap();
    assert_eq!(conn.execute("UPDATE t SET id = id + 1").await.unwrap(), 3);
    assert_eq!(conn.execute("DELETE FROM t WHERE id > 100").await.unwrap(), 0);
}

#[tokio::test]
async fn test_query_i64_no_rows_and_null() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut conn = connector.connect().await.unwrap();
    conn.execute_batch("CREATE TABLE t (v BIGINT)").await.unwrap();
    assert_eq!(conn.query_i64("SELECT v FROM t").await.unwrap(), None);
    assert_eq!(conn.query_i64("SELECT MAX(v) FROM t").await.unwrap(), None);
    assert_eq!(conn.query_i64("SELECT 42").await.unwrap(), Some(42));
}

#[tokio::test]
async fn test_query_rows_as_strings() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut conn = connector.connect().await.unwrap();
    let rows = conn
        .query_rows("SELECT 1 AS id, 'apple' AS name UNION ALL SELECT 2, 'pear' ORDER BY id")
        .await
        .unwrap();
    assert_eq!(rows.columns, vec!["id", "name"]);
    assert_eq!(
        rows.rows,
        vec![
            vec!["1".to_string(), "apple".to_string()],
            vec!["2".to_string(), "pear".to_string()]
        ]
    );
}

#[tokio::test]
async fn test_error_classification() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut conn = connector.connect().await.unwrap();

    let missing = conn.query_i64("SELECT COUNT(*) FROM nope").await.unwrap_err();
    assert!(matches!(missing, DbError::TableNotFound(_)), "{missing}");

    conn.execute_batch("CREATE TABLE dup (id INT)").await.unwrap();
    let dup = conn.execute_batch("CREATE TABLE dup (id INT)").await.unwrap_err();
    assert!(dup.is_already_exists(), "{dup}");

    conn.execute_batch("CREATE SCHEMA ops").await.unwrap();
    let dup_schema = conn.execute_batch("CREATE SCHEMA ops").await.unwrap_err();
    assert!(dup_schema.is_already_exists(), "{dup_schema}");

    let syntax = conn.execute_batch("SELEC 1").await.unwrap_err();
    assert!(matches!(syntax, DbError::ExecutionError(_)), "{syntax}");
}

#[tokio::test]
async fn test_rollback_discards_changes() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut conn = connector.connect().await.unwrap();
    conn.execute_batch("CREATE TABLE t (id INT)").await.unwrap();

    conn.begin().await.unwrap();
    conn.execute("INSERT INTO t VALUES (1)").await.unwrap();
    conn.rollback().await.unwrap();

    assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM t").await, 0);
}

#[tokio::test]
async fn test_double_begin_rejected() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut conn = connector.connect().await.unwrap();
    conn.begin().await.unwrap();
    assert!(matches!(
        conn.begin().await.unwrap_err(),
        DbError::TransactionError(_)
    ));
}

#[tokio::test]
async fn test_commit_without_transaction_rejected() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut conn = connector.connect().await.unwrap();
    assert!(conn.commit().await.is_err());
    assert!(conn.rollback().await.is_err());
}

#[tokio::test]
async fn test_lock_table_requires_transaction() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut conn = connector.connect().await.unwrap();
    assert!(matches!(
        conn.lock_table("DatabaseVersion").await.unwrap_err(),
        DbError::TransactionError(_)
    ));
}

#[tokio::test]
async fn test_lock_table_is_reentrant_within_transaction() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut conn = connector.connect().await.unwrap();
    conn.begin().await.unwrap();
    conn.lock_table("DatabaseVersion").await.unwrap();
    conn.lock_table("databaseversion").await.unwrap();
    conn.commit().await.unwrap();
}

#[tokio::test]
async fn test_lock_table_blocks_until_commit() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut holder = connector.connect().await.unwrap();
    let mut waiter = connector.connect().await.unwrap();

    holder.begin().await.unwrap();
    holder.lock_table("DatabaseVersion").await.unwrap();

    waiter.begin().await.unwrap();
    let blocked =
        tokio::time::timeout(Duration::from_millis(100), waiter.lock_table("DatabaseVersion"))
            .await;
    assert!(blocked.is_err(), "second lock should wait for the holder");

    holder.commit().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), waiter.lock_table("DatabaseVersion"))
        .await
        .expect("lock should be released by commit")
        .unwrap();
    waiter.rollback().await.unwrap();
}

#[tokio::test]
async fn test_lock_released_when_connection_dropped() {
    let connector = DuckDbConnector::in_memory().unwrap();
    {
        let mut holder = connector.connect().await.unwrap();
        holder.begin().await.unwrap();
        holder.lock_table("DatabaseVersion").await.unwrap();
    }
    let mut next = connector.connect().await.unwrap();
    next.begin().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), next.lock_table("DatabaseVersion"))
        .await
        .expect("dropped connection must release its lock")
        .unwrap();
}

#[tokio::test]
async fn test_reads_after_lock_see_previous_holder_commit() {
    let connector = DuckDbConnector::in_memory().unwrap();
    let mut setup = connector.connect().await.unwrap();
    setup
        .execute_batch("CREATE TABLE v (n BIGINT); INSERT INTO v VALUES (0);")
        .await
        .unwrap();

    let mut first = connector.connect().await.unwrap();
    let mut second = connector.connect().await.unwrap();

    first.begin().await.unwrap();
    first.lock_table("v").await.unwrap();
    second.begin().await.unwrap();

    first.execute("UPDATE v SET n = 7").await.unwrap();
    first.commit().await.unwrap();

    second.lock_table("v").await.unwrap();
    assert_eq!(count(&mut second, "SELECT n FROM v").await, 7);
    second.commit().await.unwrap();
}
