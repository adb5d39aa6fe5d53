use super::*;
use sf_db::DuckDbConnector;
use std::sync::Arc;

fn memory_db() -> Database {
    Database::new(Arc::new(DuckDbConnector::in_memory().unwrap()))
}

#[test]
fn test_blank_script_rejected() {
    let err = ScriptMigration::new(3, false, "  \n\t").unwrap_err();
    assert!(matches!(err, CoreError::EmptyScript { version: 3 }));
}

#[test]
fn test_script_metadata() {
    let m = ScriptMigration::new(7, true, "SELECT 1").unwrap();
    assert_eq!(m.version(), 7);
    assert!(m.disable_transaction());
    assert_eq!(m.name(), "Migration 7");
    assert_eq!(m.with_name("seed fruit").name(), "seed fruit");
}

#[tokio::test]
async fn test_script_runs_every_batch() {
    let mut db = memory_db();
    let script = "CREATE TABLE fruit (name VARCHAR);\nGO\nINSERT INTO fruit VALUES ('Apple');\ngo\nINSERT INTO fruit VALUES ('Pear');";
    let m = ScriptMigration::new(1, false, script).unwrap();
    m.execute(&mut db, &CancellationToken::new()).await.unwrap();
    assert_eq!(
        db.query_i64("SELECT COUNT(*) FROM fruit").await.unwrap(),
        Some(2)
    );
}

#[tokio::test]
async fn test_script_stops_when_cancelled() {
    let mut db = memory_db();
    let m = ScriptMigration::new(1, false, "CREATE TABLE t (id INT)").unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = m.execute(&mut db, &cancel).await.unwrap_err();
    assert!(matches!(err, DbError::Cancelled));
    assert!(db.query_i64("SELECT COUNT(*) FROM t").await.is_err());
}

#[tokio::test]
async fn test_script_error_surfaces() {
    let mut db = memory_db();
    let m = ScriptMigration::new(1, false, "CREATE TABLE t (id INT)\nGO\nSELEC 1").unwrap();
    let err = m.execute(&mut db, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DbError::ExecutionError(_)), "{err}");
}

#[tokio::test]
async fn test_file_script_read_at_execution() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("1_create.sql");
    let m = ScriptMigration::from_file(1, false, "1_create.sql", &path);

    std::fs::write(&path, "CREATE TABLE t (id INT); INSERT INTO t VALUES (1);").unwrap();
    let mut db = memory_db();
    m.execute(&mut db, &CancellationToken::new()).await.unwrap();
    assert_eq!(db.query_i64("SELECT id FROM t").await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let m = ScriptMigration::from_file(1, false, "gone.sql", dir.path().join("gone.sql"));
    let err = m
        .execute(&mut memory_db(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("gone.sql"));
}

#[tokio::test]
async fn test_fn_migration_runs_body() {
    let m = FnMigration::new(2, false, |db| {
        Box::pin(async move {
            db.execute_batch("CREATE TABLE made_in_rust (id INT)").await?;
            Ok(())
        })
    })
    .with_name("rust body");
    assert_eq!(m.name(), "rust body");
    assert!(format!("{m:?}").contains("rust body"));

    let mut db = memory_db();
    m.execute(&mut db, &CancellationToken::new()).await.unwrap();
    assert_eq!(
        db.query_i64("SELECT COUNT(*) FROM made_in_rust").await.unwrap(),
        Some(0)
    );
}
