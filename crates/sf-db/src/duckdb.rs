//! DuckDB database backend implementation
//!
//! A [`DuckDbConnector`] opens the database once and hands out connections
//! with `try_clone`, so every connection (including `:memory:` ones) sees the
//! same instance. DuckDB has no lock hints, so `lock_table` is served by an
//! async mutex per table that is held by the connection until its transaction
//! ends.
//!
//! File databases are opened at most once per process: connectors created for
//! the same canonical path share one instance and one set of table locks, so
//! independently built connectors still exclude each other.

use crate::error::{DbError, DbResult};
use crate::row_helpers::execute_and_collect;
use crate::traits::{Connection, Connector, QueryRows};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Target string for an in-memory database
pub const MEMORY_TARGET: &str = ":memory:";

type TableLocks = DashMap<String, Arc<AsyncMutex<()>>>;

/// Open file databases, keyed by canonical path.
static OPEN_FILES: OnceLock<DashMap<String, Weak<SharedInstance>>> = OnceLock::new();

fn open_files() -> &'static DashMap<String, Weak<SharedInstance>> {
    OPEN_FILES.get_or_init(DashMap::new)
}

/// One open DuckDB instance and the table locks of its connections.
struct SharedInstance {
    root: Mutex<duckdb::Connection>,
    identity: String,
    table_locks: Arc<TableLocks>,
}

impl SharedInstance {
    fn new(root: duckdb::Connection, identity: String) -> Arc<Self> {
        Arc::new(Self {
            root: Mutex::new(root),
            identity,
            table_locks: Arc::new(DashMap::new()),
        })
    }

    fn open_file(path: &Path, identity: String) -> DbResult<Arc<Self>> {
        let conn = duckdb::Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        log::debug!("Opened DuckDB database {identity}");
        Ok(Self::new(conn, identity))
    }
}

impl Drop for SharedInstance {
    fn drop(&mut self) {
        if let Some(files) = OPEN_FILES.get() {
            files.remove_if(&self.identity, |_, open| open.strong_count() == 0);
        }
    }
}

/// Canonical form of `path`, resolving the parent directory when the file
/// does not exist yet.
fn canonical_identity(path: &Path) -> String {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved.display().to_string();
    }
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match (std::fs::canonicalize(parent), path.file_name()) {
        (Ok(dir), Some(file)) => dir.join(file).display().to_string(),
        _ => path.display().to_string(),
    }
}

/// DuckDB database backend
pub struct DuckDbConnector {
    shared: Arc<SharedInstance>,
    name: String,
}

impl DuckDbConnector {
    /// Create a new in-memory DuckDB database
    pub fn in_memory() -> DbResult<Self> {
        let conn = duckdb::Connection::open_in_memory()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        // Each in-memory instance is a distinct database, so it needs its own
        // identity for anything keyed on it.
        let identity = format!("memory:{}", uuid::Uuid::new_v4());
        Ok(Self {
            shared: SharedInstance::new(conn, identity),
            name: "memory".to_string(),
        })
    }

    /// Open (or create) a DuckDB database file, reusing the instance already
    /// open in this process for the same file.
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let identity = canonical_identity(path);
        let shared = match open_files().entry(identity.clone()) {
            Entry::Occupied(mut entry) => {
                let live = entry.get().upgrade();
                match live {
                    Some(shared) => shared,
                    None => {
                        let shared = SharedInstance::open_file(path, identity)?;
                        entry.insert(Arc::downgrade(&shared));
                        shared
                    }
                }
            }
            Entry::Vacant(entry) => {
                let shared = SharedInstance::open_file(path, identity)?;
                entry.insert(Arc::downgrade(&shared));
                shared
            }
        };
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { shared, name })
    }

    /// Create from a target string (handles the `:memory:` special case)
    pub fn new(target: &str) -> DbResult<Self> {
        let target = target.trim();
        if target.is_empty() {
            return Err(DbError::InvalidTarget(
                "connection target must not be empty".to_string(),
            ));
        }
        if target == MEMORY_TARGET {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(target))
        }
    }
}

#[async_trait]
impl Connector for DuckDbConnector {
    async fn connect(&self) -> DbResult<Box<dyn Connection>> {
        let conn = {
            let root = self
                .shared
                .root
                .lock()
                .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
            root.try_clone()
                .map_err(|e| DbError::ConnectionError(e.to_string()))?
        };
        Ok(Box::new(DuckDbConnection {
            conn,
            table_locks: Arc::clone(&self.shared.table_locks),
            held_locks: Vec::new(),
            state: TxState::Idle,
        }))
    }

    fn database_name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> &str {
        &self.shared.identity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Idle,
    /// `begin` was called but `BEGIN` has not been sent yet. Sending it lazily
    /// lets `lock_table` run before the transaction takes its snapshot, so the
    /// first read after the lock sees everything committed by the previous
    /// holder.
    Pending,
    Active,
}

/// One connection cloned from a [`DuckDbConnector`]
pub struct DuckDbConnection {
    conn: duckdb::Connection,
    table_locks: Arc<TableLocks>,
    held_locks: Vec<(String, OwnedMutexGuard<()>)>,
    state: TxState,
}

impl DuckDbConnection {
    fn ensure_begun(&mut self) -> DbResult<()> {
        if self.state == TxState::Pending {
            self.conn.execute_batch("BEGIN TRANSACTION")?;
            self.state = TxState::Active;
        }
        Ok(())
    }

    fn release_locks(&mut self) {
        if !self.held_locks.is_empty() {
            log::debug!("Releasing {} table lock(s)", self.held_locks.len());
        }
        self.held_locks.clear();
        self.state = TxState::Idle;
    }
}

#[async_trait]
impl Connection for DuckDbConnection {
    async fn execute(&mut self, sql: &str) -> DbResult<usize> {
        self.ensure_begun()?;
        Ok(self.conn.execute(sql, [])?)
    }

    async fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        self.ensure_begun()?;
        Ok(self.conn.execute_batch(sql)?)
    }

    async fn query_i64(&mut self, sql: &str) -> DbResult<Option<i64>> {
        self.ensure_begun()?;
        match self
            .conn
            .query_row(sql, [], |row| row.get::<_, Option<i64>>(0))
        {
            Ok(value) => Ok(value),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn query_rows(&mut self, sql: &str) -> DbResult<QueryRows> {
        self.ensure_begun()?;
        let mut stmt = self.conn.prepare(sql)?;
        execute_and_collect(&mut stmt)
    }

    async fn begin(&mut self) -> DbResult<()> {
        if self.state != TxState::Idle {
            return Err(DbError::TransactionError(
                "a transaction is already active on this connection".to_string(),
            ));
        }
        self.state = TxState::Pending;
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        let result = match self.state {
            TxState::Idle => {
                return Err(DbError::TransactionError(
                    "commit without an active transaction".to_string(),
                ))
            }
            TxState::Pending => Ok(()),
            TxState::Active => match self.conn.execute_batch("COMMIT") {
                Ok(()) => Ok(()),
                Err(commit_err) => {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    Err(DbError::TransactionError(format!(
                        "COMMIT failed: {commit_err}"
                    )))
                }
            },
        };
        self.release_locks();
        result
    }

    async fn rollback(&mut self) -> DbResult<()> {
        let result = match self.state {
            TxState::Idle => {
                return Err(DbError::TransactionError(
                    "rollback without an active transaction".to_string(),
                ))
            }
            TxState::Pending => Ok(()),
            TxState::Active => self
                .conn
                .execute_batch("ROLLBACK")
                .map_err(|e| DbError::TransactionError(format!("ROLLBACK failed: {e}"))),
        };
        self.release_locks();
        result
    }

    async fn lock_table(&mut self, table: &str) -> DbResult<()> {
        if self.state == TxState::Idle {
            return Err(DbError::TransactionError(format!(
                "lock on {table} requires an active transaction"
            )));
        }
        let key = table.to_ascii_lowercase();
        if self.held_locks.iter().any(|(held, _)| *held == key) {
            return Ok(());
        }

        let lock = Arc::clone(self.table_locks.entry(key.clone()).or_default().value());
        let guard = lock.lock_owned().await;
        log::debug!("Acquired table lock on {table}");
        self.held_locks.push((key, guard));
        Ok(())
    }
}

impl Drop for DuckDbConnection {
    fn drop(&mut self) {
        if self.state == TxState::Active {
            log::debug!("Connection dropped with an open transaction, rolling back");
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
