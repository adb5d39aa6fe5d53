//! Connection trait definitions

use crate::error::DbResult;
use async_trait::async_trait;

/// Column names and stringified values returned by a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A single open connection to a database.
///
/// Transaction state is connection-scoped: between [`begin`](Self::begin)
/// and [`commit`](Self::commit)/[`rollback`](Self::rollback) every statement
/// runs inside that transaction.
#[async_trait]
pub trait Connection: Send {
    /// Execute a single statement, returns affected rows
    async fn execute(&mut self, sql: &str) -> DbResult<usize>;

    /// Execute multiple statements
    async fn execute_batch(&mut self, sql: &str) -> DbResult<()>;

    /// First column of the first row as an integer; `None` for no rows or NULL
    async fn query_i64(&mut self, sql: &str) -> DbResult<Option<i64>>;

    /// All rows, every value rendered as a string
    async fn query_rows(&mut self, sql: &str) -> DbResult<QueryRows>;

    /// Start a transaction
    async fn begin(&mut self) -> DbResult<()>;

    /// Commit the active transaction and release any table locks
    async fn commit(&mut self) -> DbResult<()>;

    /// Roll back the active transaction and release any table locks
    async fn rollback(&mut self) -> DbResult<()>;

    /// Take an exclusive lock on `table` that is held until the active
    /// transaction commits or rolls back. Waits while another transaction
    /// holds it.
    async fn lock_table(&mut self, table: &str) -> DbResult<()>;
}

/// Factory for connections to one database target.
///
/// Every connection handed out refers to the same database, so a handle can be
/// cloned onto a fresh connection without changing what it talks to.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new, independent connection
    async fn connect(&self) -> DbResult<Box<dyn Connection>>;

    /// Human-readable database name, used in logs and notifications
    fn database_name(&self) -> &str;

    /// Stable key identifying this database within the process
    fn identity(&self) -> &str;
}
