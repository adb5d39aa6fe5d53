//! Session handle used by migrations and the version store.
//!
//! A [`Database`] owns at most one connection (opened on first use) and at
//! most one open transaction. Commands run inside the transaction when one is
//! open and un-scoped otherwise. [`Database::try_clone`] produces an
//! independent handle on a fresh connection with no transaction, which is how
//! transaction-disabled migrations are kept out of the surrounding batch.

use crate::error::{DbError, DbResult};
use crate::traits::{Connection, Connector, QueryRows};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default timeout for ordinary commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct Transaction {
    begun_at: Instant,
}

/// A database session: one connection, at most one transaction.
pub struct Database {
    connector: Arc<dyn Connector>,
    conn: Option<Box<dyn Connection>>,
    transaction: Option<Transaction>,
    command_timeout: Option<Duration>,
}

impl Database {
    /// Create a handle for `connector`. No connection is opened yet.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            conn: None,
            transaction: None,
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
        }
    }

    /// Set the default timeout for commands; `None` waits indefinitely.
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Database display name
    pub fn name(&self) -> &str {
        self.connector.database_name()
    }

    /// Process-unique key for the underlying database
    pub fn identity(&self) -> &str {
        self.connector.identity()
    }

    /// Returns true while a transaction is open on this handle
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Returns true once the connection has been opened
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    async fn connection(&mut self) -> DbResult<&mut Box<dyn Connection>> {
        if self.conn.is_none() {
            log::debug!("Opening connection to {}", self.connector.database_name());
            self.conn = Some(self.connector.connect().await?);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::Internal("connection missing after open".to_string()))
    }

    /// Begin a transaction, opening the connection if needed.
    ///
    /// Fails if a transaction is already open on this handle.
    pub async fn begin_transaction(&mut self) -> DbResult<()> {
        if self.transaction.is_some() {
            return Err(DbError::TransactionError(
                "cannot open a transaction twice".to_string(),
            ));
        }
        self.connection().await?.begin().await?;
        self.transaction = Some(Transaction {
            begun_at: Instant::now(),
        });
        log::debug!("BEGIN on {}", self.name());
        Ok(())
    }

    /// Commit the active transaction.
    pub async fn commit(&mut self) -> DbResult<()> {
        let tx = self.transaction.take().ok_or_else(|| {
            DbError::TransactionError("commit without an active transaction".to_string())
        })?;
        self.connection().await?.commit().await?;
        log::debug!(
            "COMMIT on {} after {:?}",
            self.name(),
            tx.begun_at.elapsed()
        );
        Ok(())
    }

    /// Roll back the active transaction.
    pub async fn rollback(&mut self) -> DbResult<()> {
        let tx = self.transaction.take().ok_or_else(|| {
            DbError::TransactionError("rollback without an active transaction".to_string())
        })?;
        self.connection().await?.rollback().await?;
        log::debug!(
            "ROLLBACK on {} after {:?}",
            self.name(),
            tx.begun_at.elapsed()
        );
        Ok(())
    }

    /// Execute a statement with the default timeout, returns affected rows
    pub async fn execute(&mut self, sql: &str) -> DbResult<usize> {
        self.execute_with_timeout(sql, self.command_timeout).await
    }

    /// Execute a statement with an explicit timeout
    pub async fn execute_with_timeout(
        &mut self,
        sql: &str,
        timeout: Option<Duration>,
    ) -> DbResult<usize> {
        let conn = self.connection().await?;
        with_timeout(timeout, sql, conn.execute(sql)).await
    }

    /// Execute several statements with the default timeout
    pub async fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        self.execute_batch_with_timeout(sql, self.command_timeout)
            .await
    }

    /// Execute several statements with an explicit timeout
    pub async fn execute_batch_with_timeout(
        &mut self,
        sql: &str,
        timeout: Option<Duration>,
    ) -> DbResult<()> {
        let conn = self.connection().await?;
        with_timeout(timeout, sql, conn.execute_batch(sql)).await
    }

    /// Read a single integer with the default timeout
    pub async fn query_i64(&mut self, sql: &str) -> DbResult<Option<i64>> {
        self.query_i64_with_timeout(sql, self.command_timeout).await
    }

    /// Read a single integer with an explicit timeout
    pub async fn query_i64_with_timeout(
        &mut self,
        sql: &str,
        timeout: Option<Duration>,
    ) -> DbResult<Option<i64>> {
        let conn = self.connection().await?;
        with_timeout(timeout, sql, conn.query_i64(sql)).await
    }

    /// Read all rows as strings with the default timeout
    pub async fn query_rows(&mut self, sql: &str) -> DbResult<QueryRows> {
        let timeout = self.command_timeout;
        let conn = self.connection().await?;
        with_timeout(timeout, sql, conn.query_rows(sql)).await
    }

    /// Take an exclusive lock on `table` for the rest of the transaction.
    pub async fn lock_table(&mut self, table: &str, timeout: Option<Duration>) -> DbResult<()> {
        if self.transaction.is_none() {
            return Err(DbError::TransactionError(format!(
                "lock on {table} requires an active transaction"
            )));
        }
        let conn = self.connection().await?;
        let what = format!("waiting for lock on {table}");
        with_timeout(timeout, &what, conn.lock_table(table)).await
    }

    /// Open a new handle on a fresh connection to the same database, with no
    /// transaction.
    pub async fn try_clone(&mut self) -> DbResult<Database> {
        let mut clone = Database {
            connector: Arc::clone(&self.connector),
            conn: None,
            transaction: None,
            command_timeout: self.command_timeout,
        };
        clone.connection().await?;
        Ok(clone)
    }

    /// Roll back any open transaction and release the connection.
    pub async fn close(mut self) -> DbResult<()> {
        if self.transaction.is_some() {
            self.rollback().await?;
        }
        self.conn = None;
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            // The connection rolls back on drop.
            log::debug!(
                "Database handle for {} dropped with an open transaction",
                self.connector.database_name()
            );
        }
    }
}

async fn with_timeout<T, F>(timeout: Option<Duration>, what: &str, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match timeout {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| DbError::Timeout {
                after,
                what: summarize(what),
            })?,
        None => fut.await,
    }
}

/// First line of a command, shortened for error messages.
fn summarize(sql: &str) -> String {
    const MAX: usize = 80;
    let line = sql.trim().lines().next().unwrap_or_default();
    if line.chars().count() > MAX {
        let cut: String = line.chars().take(MAX).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
#[path = "database_test.rs"]
mod tests;
