//! Error types for sf-db

use std::time::Duration;
use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Table not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    TableNotFound(String),

    /// Object already exists (D004)
    #[error("[D004] Object already exists: {0}")]
    AlreadyExists(String),

    /// Transaction used in the wrong state (D005)
    #[error("[D005] Transaction error: {0}")]
    TransactionError(String),

    /// Mutex poisoned (D006)
    #[error("[D006] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Command or lock wait exceeded its timeout (D007)
    #[error("[D007] Timed out after {after:?}: {what}")]
    Timeout { after: Duration, what: String },

    /// Connection target is empty or unusable (D008)
    #[error("[D008] Invalid connection target: {0}")]
    InvalidTarget(String),

    /// Internal error (D009)
    #[error("[D009] Internal database error: {0}")]
    Internal(String),

    /// Work stopped by a cancellation request (D010)
    #[error("[D010] Operation cancelled")]
    Cancelled,
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error does not expose structured variants, so the catalog
        // message is the only signal. Duplicate-object checks come first since
        // both kinds of message start with "Table with name". A concurrent
        // CREATE of the same entry surfaces as a catalog write-write conflict.
        let msg = err.to_string();
        if msg.contains("already exists") || msg.contains("write-write conflict on create") {
            DbError::AlreadyExists(msg)
        } else if msg.contains("Table with name")
            || msg.contains("View with name")
            || msg.contains("Table or view with name")
            || (msg.contains("Catalog Error") && msg.contains("Table") && msg.contains("not found"))
        {
            DbError::TableNotFound(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}

impl DbError {
    /// True for duplicate-object errors raised by concurrent DDL.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, DbError::AlreadyExists(_))
    }
}
