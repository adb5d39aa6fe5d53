//! Error types for sf-migrate

use sf_core::CoreError;
use sf_db::DbError;
use thiserror::Error;

/// Migration errors
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Migrations could not be loaded (M001)
    #[error("[M001] Failed to load migrations: {0}")]
    Source(#[from] CoreError),

    /// Two migrations share a version number (M002)
    #[error("[M002] Duplicate migration version {version}")]
    DuplicateVersion { version: i64 },

    /// The version table could not be created, read, or written (M003)
    #[error("[M003] Version table error on {database}: {source}")]
    VersionTable {
        database: String,
        #[source]
        source: DbError,
    },

    /// A migration failed; its batch was rolled back (M004)
    #[error(
        "[M004] Migration {version} failed on {database} while migrating from version {from_version} to {to_version}: {source}"
    )]
    MigrationFailed {
        database: String,
        version: i64,
        from_version: i64,
        to_version: i64,
        #[source]
        source: DbError,
    },

    /// The run was cancelled before `version` completed (M005)
    #[error("[M005] Migration of {database} cancelled at version {version}")]
    Cancelled { database: String, version: i64 },

    /// Transaction or connection failure outside a migration body (M006)
    #[error("[M006] Database error on {database}: {source}")]
    Database {
        database: String,
        #[source]
        source: DbError,
    },

    /// The blocking entry point could not start its runtime (M007)
    #[error("[M007] Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Result type alias for MigrateError
pub type MigrateResult<T> = Result<T, MigrateError>;

impl MigrateError {
    /// True when the run stopped because of a cancellation request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MigrateError::Cancelled { .. })
    }

    /// Version of the migration that failed or was cancelled, if any
    pub fn failed_version(&self) -> Option<i64> {
        match self {
            MigrateError::MigrationFailed { version, .. }
            | MigrateError::Cancelled { version, .. } => Some(*version),
            _ => None,
        }
    }
}
