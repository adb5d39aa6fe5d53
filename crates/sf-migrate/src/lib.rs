//! sf-migrate - Migration engine for Stepflow
//!
//! This crate loads versioned migrations from a [`MigrationSource`], records
//! the applied version in a per-database [`VersionTable`], and runs pending
//! migrations in transactional batches through the [`Migrator`].

pub mod error;
pub mod migration;
pub mod migrator;
pub mod observer;
pub mod source;
pub mod version_cache;
pub mod version_store;

pub use error::{MigrateError, MigrateResult};
pub use migration::{FnMigration, Migration, MigrationFuture, ScriptMigration};
pub use migrator::{MigrateOptions, MigrationOutcome, MigrationSet, MigrationStatus, Migrator};
pub use observer::{LogObserver, MigrationObserver};
pub use source::{DirectorySource, EmbeddedSource, ListSource, MigrationSource};
pub use version_cache::VersionCache;
pub use version_store::VersionTable;

// Callers cancel runs with this token type.
pub use tokio_util::sync::CancellationToken;
