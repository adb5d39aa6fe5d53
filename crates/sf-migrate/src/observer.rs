//! Progress callbacks for migration runs.
//!
//! All callbacks default to no-ops, so an observer only implements what it
//! cares about. Callbacks run on the migrating task and must not block.

use crate::migration::Migration;
use std::sync::Arc;

/// Receives progress notifications from a [`Migrator`](crate::Migrator)
pub trait MigrationObserver: Send + Sync {
    /// The migration set was loaded. Called once per migrator.
    fn detected_migrations(&self, _migrations: &[Arc<dyn Migration>], _latest_version: i64) {}

    /// A batch is about to start on `database`.
    fn pre_migration(&self, _database: &str, _from_version: i64, _to_version: i64) {}

    /// The final batch committed and `database` is at `to_version`.
    fn post_migration(&self, _database: &str, _from_version: i64, _to_version: i64) {}

    /// `migration` is about to run.
    fn pre_migration_step(&self, _database: &str, _migration: &dyn Migration) {}

    /// `migration` ran without error (its batch may not be committed yet).
    fn post_migration_step(&self, _database: &str, _migration: &dyn Migration) {}
}

/// Observer that reports progress through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl MigrationObserver for LogObserver {
    fn detected_migrations(&self, migrations: &[Arc<dyn Migration>], latest_version: i64) {
        log::info!(
            "Detected {} migration(s), latest version {latest_version}",
            migrations.len()
        );
    }

    fn pre_migration(&self, database: &str, from_version: i64, to_version: i64) {
        log::info!("Migrating {database} from version {from_version} to {to_version}");
    }

    fn post_migration(&self, database: &str, _from_version: i64, to_version: i64) {
        log::info!("{database} is at version {to_version}");
    }

    fn pre_migration_step(&self, database: &str, migration: &dyn Migration) {
        let name = migration.name();
        if name.is_empty() {
            log::info!("  [{database}] applying {}", migration.version());
        } else {
            log::info!("  [{database}] applying {} ({name})", migration.version());
        }
    }

    fn post_migration_step(&self, database: &str, migration: &dyn Migration) {
        log::debug!("  [{database}] applied {}", migration.version());
    }
}
