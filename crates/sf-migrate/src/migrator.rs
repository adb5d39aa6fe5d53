//! Migration orchestration.
//!
//! The [`Migrator`] loads its migration set once, then for each database:
//! ensures the version table exists, checks the (cached) version, and if work
//! is pending runs transactional batches until nothing is left. Every batch
//! starts with a locked read of the version table, so concurrent migrators
//! sharing a connector apply each migration at most once.
//!
//! A transaction-disabled migration always ends a batch. When it is first in
//! line it runs alone on a cloned, transaction-free handle; otherwise the
//! batch commits just before it and the next batch picks it up.

use crate::error::{MigrateError, MigrateResult};
use crate::migration::Migration;
use crate::observer::MigrationObserver;
use crate::source::{DirectorySource, MigrationSource};
use crate::version_cache::VersionCache;
use crate::version_store::{VersionTable, DEFAULT_LOCK_TIMEOUT};
use serde::Serialize;
use sf_core::{SchemaName, TableName};
use sf_db::database::DEFAULT_COMMAND_TIMEOUT;
use sf_db::{Connector, Database, DbError, DbResult, DuckDbConnector};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// All migrations known to a migrator, sorted by version
#[derive(Clone, Default)]
pub struct MigrationSet {
    migrations: Vec<Arc<dyn Migration>>,
    latest_version: i64,
}

impl MigrationSet {
    /// Sort `migrations` by version. Two migrations with the same version
    /// are rejected.
    pub fn new(mut migrations: Vec<Arc<dyn Migration>>) -> MigrateResult<Self> {
        migrations.sort_by_key(|m| m.version());
        if let Some(pair) = migrations
            .windows(2)
            .find(|pair| pair[0].version() == pair[1].version())
        {
            return Err(MigrateError::DuplicateVersion {
                version: pair[0].version(),
            });
        }
        let latest_version = migrations.last().map_or(0, |m| m.version());
        Ok(Self {
            migrations,
            latest_version,
        })
    }

    pub fn migrations(&self) -> &[Arc<dyn Migration>] {
        &self.migrations
    }

    /// Highest version in the set, 0 when empty
    pub fn latest_version(&self) -> i64 {
        self.latest_version
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Migrations with a version above `current`, in ascending order
    pub fn pending(&self, current: i64) -> &[Arc<dyn Migration>] {
        let start = self.migrations.partition_point(|m| m.version() <= current);
        &self.migrations[start..]
    }
}

impl std::fmt::Debug for MigrationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let versions: Vec<i64> = self.migrations.iter().map(|m| m.version()).collect();
        f.debug_struct("MigrationSet")
            .field("versions", &versions)
            .field("latest_version", &self.latest_version)
            .finish()
    }
}

/// Per-call settings for a migration run
#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    /// Schema holding the version table; overrides the migrator's default
    pub schema: Option<SchemaName>,
    /// Checked before every migration step
    pub cancel: CancellationToken,
}

/// What a migration run did to one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
    pub database: String,
    pub from_version: i64,
    pub to_version: i64,
    /// Versions applied by this run, in order; empty when nothing ran
    pub applied: Vec<i64>,
}

impl MigrationOutcome {
    fn up_to_date(database: String, version: i64) -> Self {
        Self {
            database,
            from_version: version,
            to_version: version,
            applied: Vec::new(),
        }
    }

    /// True when the run applied nothing
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Read-only report of a database's migration state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub database: String,
    pub current_version: i64,
    pub latest_version: i64,
    pub pending: Vec<i64>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchStep {
    Continue,
    Done,
}

/// Versions seen and applied across the batches of one run
#[derive(Debug)]
struct RunProgress {
    from_version: Option<i64>,
    to_version: i64,
    applied: Vec<i64>,
}

impl RunProgress {
    fn new(version: i64) -> Self {
        Self {
            from_version: None,
            to_version: version,
            applied: Vec::new(),
        }
    }

    /// Record the version read under lock at the start of a batch.
    fn observe(&mut self, version: i64) {
        self.from_version.get_or_insert(version);
        self.to_version = version;
    }

    /// Record versions whose batch has committed.
    fn committed(&mut self, versions: impl IntoIterator<Item = i64>) {
        for version in versions {
            self.to_version = version;
            self.applied.push(version);
        }
    }

    fn into_outcome(self, database: String) -> MigrationOutcome {
        MigrationOutcome {
            database,
            from_version: self.from_version.unwrap_or(self.to_version),
            to_version: self.to_version,
            applied: self.applied,
        }
    }
}

/// Applies a migration set to databases
pub struct Migrator {
    source: Box<dyn MigrationSource>,
    observer: Option<Arc<dyn MigrationObserver>>,
    schema: Option<SchemaName>,
    version_table: TableName,
    command_timeout: Option<Duration>,
    lock_timeout: Duration,
    cache: VersionCache,
    loaded: OnceLock<MigrationSet>,
    load_lock: Mutex<()>,
}

impl Migrator {
    pub fn new(source: impl MigrationSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            observer: None,
            schema: None,
            version_table: TableName::default(),
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            cache: VersionCache::new(),
            loaded: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    /// Migrator over the `.sql` files in `dir`
    pub fn from_directory(dir: impl Into<PathBuf>) -> Self {
        Self::new(DirectorySource::new(dir))
    }

    pub fn with_observer(mut self, observer: Arc<dyn MigrationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Default schema for the version table
    pub fn with_schema(mut self, schema: SchemaName) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_version_table(mut self, table: TableName) -> Self {
        self.version_table = table;
        self
    }

    /// Timeout for version-table commands; `None` waits indefinitely.
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// How long a batch waits for another migrator's lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Shared version cache, for diagnostics
    pub fn cache(&self) -> &VersionCache {
        &self.cache
    }

    /// Resolve, sort and check the migration set, once.
    ///
    /// A failed load is not remembered; the next call resolves again.
    pub fn load(&self) -> MigrateResult<&MigrationSet> {
        if let Some(set) = self.loaded.get() {
            return Ok(set);
        }
        // The guard protects no data, so a poisoned lock is still usable.
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(set) = self.loaded.get() {
            return Ok(set);
        }

        let set = MigrationSet::new(self.source.resolve()?)?;
        log::debug!(
            "Loaded {} migration(s), latest version {}",
            set.len(),
            set.latest_version()
        );
        self.notify(|o| o.detected_migrations(set.migrations(), set.latest_version()));
        Ok(self.loaded.get_or_init(|| set))
    }

    /// Bring the database behind `connector` up to the latest version.
    pub async fn migrate(&self, connector: Arc<dyn Connector>) -> MigrateResult<MigrationOutcome> {
        self.migrate_with_options(connector, &MigrateOptions::default())
            .await
    }

    /// Like [`migrate`](Self::migrate), stopping before the next migration
    /// step once `cancel` fires.
    pub async fn migrate_with_cancel(
        &self,
        connector: Arc<dyn Connector>,
        cancel: &CancellationToken,
    ) -> MigrateResult<MigrationOutcome> {
        let options = MigrateOptions {
            cancel: cancel.clone(),
            ..MigrateOptions::default()
        };
        self.migrate_with_options(connector, &options).await
    }

    /// Synchronous [`migrate`](Self::migrate) on a private current-thread
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime.
    pub fn migrate_blocking(&self, connector: Arc<dyn Connector>) -> MigrateResult<MigrationOutcome> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(MigrateError::Runtime)?;
        runtime.block_on(self.migrate(connector))
    }

    /// Open a DuckDB database (a file path or `:memory:`) and migrate it.
    pub async fn migrate_target(&self, target: &str) -> MigrateResult<MigrationOutcome> {
        let connector = DuckDbConnector::new(target).map_err(|source| MigrateError::Database {
            database: target.to_string(),
            source,
        })?;
        self.migrate(Arc::new(connector)).await
    }

    pub async fn migrate_with_options(
        &self,
        connector: Arc<dyn Connector>,
        options: &MigrateOptions,
    ) -> MigrateResult<MigrationOutcome> {
        let set = self.load()?;
        let table = self.version_table_for(options.schema.as_ref());
        let mut db = Database::new(connector).with_command_timeout(self.command_timeout);
        let database = db.name().to_string();

        let current = self
            .read_current_version(&mut db, &table)
            .await
            .map_err(|source| MigrateError::VersionTable {
                database: database.clone(),
                source,
            })?;
        if current >= set.latest_version() {
            log::debug!("{database} is up to date at version {current}");
            return Ok(MigrationOutcome::up_to_date(database, current));
        }

        let mut progress = RunProgress::new(current);
        while self
            .run_batch(&mut db, &database, set, &table, &options.cancel, &mut progress)
            .await?
            == BatchStep::Continue
        {}

        let outcome = progress.into_outcome(database);
        if !outcome.is_noop() {
            log::debug!(
                "Applied {} migration(s) to {}, now at version {}",
                outcome.applied.len(),
                outcome.database,
                outcome.to_version
            );
        }
        Ok(outcome)
    }

    /// Report the current and pending versions without changing anything.
    pub async fn status(&self, connector: Arc<dyn Connector>) -> MigrateResult<MigrationStatus> {
        self.status_with_options(connector, &MigrateOptions::default())
            .await
    }

    pub async fn status_with_options(
        &self,
        connector: Arc<dyn Connector>,
        options: &MigrateOptions,
    ) -> MigrateResult<MigrationStatus> {
        let set = self.load()?;
        let table = self.version_table_for(options.schema.as_ref());
        let mut db = Database::new(connector).with_command_timeout(self.command_timeout);
        let database = db.name().to_string();

        // Always read from the database; a status report must not be stale.
        let current = match table.exists(&mut db).await {
            Ok(true) => table.read_version(&mut db).await,
            Ok(false) => Ok(0),
            Err(e) => Err(e),
        }
        .map_err(|source| MigrateError::VersionTable {
            database: database.clone(),
            source,
        })?;

        Ok(MigrationStatus {
            database,
            current_version: current,
            latest_version: set.latest_version(),
            pending: set.pending(current).iter().map(|m| m.version()).collect(),
        })
    }

    fn version_table_for(&self, schema: Option<&SchemaName>) -> VersionTable {
        VersionTable::new(
            schema.or(self.schema.as_ref()).cloned(),
            self.version_table.clone(),
        )
        .with_lock_timeout(Some(self.lock_timeout))
    }

    async fn read_current_version(&self, db: &mut Database, table: &VersionTable) -> DbResult<i64> {
        self.cache.ensure_table_exists(db, table).await?;
        self.cache.read_version(db, table).await
    }

    /// Run one batch inside its own transaction, rolling back on any error.
    async fn run_batch(
        &self,
        db: &mut Database,
        database: &str,
        set: &MigrationSet,
        table: &VersionTable,
        cancel: &CancellationToken,
        progress: &mut RunProgress,
    ) -> MigrateResult<BatchStep> {
        db.begin_transaction()
            .await
            .map_err(|source| MigrateError::Database {
                database: database.to_string(),
                source,
            })?;

        let result = self
            .apply_batch(db, database, set, table, cancel, progress)
            .await;
        if result.is_err() {
            // Writes made in this batch are gone once it rolls back.
            self.cache.invalidate(db, table);
            if db.in_transaction() {
                if let Err(e) = db.rollback().await {
                    log::warn!("Rollback on {database} failed: {e}");
                }
            }
        }
        result
    }

    async fn apply_batch(
        &self,
        db: &mut Database,
        database: &str,
        set: &MigrationSet,
        table: &VersionTable,
        cancel: &CancellationToken,
        progress: &mut RunProgress,
    ) -> MigrateResult<BatchStep> {
        let db_err = |source| MigrateError::Database {
            database: database.to_string(),
            source,
        };
        let table_err = |source| MigrateError::VersionTable {
            database: database.to_string(),
            source,
        };
        let latest = set.latest_version();

        let version = self
            .cache
            .read_version_with_lock(db, table)
            .await
            .map_err(table_err)?;
        progress.observe(version);
        if version >= latest {
            db.commit().await.map_err(db_err)?;
            log::debug!("{database} already migrated to version {version} by another migrator");
            return Ok(BatchStep::Done);
        }

        self.notify(|o| o.pre_migration(database, version, latest));
        let pending = set.pending(version);

        if let Some(first) = pending.first().filter(|m| m.disable_transaction()) {
            check_cancelled(cancel, database, first.version())?;
            self.notify(|o| o.pre_migration_step(database, first.as_ref()));
            let mut isolated = db.try_clone().await.map_err(db_err)?;
            first
                .execute(&mut isolated, cancel)
                .await
                .map_err(|e| step_error(database, first.version(), version, latest, e))?;
            drop(isolated);
            self.notify(|o| o.post_migration_step(database, first.as_ref()));

            self.cache
                .write_version(db, table, first.version())
                .await
                .map_err(table_err)?;
            db.commit().await.map_err(db_err)?;
            progress.committed([first.version()]);

            if pending.len() == 1 {
                self.notify(|o| o.post_migration(database, version, latest));
                return Ok(BatchStep::Done);
            }
            return Ok(BatchStep::Continue);
        }

        let mut applied = Vec::new();
        for migration in pending {
            if migration.disable_transaction() {
                db.commit().await.map_err(db_err)?;
                progress.committed(applied);
                log::debug!(
                    "Committed batch on {database} ahead of non-transactional migration {}",
                    migration.version()
                );
                return Ok(BatchStep::Continue);
            }

            check_cancelled(cancel, database, migration.version())?;
            self.notify(|o| o.pre_migration_step(database, migration.as_ref()));
            migration
                .execute(db, cancel)
                .await
                .map_err(|e| step_error(database, migration.version(), version, latest, e))?;
            self.notify(|o| o.post_migration_step(database, migration.as_ref()));

            if migration.version() > version {
                self.cache
                    .write_version(db, table, migration.version())
                    .await
                    .map_err(table_err)?;
            }
            applied.push(migration.version());
        }

        db.commit().await.map_err(db_err)?;
        progress.committed(applied);
        self.notify(|o| o.post_migration(database, version, latest));
        Ok(BatchStep::Done)
    }

    fn notify(&self, event: impl FnOnce(&dyn MigrationObserver)) {
        if let Some(observer) = &self.observer {
            event(observer.as_ref());
        }
    }
}

fn check_cancelled(cancel: &CancellationToken, database: &str, version: i64) -> MigrateResult<()> {
    if cancel.is_cancelled() {
        log::warn!("Migration of {database} cancelled before version {version}");
        return Err(MigrateError::Cancelled {
            database: database.to_string(),
            version,
        });
    }
    Ok(())
}

fn step_error(
    database: &str,
    version: i64,
    from_version: i64,
    to_version: i64,
    source: DbError,
) -> MigrateError {
    match source {
        DbError::Cancelled => MigrateError::Cancelled {
            database: database.to_string(),
            version,
        },
        source => MigrateError::MigrationFailed {
            database: database.to_string(),
            version,
            from_version,
            to_version,
            source,
        },
    }
}

#[cfg(test)]
#[path = "migrator_test.rs"]
mod tests;
