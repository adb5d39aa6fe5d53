//! Process-wide memo of version-table reads.
//!
//! Entries are keyed by database identity plus the qualified table name. The
//! unlocked read may return a stale value; the locked read always goes to the
//! database and refreshes the entry.

use crate::version_store::VersionTable;
use dashmap::DashMap;
use sf_db::{Database, DbResult};

/// Caches the last known version per (database, version table)
#[derive(Debug, Default)]
pub struct VersionCache {
    versions: DashMap<String, i64>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(db: &Database, table: &VersionTable) -> String {
        format!("{}/{}", db.identity(), table.qualified_name())
    }

    /// Create the version table unless this database already has a cached
    /// version for it.
    pub async fn ensure_table_exists(&self, db: &mut Database, table: &VersionTable) -> DbResult<()> {
        if self.versions.contains_key(&Self::key(db, table)) {
            return Ok(());
        }
        table.ensure_table_exists(db).await
    }

    /// Cached version if present, otherwise read and remember it.
    pub async fn read_version(&self, db: &mut Database, table: &VersionTable) -> DbResult<i64> {
        let key = Self::key(db, table);
        if let Some(version) = self.versions.get(&key).map(|v| *v) {
            return Ok(version);
        }
        let version = table.read_version(db).await?;
        self.versions.insert(key, version);
        Ok(version)
    }

    /// Locked, authoritative read; refreshes the cached entry.
    pub async fn read_version_with_lock(
        &self,
        db: &mut Database,
        table: &VersionTable,
    ) -> DbResult<i64> {
        let version = table.read_version_with_lock(db).await?;
        self.versions.insert(Self::key(db, table), version);
        Ok(version)
    }

    /// Write through to the table and the cache.
    pub async fn write_version(
        &self,
        db: &mut Database,
        table: &VersionTable,
        version: i64,
    ) -> DbResult<()> {
        table.write_version(db, version).await?;
        self.versions.insert(Self::key(db, table), version);
        Ok(())
    }

    /// Returns true once a version for this database and table is cached
    pub fn is_version_loaded(&self, db: &Database, table: &VersionTable) -> bool {
        self.versions.contains_key(&Self::key(db, table))
    }

    /// Forget the entry, e.g. after a write was rolled back.
    pub fn invalidate(&self, db: &Database, table: &VersionTable) {
        self.versions.remove(&Self::key(db, table));
    }
}

#[cfg(test)]
#[path = "version_cache_test.rs"]
mod tests;
