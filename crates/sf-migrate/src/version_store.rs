//! The per-database version table.
//!
//! The table holds one row with the highest applied version. Reads of a
//! missing table yield version 0; writes update the row in place and insert
//! it the first time.

use sf_core::{SchemaName, TableName};
use sf_db::{Database, DbError, DbResult};
use std::time::Duration;

/// How long a locked read waits for another migrator to finish its batch.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(240);

/// Location of the version table and the SQL that maintains it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTable {
    schema: Option<SchemaName>,
    table: TableName,
    lock_timeout: Option<Duration>,
}

impl Default for VersionTable {
    fn default() -> Self {
        Self::new(None, TableName::default())
    }
}

impl VersionTable {
    /// `schema: None` means the connection's default schema.
    pub fn new(schema: Option<SchemaName>, table: TableName) -> Self {
        Self {
            schema,
            table,
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT),
        }
    }

    /// Set the locked-read timeout; `None` waits indefinitely.
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn schema(&self) -> Option<&SchemaName> {
        self.schema.as_ref()
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Quoted, optionally schema-qualified name for use in SQL
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("\"{schema}\".\"{}\"", self.table),
            None => format!("\"{}\"", self.table),
        }
    }

    fn schema_predicate(&self) -> String {
        match &self.schema {
            Some(schema) => format!("'{schema}'"),
            None => "current_schema()".to_string(),
        }
    }

    /// Returns true if the version table exists.
    pub async fn exists(&self, db: &mut Database) -> DbResult<bool> {
        // Identifiers are validated, so interpolating them is safe.
        let sql = format!(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = {} AND table_name = '{}'",
            self.schema_predicate(),
            self.table
        );
        Ok(db.query_i64(&sql).await?.unwrap_or(0) > 0)
    }

    async fn schema_exists(&self, db: &mut Database, schema: &SchemaName) -> DbResult<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM information_schema.schemata WHERE schema_name = '{schema}'"
        );
        Ok(db.query_i64(&sql).await?.unwrap_or(0) > 0)
    }

    /// Create the schema (if any) and the table when they are missing.
    ///
    /// Losing a creation race to another migrator is not an error.
    pub async fn ensure_table_exists(&self, db: &mut Database) -> DbResult<()> {
        if let Some(schema) = &self.schema {
            if !self.schema_exists(db, schema).await? {
                let sql = format!("CREATE SCHEMA \"{schema}\"");
                ignore_already_exists(db.execute_batch(&sql).await, &sql)?;
            }
        }
        if self.exists(db).await? {
            return Ok(());
        }
        let sql = format!(
            "CREATE TABLE {} (\
             \"Id\" UUID DEFAULT gen_random_uuid() PRIMARY KEY, \
             \"Version\" BIGINT NOT NULL)",
            self.qualified_name()
        );
        ignore_already_exists(db.execute_batch(&sql).await, &sql)?;
        log::debug!("Version table {} ready on {}", self.qualified_name(), db.name());
        Ok(())
    }

    /// Read the recorded version without locking. A missing table is 0.
    pub async fn read_version(&self, db: &mut Database) -> DbResult<i64> {
        let sql = format!("SELECT MAX(\"Version\") FROM {}", self.qualified_name());
        match db.query_i64_with_timeout(&sql, self.lock_timeout).await {
            Ok(version) => Ok(version.unwrap_or(0)),
            Err(DbError::TableNotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Lock the version table for the rest of the transaction, then read.
    ///
    /// Requires an open transaction on `db`. Blocks while another handle
    /// holds the lock, up to the lock timeout.
    pub async fn read_version_with_lock(&self, db: &mut Database) -> DbResult<i64> {
        db.lock_table(&self.qualified_name(), self.lock_timeout)
            .await?;
        self.read_version(db).await
    }

    /// Record `version` as the current version.
    pub async fn write_version(&self, db: &mut Database, version: i64) -> DbResult<()> {
        let table = self.qualified_name();
        let updated = db
            .execute(&format!("UPDATE {table} SET \"Version\" = {version}"))
            .await?;
        if updated == 0 {
            db.execute(&format!(
                "INSERT INTO {table} (\"Version\") VALUES ({version})"
            ))
            .await?;
        }
        log::debug!("Recorded version {version} in {table} on {}", db.name());
        Ok(())
    }
}

fn ignore_already_exists(result: DbResult<()>, sql: &str) -> DbResult<()> {
    match result {
        Err(e) if e.is_already_exists() => {
            log::debug!("Ignoring concurrent creation for `{sql}`: {e}");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
#[path = "version_store_test.rs"]
mod tests;
