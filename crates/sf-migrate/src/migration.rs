//! Migration units.
//!
//! A [`Migration`] is a version number, a flag saying whether it may run
//! inside a transaction, and a body that runs against a [`Database`] handle.
//! [`ScriptMigration`] covers SQL text split on `GO` lines; [`FnMigration`]
//! wraps an async closure for migrations written in Rust.

use async_trait::async_trait;
use sf_core::{split_batches, CoreError, CoreResult};
use sf_db::{Database, DbError, DbResult};
use std::borrow::Cow;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// One versioned unit of schema change
#[async_trait]
pub trait Migration: Send + Sync {
    /// Position in the global order; unique within a migration set
    fn version(&self) -> i64;

    /// True if the body must not run inside a transaction
    fn disable_transaction(&self) -> bool {
        false
    }

    /// Display name used in logs and listings
    fn name(&self) -> &str {
        ""
    }

    /// Run the migration body against `db`.
    ///
    /// The caller owns any transaction on `db`; the body must not commit or
    /// roll it back.
    async fn execute(&self, db: &mut Database, cancel: &CancellationToken) -> DbResult<()>;
}

#[derive(Debug, Clone)]
enum ScriptText {
    Inline(String),
    Static(&'static str),
    File(PathBuf),
}

/// A migration whose body is SQL text, split into batches on `GO` lines.
#[derive(Debug, Clone)]
pub struct ScriptMigration {
    version: i64,
    disable_transaction: bool,
    name: String,
    text: ScriptText,
}

impl ScriptMigration {
    /// Migration from SQL text held in memory. Blank text is rejected.
    pub fn new(
        version: i64,
        disable_transaction: bool,
        text: impl Into<String>,
    ) -> CoreResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(CoreError::EmptyScript { version });
        }
        Ok(Self {
            version,
            disable_transaction,
            name: format!("Migration {version}"),
            text: ScriptText::Inline(text),
        })
    }

    /// Migration from text compiled into the binary
    pub fn from_static(
        version: i64,
        disable_transaction: bool,
        name: impl Into<String>,
        text: &'static str,
    ) -> Self {
        Self {
            version,
            disable_transaction,
            name: name.into(),
            text: ScriptText::Static(text),
        }
    }

    /// Migration read from `path` each time it runs
    pub fn from_file(
        version: i64,
        disable_transaction: bool,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            version,
            disable_transaction,
            name: name.into(),
            text: ScriptText::File(path.into()),
        }
    }

    /// Override the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn load_text(&self) -> DbResult<Cow<'_, str>> {
        match &self.text {
            ScriptText::Inline(text) => Ok(Cow::Borrowed(text.as_str())),
            ScriptText::Static(text) => Ok(Cow::Borrowed(text)),
            ScriptText::File(path) => std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|e| {
                    DbError::ExecutionError(format!(
                        "failed to read migration script {}: {e}",
                        path.display()
                    ))
                }),
        }
    }
}

#[async_trait]
impl Migration for ScriptMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn disable_transaction(&self) -> bool {
        self.disable_transaction
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, db: &mut Database, cancel: &CancellationToken) -> DbResult<()> {
        let text = self.load_text()?;
        let batches = split_batches(&text);
        log::debug!(
            "Running {} batch(es) for migration {}",
            batches.len(),
            self.version
        );
        for batch in &batches {
            if cancel.is_cancelled() {
                return Err(DbError::Cancelled);
            }
            // Schema changes can run long; only the caller's cancellation
            // bounds them.
            db.execute_batch_with_timeout(batch, None).await?;
        }
        Ok(())
    }
}

/// Future returned by an [`FnMigration`] body
pub type MigrationFuture<'a> = Pin<Box<dyn Future<Output = DbResult<()>> + Send + 'a>>;

type MigrationFn = dyn for<'a> Fn(&'a mut Database) -> MigrationFuture<'a> + Send + Sync;

/// A migration whose body is an async closure.
///
/// ```ignore
/// let m = FnMigration::new(4, false, |db| {
///     Box::pin(async move {
///         db.execute("UPDATE fruit SET name = upper(name)").await?;
///         Ok(())
///     })
/// });
/// ```
pub struct FnMigration {
    version: i64,
    disable_transaction: bool,
    name: String,
    body: Box<MigrationFn>,
}

impl FnMigration {
    pub fn new<F>(version: i64, disable_transaction: bool, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut Database) -> MigrationFuture<'a> + Send + Sync + 'static,
    {
        Self {
            version,
            disable_transaction,
            name: format!("Migration {version}"),
            body: Box::new(body),
        }
    }

    /// Override the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl std::fmt::Debug for FnMigration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMigration")
            .field("version", &self.version)
            .field("disable_transaction", &self.disable_transaction)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Migration for FnMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn disable_transaction(&self) -> bool {
        self.disable_transaction
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, db: &mut Database, cancel: &CancellationToken) -> DbResult<()> {
        if cancel.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        (self.body)(db).await
    }
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
