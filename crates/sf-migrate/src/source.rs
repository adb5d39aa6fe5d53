//! Where migrations come from.
//!
//! A [`MigrationSource`] produces the full, unordered migration list. Order
//! and uniqueness are checked by the migrator when it loads the list.

use crate::migration::{Migration, ScriptMigration};
use sf_core::{CoreError, CoreResult, MigrationFileName};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Produces the migrations a migrator knows about
pub trait MigrationSource: Send + Sync {
    /// Return every migration, in any order.
    fn resolve(&self) -> CoreResult<Vec<Arc<dyn Migration>>>;
}

/// Migrations supplied directly by the caller
#[derive(Default, Clone)]
pub struct ListSource {
    migrations: Vec<Arc<dyn Migration>>,
}

impl ListSource {
    pub fn new(migrations: Vec<Arc<dyn Migration>>) -> Self {
        Self { migrations }
    }

    /// Add one migration
    pub fn with(mut self, migration: impl Migration + 'static) -> Self {
        self.migrations.push(Arc::new(migration));
        self
    }
}

impl MigrationSource for ListSource {
    fn resolve(&self) -> CoreResult<Vec<Arc<dyn Migration>>> {
        Ok(self.migrations.clone())
    }
}

/// `.sql` files in a directory, named `{version}{description}.sql`.
///
/// Subdirectories and non-`.sql` files are ignored. A name ending in
/// `disable-transaction.sql` marks the migration as transaction-disabled.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MigrationSource for DirectorySource {
    fn resolve(&self) -> CoreResult<Vec<Arc<dyn Migration>>> {
        if !self.dir.is_dir() {
            return Err(CoreError::MigrationsDirNotFound {
                path: self.dir.display().to_string(),
            });
        }
        let io_err = |source| CoreError::IoWithPath {
            path: self.dir.display().to_string(),
            source,
        };

        let mut migrations: Vec<Arc<dyn Migration>> = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                log::debug!("Skipping non UTF-8 file name {}", path.display());
                continue;
            };
            if !MigrationFileName::is_sql_file(file_name) {
                continue;
            }
            let parsed = MigrationFileName::parse(file_name)?;
            let file_name = file_name.to_string();
            migrations.push(Arc::new(ScriptMigration::from_file(
                parsed.version,
                parsed.disable_transaction,
                file_name,
                path,
            )));
        }
        log::debug!(
            "Found {} migration file(s) in {}",
            migrations.len(),
            self.dir.display()
        );
        Ok(migrations)
    }
}

/// Scripts compiled into the binary as `(file name, text)` pairs, e.g. via
/// `include_str!`. Directory components in the name are ignored.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedSource {
    files: &'static [(&'static str, &'static str)],
}

impl EmbeddedSource {
    pub const fn new(files: &'static [(&'static str, &'static str)]) -> Self {
        Self { files }
    }
}

impl MigrationSource for EmbeddedSource {
    fn resolve(&self) -> CoreResult<Vec<Arc<dyn Migration>>> {
        self.files
            .iter()
            .filter(|(name, _)| MigrationFileName::is_sql_file(base_name(name)))
            .map(|&(name, text)| {
                let file_name = base_name(name);
                let parsed = MigrationFileName::parse(file_name)?;
                if text.trim().is_empty() {
                    return Err(CoreError::EmptyScript {
                        version: parsed.version,
                    });
                }
                let migration: Arc<dyn Migration> = Arc::new(ScriptMigration::from_static(
                    parsed.version,
                    parsed.disable_transaction,
                    file_name,
                    text,
                ));
                Ok(migration)
            })
            .collect()
    }
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
