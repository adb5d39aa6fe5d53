//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use sf_core::{Config, SchemaName};
use sf_db::{Connector, DuckDbConnector, MEMORY_TARGET};
use sf_migrate::{LogObserver, Migrator};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and open transactions roll back.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main.rs maps it to the process exit code.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Exit code for a run stopped by Ctrl-C (128 + SIGINT)
pub(crate) const EXIT_CANCELLED: i32 = 130;

/// Configuration loaded for one invocation, with its resolved target.
#[derive(Debug)]
pub(crate) struct Project {
    pub(crate) config: Config,
    pub(crate) root: PathBuf,
    pub(crate) target: Option<String>,
}

/// Load the project configuration named by the global CLI arguments.
///
/// An unknown target is reported here, before any database is opened.
pub(crate) fn load_project(global: &GlobalArgs) -> Result<Project> {
    let root = PathBuf::from(&global.project_dir);
    let config = match &global.config {
        Some(path) => Config::load(Path::new(path)),
        None => Config::load_from_dir(&root),
    }
    .context("Failed to load configuration")?;

    let target = Config::resolve_target(global.target.as_deref());
    config
        .get_database_config(target.as_deref())
        .context("Failed to resolve target")?;
    log::debug!(
        "Loaded project '{}' (target: {})",
        config.name,
        target.as_deref().unwrap_or("default")
    );
    Ok(Project {
        config,
        root,
        target,
    })
}

impl Project {
    /// Migrator over the configured migrations directory, reporting through
    /// the log.
    pub(crate) fn build_migrator(&self) -> Migrator {
        let migrator = Migrator::from_directory(self.migrations_dir())
            .with_version_table(self.config.version_table.clone())
            .with_command_timeout(self.config.command_timeout())
            .with_lock_timeout(self.config.lock_timeout())
            .with_observer(Arc::new(LogObserver));
        match self.config.get_schema(self.target.as_deref()) {
            Some(schema) => migrator.with_schema(schema.clone()),
            None => migrator,
        }
    }

    pub(crate) fn migrations_dir(&self) -> PathBuf {
        self.config.migrations_path_absolute(&self.root)
    }

    /// Database to open: the CLI override as given, otherwise the target's
    /// (or base) path with relative files resolved against the project root.
    pub(crate) fn database_path(&self, cli_override: Option<&str>) -> Result<String> {
        if let Some(path) = cli_override {
            return Ok(path.to_string());
        }
        let path = self
            .config
            .get_database_config(self.target.as_deref())
            .context("Failed to get database configuration")?
            .path;
        if path == MEMORY_TARGET || Path::new(&path).is_absolute() {
            Ok(path)
        } else {
            Ok(self.root.join(path).display().to_string())
        }
    }

    pub(crate) fn connect(&self, cli_override: Option<&str>) -> Result<Arc<dyn Connector>> {
        let path = self.database_path(cli_override)?;
        let connector = DuckDbConnector::new(&path)
            .with_context(|| format!("Failed to open database '{path}'"))?;
        Ok(Arc::new(connector))
    }
}

/// Validate a `--schema` argument.
pub(crate) fn parse_schema(schema: Option<&str>) -> Result<Option<SchemaName>> {
    schema
        .map(SchemaName::try_new)
        .transpose()
        .context("Invalid --schema")
}

/// Calculate column widths for a table given headers and row data.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a left-aligned table with a dashed separator under the header.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);
    let format_row = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", format_row(headers.to_vec()));
    let separators: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", format_row(separators.iter().map(String::as_str).collect()));
    for row in rows {
        println!("{}", format_row(row.iter().map(String::as_str).collect()));
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
