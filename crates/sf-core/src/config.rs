//! Configuration types and parsing for stepflow.yml

use crate::error::{CoreError, CoreResult};
use crate::identifier::{SchemaName, TableName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no `--target` flag is given.
pub const TARGET_ENV_VAR: &str = "SF_TARGET";

/// Main project configuration from stepflow.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Directory containing `{version}{text}.sql` migration scripts
    #[serde(default = "default_migrations_path")]
    pub migrations_path: String,

    /// Schema holding the version table (engine default when unset)
    #[serde(default)]
    pub schema: Option<SchemaName>,

    /// Name of the version table
    #[serde(default)]
    pub version_table: TableName,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Timeout for ordinary commands, in seconds
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Timeout for version lookups, which may wait on another migrator's lock
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Named target configurations (e.g., dev, staging, prod)
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// Target-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Database configuration override
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Schema override
    #[serde(default)]
    pub schema: Option<SchemaName>,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database path (DuckDB file or `:memory:`)
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

const DEFAULT_DB_PATH: &str = ":memory:";

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_migrations_path() -> String {
    "migrations".to_string()
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_lock_timeout_secs() -> u64 {
    240
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for stepflow.yml or stepflow.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("stepflow.yml");
        let yaml_path = dir.join("stepflow.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "Project name cannot be empty".to_string(),
            });
        }

        if self.migrations_path.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "migrations_path cannot be empty".to_string(),
            });
        }

        let paths = std::iter::once(("database", &self.database)).chain(
            self.targets
                .iter()
                .filter_map(|(name, t)| t.database.as_ref().map(|db| (name.as_str(), db))),
        );
        for (owner, db) in paths {
            if db.path.trim().is_empty() {
                return Err(CoreError::ConfigInvalid {
                    message: format!("Database path for '{owner}' cannot be empty"),
                });
            }
        }

        if self.lock_timeout_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "lock_timeout_secs must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get absolute migrations path relative to a project root
    pub fn migrations_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.migrations_path)
    }

    /// Default command timeout; `0` disables it
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }

    /// Timeout for version reads and the table lock wait
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Get the list of available target names
    pub fn available_targets(&self) -> Vec<&str> {
        self.targets.keys().map(|s| s.as_str()).collect()
    }

    /// Get target configuration by name
    pub fn get_target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.get(name)
    }

    /// Get database configuration, optionally applying target overrides
    ///
    /// If target is specified and exists, uses target's database config.
    /// Otherwise, uses the base database config.
    pub fn get_database_config(&self, target: Option<&str>) -> CoreResult<DatabaseConfig> {
        match target {
            Some(name) => {
                let target_config = self.targets.get(name).ok_or_else(|| {
                    let mut available = self.available_targets();
                    available.sort_unstable();
                    CoreError::ConfigInvalid {
                        message: format!(
                            "Target '{}' not found. Available targets: {}",
                            name,
                            available.join(", ")
                        ),
                    }
                })?;

                Ok(target_config
                    .database
                    .clone()
                    .unwrap_or_else(|| self.database.clone()))
            }
            None => Ok(self.database.clone()),
        }
    }

    /// Get schema, optionally applying target overrides
    pub fn get_schema(&self, target: Option<&str>) -> Option<&SchemaName> {
        target
            .and_then(|name| self.targets.get(name))
            .and_then(|tc| tc.schema.as_ref())
            .or(self.schema.as_ref())
    }

    /// Resolve target from CLI flag or SF_TARGET environment variable
    ///
    /// Priority: CLI flag > SF_TARGET env var > None
    pub fn resolve_target(cli_target: Option<&str>) -> Option<String> {
        cli_target
            .map(String::from)
            .or_else(|| std::env::var(TARGET_ENV_VAR).ok())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
