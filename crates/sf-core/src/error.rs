//! Error types for sf-core

use thiserror::Error;

/// Core error type for Stepflow
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Schema or table identifier is not a plain SQL identifier
    #[error("[E004] Invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: String },

    /// E005: Migration file name does not follow `{version}{text}.sql`
    #[error("[E005] Invalid migration name '{name}': {reason}")]
    InvalidMigrationName { name: String, reason: String },

    /// E006: Migrations directory not found
    #[error("[E006] Migrations directory not found: {path}")]
    MigrationsDirNotFound { path: String },

    /// E007: IO error with file path context
    #[error("[E007] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E008: Migration script has no executable content
    #[error("[E008] Migration {version} has an empty script")]
    EmptyScript { version: i64 },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
