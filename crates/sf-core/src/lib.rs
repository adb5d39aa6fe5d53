//! sf-core - Core library for Stepflow
//!
//! This crate provides shared types used across all Stepflow components:
//! configuration parsing, validated identifiers for the version table,
//! migration file-name parsing, and `GO`-separated script splitting.

pub mod config;
pub mod error;
pub mod identifier;
pub mod migration_name;
pub mod script;

pub use config::{Config, DatabaseConfig, TargetConfig};
pub use error::{CoreError, CoreResult};
pub use identifier::{SchemaName, TableName};
pub use migration_name::MigrationFileName;
pub use script::split_batches;
