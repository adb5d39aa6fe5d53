//! sf-db - Database layer for Stepflow
//!
//! This crate provides the [`Database`] session handle, the
//! [`Connector`]/[`Connection`] traits it runs on, and the DuckDB
//! implementation of those traits.

pub mod database;
pub mod duckdb;
pub mod error;
pub(crate) mod row_helpers;
pub mod traits;

pub use database::Database;
pub use duckdb::{DuckDbConnection, DuckDbConnector, MEMORY_TARGET};
pub use error::{DbError, DbResult};
pub use traits::{Connection, Connector, QueryRows};
