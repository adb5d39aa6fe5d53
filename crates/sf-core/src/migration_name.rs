//! Parsing of migration file names.
//!
//! Names follow `{version}{optional text}.sql`, e.g. `0003_add_index.sql`.
//! A name whose stem ends with `disable-transaction` (any case) marks a
//! migration that must run outside a transaction.

use crate::error::{CoreError, CoreResult};
use regex::Regex;
use std::sync::OnceLock;

/// Marker selecting a non-transactional migration.
pub const DISABLE_TRANSACTION_MARKER: &str = "disable-transaction";

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_regex() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"(?i)^(\d+)(.*)\.sql$").expect("valid regex literal"))
}

/// Metadata parsed from a migration file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFileName {
    /// Version number encoded by the leading digits
    pub version: i64,
    /// Free text after the digits, with separators trimmed
    pub description: String,
    /// Whether the migration must run outside a transaction
    pub disable_transaction: bool,
}

impl MigrationFileName {
    /// Parse a bare file name (no directory components).
    pub fn parse(name: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidMigrationName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let caps = name_regex()
            .captures(name)
            .ok_or_else(|| invalid("expected '{version}{text}.sql'"))?;

        let version: i64 = caps[1]
            .parse()
            .map_err(|_| invalid("version does not fit in a 64-bit integer"))?;

        let rest = &caps[2];
        let disable_transaction = rest
            .to_ascii_lowercase()
            .ends_with(DISABLE_TRANSACTION_MARKER);
        let description = rest
            .trim_matches(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
            .to_string();

        Ok(Self {
            version,
            description,
            disable_transaction,
        })
    }

    /// Returns true if `name` has a `.sql` extension (any case).
    pub fn is_sql_file(name: &str) -> bool {
        name.len() > 4 && name.to_ascii_lowercase().ends_with(".sql")
    }
}

#[cfg(test)]
#[path = "migration_name_test.rs"]
mod tests;
