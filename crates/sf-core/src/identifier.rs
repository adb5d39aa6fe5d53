//! Strongly-typed SQL identifiers for the version table location.
//!
//! Schema and table names are interpolated into DDL, so they are restricted to
//! plain identifiers: a letter or underscore followed by letters, digits, or
//! underscores, at most [`MAX_IDENTIFIER_LEN`] characters.

use crate::error::{CoreError, CoreResult};

/// Longest identifier accepted (SQL Server's `sysname` limit).
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Check that `value` is a plain SQL identifier.
pub fn validate_identifier(value: &str) -> CoreResult<()> {
    let invalid = |reason: &str| CoreError::InvalidIdentifier {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(invalid("identifier must not be empty"));
    };
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid("identifier is longer than 128 characters"));
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid("must start with a letter or underscore"));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("only letters, digits, and underscores are allowed"));
    }
    Ok(())
}

/// Define a validated identifier newtype.
///
/// Generates `try_new` (validating), `as_str`, `into_inner`, `Display`,
/// `AsRef<str>`, `Deref<Target=str>`, `TryFrom<&str>`, `TryFrom<String>`, and a
/// `Deserialize` that rejects invalid identifiers.
macro_rules! define_identifier {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        #[serde(transparent)]
        $vis struct $Name(String);

        impl<'de> serde::Deserialize<'de> for $Name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $Name::try_new(s).map_err(serde::de::Error::custom)
            }
        }

        impl $Name {
            /// Validate and wrap an identifier.
            pub fn try_new(name: impl Into<String>) -> CoreResult<Self> {
                let s = name.into();
                validate_identifier(&s)?;
                Ok(Self(s))
            }

            /// Return the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str { &self.0 }
        }

        impl std::ops::Deref for $Name {
            type Target = str;
            fn deref(&self) -> &str { &self.0 }
        }

        impl TryFrom<String> for $Name {
            type Error = CoreError;
            fn try_from(s: String) -> CoreResult<Self> {
                Self::try_new(s)
            }
        }

        impl TryFrom<&str> for $Name {
            type Error = CoreError;
            fn try_from(s: &str) -> CoreResult<Self> {
                Self::try_new(s)
            }
        }

        impl PartialEq<&str> for $Name {
            fn eq(&self, other: &&str) -> bool { self.0 == *other }
        }
    };
}

define_identifier! {
    /// Schema (namespace) that holds the version table.
    pub struct SchemaName;
}

define_identifier! {
    /// Name of the version table.
    pub struct TableName;
}

/// Default version table name.
pub const DEFAULT_VERSION_TABLE: &str = "DatabaseVersion";

impl Default for TableName {
    fn default() -> Self {
        Self(DEFAULT_VERSION_TABLE.to_string())
    }
}

#[cfg(test)]
#[path = "identifier_test.rs"]
mod tests;
