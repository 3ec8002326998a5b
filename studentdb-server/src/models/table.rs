//! Table name validation
//!
//! The table name is spliced into fixed statements, so it must be a plain
//! SQL identifier: letter or underscore first, then alphanumerics/underscores.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;
use crate::config::DEFAULT_TABLE;

/// Maximum identifier length accepted by MySQL
const MAX_TABLE_NAME_LEN: usize = 64;

static IDENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("invalid identifier regex")
});

/// Validated table name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Create a table name, validating identifier format.
    ///
    /// ```
    /// use studentdb_server::models::TableName;
    ///
    /// assert!(TableName::new("student").is_ok());
    /// assert!(TableName::new("student; DROP TABLE x").is_err());
    /// assert!(TableName::new("1student").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "table name" });
        }

        if s.len() > MAX_TABLE_NAME_LEN {
            return Err(ValidationError::TooLong {
                field: "table name",
                max: MAX_TABLE_NAME_LEN,
            });
        }

        if !IDENT_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "table name",
                reason: "must start with a letter or underscore and contain only letters, digits and underscores",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self(DEFAULT_TABLE.to_owned())
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
