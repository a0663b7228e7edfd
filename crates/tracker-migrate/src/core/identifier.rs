//! Identifier validation and backtick quoting.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! name that ends up in generated SQL goes through [`quote_mysql`] or
//! [`quote_qualified`] first.

use crate::error::{MigrateError, Result};

/// MySQL identifier length limit.
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Validate an identifier for security issues.
///
/// Rejects empty names, names containing null bytes and names longer than
/// MySQL allows.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::InvalidQuery(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::InvalidQuery(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::InvalidQuery(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// ```ignore
/// assert_eq!(quote_mysql("users")?, "`users`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a possibly alias-qualified column such as `c.id`.
pub fn quote_qualified(name: &str) -> Result<String> {
    let parts = name
        .split('.')
        .map(quote_mysql)
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("."))
}
