//! Error types for the migration library.

use thiserror::Error;

/// Exit code for configuration problems (bad YAML, failed validation).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when the source or destination database cannot be reached.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code when at least one entity migration failed.
pub const EXIT_MIGRATION_FAILED: u8 = 3;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code after SIGINT/SIGTERM.
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Destination database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] mysql_async::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Reading from the source failed outside of the driver itself
    #[error("Data access failed ({context}): {message}")]
    DataAccess { context: String, message: String },

    /// None of the candidate source tables exist
    #[error("Could not find a matching source table. Tried: {}", .0.join(", "))]
    TableNotFound(Vec<String>),

    /// A chunked query was built with unusable parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A source row could not be turned into a destination record
    #[error("Transform failed for {entity}: {message}")]
    Transform { entity: String, message: String },

    /// Writing a record to the destination failed
    #[error("Write to {table} failed: {message}")]
    Write { table: String, message: String },

    /// An entity needs another entity to be migrated first
    #[error("Missing prerequisite: {0}")]
    Prerequisite(String),

    /// One or more entity migrations reported failure
    #[error("Migration failed for: {}", .0.join(", "))]
    EntitiesFailed(Vec<String>),

    /// Health check found an unreachable database
    #[error("Health check failed")]
    Unhealthy,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a DataAccess error
    pub fn data_access(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::DataAccess {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a Transform error
    pub fn transform(entity: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transform {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a Write error
    pub fn write(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MigrateError::Write {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::InvalidQuery(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Source(_) | MigrateError::Target(_) | MigrateError::Pool { .. } => {
                EXIT_CONNECTION_ERROR
            }
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Cancelled => EXIT_CANCELLED,
            _ => EXIT_MIGRATION_FAILED,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(MigrateError::pool("refused", "connect").exit_code(), EXIT_CONNECTION_ERROR);
        assert_eq!(
            MigrateError::EntitiesFailed(vec!["users".into()]).exit_code(),
            EXIT_MIGRATION_FAILED
        );
        assert_eq!(MigrateError::Cancelled.exit_code(), EXIT_CANCELLED);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(MigrateError::from(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_table_not_found_lists_candidates() {
        let err = MigrateError::TableNotFound(vec!["tsf_posts".into(), "posts".into()]);
        assert_eq!(
            err.to_string(),
            "Could not find a matching source table. Tried: tsf_posts, posts"
        );
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml");
        let detailed = MigrateError::from(io).format_detailed();
        assert!(detailed.starts_with("Error: IO error: config.yaml"));
    }
}
