//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

const SUPPORTED_TYPES: &[&str] = &["mysql", "mariadb"];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }
    if !SUPPORTED_TYPES.contains(&config.source.r#type.as_str()) {
        return Err(MigrateError::Config(format!(
            "source.type must be 'mysql' or 'mariadb', got '{}'",
            config.source.r#type
        )));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if !SUPPORTED_TYPES.contains(&config.target.r#type.as_str()) {
        return Err(MigrateError::Config(format!(
            "target.type must be 'mysql' or 'mariadb', got '{}'",
            config.target.r#type
        )));
    }

    // Cannot migrate to the same database
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
    {
        return Err(MigrateError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    for (kind, size) in &config.migration.chunk_sizes {
        if *size == 0 {
            return Err(MigrateError::Config(format!(
                "migration.chunk_sizes.{} must be at least 1",
                kind
            )));
        }
    }
    if let Some(0) = config.migration.max_connections {
        return Err(MigrateError::Config(
            "migration.max_connections must be at least 1".into(),
        ));
    }
    let pinned_ids = [
        ("fallback_group_id", config.migration.fallback_group_id),
        ("fallback_category_id", config.migration.fallback_category_id),
        ("default_type_id", config.migration.default_type_id),
    ];
    for (name, id) in pinned_ids {
        if matches!(id, Some(id) if id < 1) {
            return Err(MigrateError::Config(format!(
                "migration.{} must be a positive id",
                name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};
    use crate::migration::EntityKind;

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                r#type: "mysql".to_string(),
                host: "localhost".to_string(),
                port: 3306,
                database: "tsse".to_string(),
                user: "root".to_string(),
                password: "password".to_string(),
                ssl_mode: "disable".to_string(),
            },
            target: TargetConfig {
                r#type: "mariadb".to_string(),
                host: "localhost".to_string(),
                port: 3306,
                database: "unit3d".to_string(),
                user: "unit3d".to_string(),
                password: "password".to_string(),
                ssl_mode: "disable".to_string(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_source_type() {
        let mut config = valid_config();
        config.source.r#type = "postgres".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_database_rejected() {
        let mut config = valid_config();
        config.target.database = "tsse".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("cannot be the same database"));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = valid_config();
        config.migration.chunk_sizes.insert(EntityKind::Peers, 0);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("chunk_sizes.peers"));
    }

    #[test]
    fn test_zero_fallback_group_rejected() {
        let mut config = valid_config();
        config.migration.fallback_group_id = Some(0);
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.migration.default_type_id = Some(-1);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("migration.default_type_id"));
    }

    #[test]
    fn test_source_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_456"));
    }
}
