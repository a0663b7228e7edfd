//! Configuration type definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::migration::EntityKind;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Legacy tracker database (read-only).
    pub source: SourceConfig,

    /// Destination database the records are written into.
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (MySQL/MariaDB) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type ("mysql" or "mariadb").
    #[serde(default = "default_mysql")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require, verify-ca, verify-full (default: "prefer").
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Destination database (MySQL/MariaDB) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database type ("mysql" or "mariadb").
    #[serde(default = "default_mysql")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode (default: "prefer").
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Entities to migrate, in order. Empty means all of them.
    #[serde(default)]
    pub entities: Vec<EntityKind>,

    /// Per-entity page size overrides.
    #[serde(default)]
    pub chunk_sizes: BTreeMap<EntityKind, usize>,

    /// Legacy user group id -> destination group id. Entries override the
    /// mapping detected from the two databases.
    #[serde(default)]
    pub group_map: BTreeMap<i64, i64>,

    /// Group for users whose legacy group is not mapped. Detected from the
    /// destination `groups` table when unset.
    #[serde(default)]
    pub fallback_group_id: Option<i64>,

    /// Column holding the legacy group id. Detected from the source `users`
    /// table when unset.
    #[serde(default)]
    pub group_column: Option<String>,

    /// Legacy category id -> destination category id. Entries override the
    /// mapping detected by category name.
    #[serde(default)]
    pub category_map: BTreeMap<i64, i64>,

    /// Category for torrents whose legacy category is not mapped. Defaults
    /// to the first destination category.
    #[serde(default)]
    pub fallback_category_id: Option<i64>,

    /// Destination `type_id` given to every migrated torrent. Defaults to
    /// the first destination type.
    #[serde(default)]
    pub default_type_id: Option<i64>,

    /// Max connections per database pool (default: 4).
    #[serde(default)]
    pub max_connections: Option<usize>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            chunk_sizes: BTreeMap::new(),
            group_map: BTreeMap::new(),
            fallback_group_id: None,
            group_column: None,
            category_map: BTreeMap::new(),
            fallback_category_id: None,
            default_type_id: None,
            max_connections: None,
        }
    }
}

impl MigrationConfig {
    /// Page size for an entity, falling back to the entity's default.
    pub fn chunk_size_for(&self, kind: EntityKind) -> usize {
        self.chunk_sizes
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_chunk_size())
    }

    /// Entities to run, in execution order.
    pub fn get_entities(&self) -> Vec<EntityKind> {
        if self.entities.is_empty() {
            EntityKind::ALL.to_vec()
        } else {
            self.entities.clone()
        }
    }

    pub fn get_max_connections(&self) -> usize {
        self.max_connections.unwrap_or(4)
    }
}

// Default value functions for serde
fn default_mysql() -> String {
    "mysql".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_prefer() -> String {
    "prefer".to_string()
}
