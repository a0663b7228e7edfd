//! # tracker-migrate
//!
//! Chunked migration of a legacy TSSE tracker database into a UNIT3D schema.
//!
//! This library provides the core functionality for moving users, torrents,
//! peers, snatch history, forums and comments from the legacy MySQL database
//! into the destination with:
//!
//! - **Bounded memory** via page-at-a-time reads ([`ChunkedReader`])
//! - **Independent procedures** per entity with a uniform [`MigrationResult`]
//! - **Id preservation** with remapping when a legacy id is already taken
//! - **Dry runs** that read and transform everything but write nothing
//!
//! ## Example
//!
//! ```rust,no_run
//! use tracker_migrate::{Config, EntityKind, Migrator};
//!
//! #[tokio::main]
//! async fn main() -> tracker_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let migrator = Migrator::connect(config, false).await?;
//!     let report = migrator.run(&[EntityKind::Users, EntityKind::Torrents]).await;
//!     println!("Migrated {} records", report.total_count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod migration;
pub mod source;
pub mod target;
pub mod transform;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use core::{DestinationWriter, Record, Row, SourceQuery, SqlValue};
pub use drivers::{MysqlReader, MysqlWriter};
pub use error::{MigrateError, Result};
pub use migration::{
    EntityKind, EntitySummary, HealthCheckResult, MigrationResult, Migrator, RunReport,
};
pub use source::{ChunkedQuery, ChunkedReader};
pub use target::DryRunTarget;
