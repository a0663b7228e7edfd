//! Migration orchestrator - runs the entity procedures against the source
//! and destination.

mod entity;
mod log;
mod mapping;
mod procedures;
mod result;
mod template;

pub use entity::EntityKind;
pub use log::MigrationLog;
pub use mapping::{
    detect_categories, detect_groups, match_category, CategoryMapping, DestinationGroup,
    GroupMapping, GroupMatcher,
};
pub use procedures::procedure;
pub use result::{EntityOutcome, EntitySummary, HealthCheckResult, MigrationResult, RunReport};
pub use template::{select_all, EntityMigration, RunContext, SourcePlan, Tally};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::traits::{DestinationWriter, SourceQuery};
use crate::drivers::{MysqlReader, MysqlWriter};
use crate::error::{MigrateError, Result};
use crate::target::DryRunTarget;
use crate::transform::{IdRemap, TransformContext};

/// Runs entity procedures.
///
/// Each procedure is independent: a failure is reported in its
/// [`MigrationResult`] and never stops the others. The id remap is shared
/// across procedures so that content follows users, forums and threads that
/// could not keep their legacy id.
pub struct Migrator {
    config: Config,
    source: Arc<dyn SourceQuery>,
    target: Arc<dyn DestinationWriter>,
    remap: Arc<IdRemap>,
    dry_run: bool,
}

impl Migrator {
    /// Connect to both databases. With `dry_run` the destination is never
    /// opened and every write is discarded.
    pub async fn connect(config: Config, dry_run: bool) -> Result<Self> {
        let max_conns = config.migration.get_max_connections();
        let source = MysqlReader::new(&config.source, max_conns).await?;

        let target: Arc<dyn DestinationWriter> = if dry_run {
            Arc::new(DryRunTarget::new())
        } else {
            Arc::new(MysqlWriter::new(&config.target, max_conns).await?)
        };

        let mut migrator = Self::with_backends(config, Arc::new(source), target);
        migrator.dry_run = dry_run;
        Ok(migrator)
    }

    /// Build a migrator over already constructed backends.
    pub fn with_backends(
        config: Config,
        source: Arc<dyn SourceQuery>,
        target: Arc<dyn DestinationWriter>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            remap: Arc::new(IdRemap::new()),
            dry_run: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run one entity procedure.
    pub async fn migrate(&self, kind: EntityKind) -> MigrationResult {
        let transform = TransformContext::new(
            &self.config.migration,
            Utc::now().naive_utc(),
            Arc::clone(&self.remap),
        );
        let ctx = RunContext {
            source: self.source.as_ref(),
            target: self.target.as_ref(),
            transform: &transform,
        };

        procedure(kind)
            .run(&ctx, self.config.migration.chunk_size_for(kind))
            .await
    }

    pub async fn migrate_users(&self) -> MigrationResult {
        self.migrate(EntityKind::Users).await
    }

    pub async fn migrate_torrents(&self) -> MigrationResult {
        self.migrate(EntityKind::Torrents).await
    }

    pub async fn migrate_peers(&self) -> MigrationResult {
        self.migrate(EntityKind::Peers).await
    }

    pub async fn migrate_snatched(&self) -> MigrationResult {
        self.migrate(EntityKind::Snatched).await
    }

    pub async fn migrate_forum_categories(&self) -> MigrationResult {
        self.migrate(EntityKind::ForumCategories).await
    }

    pub async fn migrate_forum_threads(&self) -> MigrationResult {
        self.migrate(EntityKind::ForumThreads).await
    }

    pub async fn migrate_forum_posts(&self) -> MigrationResult {
        self.migrate(EntityKind::ForumPosts).await
    }

    pub async fn migrate_comments(&self) -> MigrationResult {
        self.migrate(EntityKind::Comments).await
    }

    /// Run several procedures one after the other.
    ///
    /// An empty list means the configured entities. Entities always run in
    /// dependency order ([`EntityKind::ALL`]), each at most once.
    pub async fn run(&self, entities: &[EntityKind]) -> RunReport {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        let mut selected = if entities.is_empty() {
            self.config.migration.get_entities()
        } else {
            entities.to_vec()
        };
        selected.sort();
        selected.dedup();

        info!(
            "Starting migration run {}{}: {}",
            run_id,
            if self.dry_run { " (dry run)" } else { "" },
            selected
                .iter()
                .map(|k| k.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut outcomes = Vec::with_capacity(selected.len());
        for kind in selected {
            let result = self.migrate(kind).await;
            if let Some(error) = &result.error {
                warn!("{} failed after {} records: {}", kind, result.count, error);
            }
            outcomes.push(EntityOutcome {
                entity: kind,
                result,
            });
        }

        let report = RunReport::new(run_id, self.dry_run, started_at, outcomes);
        info!(
            "Migration run {} finished: {} records, {} failed entities",
            report.run_id,
            report.total_count,
            report.failed_entities.len()
        );
        report
    }

    /// Source table and row count for every entity.
    pub async fn summary(&self) -> Result<Vec<EntitySummary>> {
        let mut summaries = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            let plan = procedure(kind).plan();
            let summary = match template::resolve_table(self.source.as_ref(), plan.tables).await {
                Ok(table) => {
                    let rows = self.source.row_count(&table).await?;
                    EntitySummary {
                        entity: kind,
                        table: Some(table),
                        rows: Some(rows),
                    }
                }
                Err(MigrateError::TableNotFound(_)) => EntitySummary {
                    entity: kind,
                    table: None,
                    rows: None,
                },
                Err(e) => return Err(e),
            };
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Ping both databases and time the round trips.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source = self.source.ping().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = self.target.ping().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        let healthy = source.is_ok() && target.is_ok();
        Ok(HealthCheckResult {
            source_connected: source.is_ok(),
            source_latency_ms,
            source_error: source.err().map(|e| e.to_string()),
            target_connected: target.is_ok(),
            target_latency_ms,
            target_error: target.err().map(|e| e.to_string()),
            healthy,
        })
    }

    /// Close both connection pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}
