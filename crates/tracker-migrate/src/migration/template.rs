//! Template Method pattern for entity procedures.
//!
//! Every entity migrates the same way: resolve the legacy table, page
//! through it with a [`ChunkedReader`], transform each row and write the
//! result. [`EntityMigration`] captures that skeleton in its provided
//! [`run`](EntityMigration::run) method; implementations only say where the
//! rows come from ([`SourcePlan`]) and how a row becomes a record
//! ([`transform`](EntityMigration::transform)).
//!
//! # Algorithm Steps
//!
//! 1. **Start**: log `Starting <label> migration (chunk size N)...`
//! 2. **Prepare**: entity-specific setup such as detecting the group map or
//!    checking that prerequisite entities were migrated
//! 3. **Resolve**: first existing table among the candidates, then the first
//!    ordering key whose columns all exist in it
//! 4. **Copy**: page through the source; write or skip each row
//! 5. **Finish**: log the completion line, or the failure line with the
//!    partial count
//!
//! Failures never escape `run`; they become a failed [`MigrationResult`].

use async_trait::async_trait;
use tracing::debug;

use super::entity::EntityKind;
use super::log::MigrationLog;
use super::result::MigrationResult;
use crate::core::identifier::quote_mysql;
use crate::core::traits::{DestinationWriter, SourceQuery};
use crate::core::value::{Record, Row};
use crate::error::{MigrateError, Result};
use crate::source::{ChunkedQuery, ChunkedReader};
use crate::transform::{TransformContext, Transformed};

/// Skip reasons beyond this many are only counted.
const SKIP_LOG_LIMIT: u64 = 3;

/// Where an entity's rows come from.
#[derive(Clone, Copy)]
pub struct SourcePlan {
    /// Candidate legacy table names, tried in order.
    pub tables: &'static [&'static str],
    /// Base `SELECT` for the resolved table, without ORDER BY or LIMIT.
    pub query: fn(&str) -> Result<String>,
    /// Candidate ordering keys, tried in order against the table's columns.
    pub order_keys: &'static [&'static [&'static str]],
    /// Table alias used by `query`, prefixed to the ordering columns.
    pub alias: Option<&'static str>,
}

/// `SELECT * FROM <table>`.
pub fn select_all(table: &str) -> Result<String> {
    Ok(format!("SELECT * FROM {}", quote_mysql(table)?))
}

/// Shared handles for one procedure invocation.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub source: &'a dyn SourceQuery,
    pub target: &'a dyn DestinationWriter,
    pub transform: &'a TransformContext,
}

/// Counters kept while a procedure runs.
#[derive(Debug, Default)]
pub struct Tally {
    pub written: u64,
    pub skipped: u64,
    notes: Vec<(&'static str, u64)>,
}

impl Tally {
    /// Count an entity-specific event reported on the completion line,
    /// e.g. users that fell back to the default group.
    pub fn note(&mut self, what: &'static str) {
        match self.notes.iter_mut().find(|(w, _)| *w == what) {
            Some((_, n)) => *n += 1,
            None => self.notes.push((what, 1)),
        }
    }

    fn completion_line(&self, kind: EntityKind) -> String {
        let mut line = format!(
            "{} migration completed: {} records migrated",
            kind.label(),
            self.written
        );
        if self.skipped > 0 {
            line.push_str(&format!(", {} skipped", self.skipped));
        }
        for (what, n) in &self.notes {
            line.push_str(&format!(" ({} {})", n, what));
        }
        line
    }
}

/// First candidate table that exists in the source.
pub async fn resolve_table(source: &dyn SourceQuery, candidates: &[&str]) -> Result<String> {
    for table in candidates {
        if source.table_exists(table).await? {
            return Ok(table.to_string());
        }
    }
    Err(MigrateError::TableNotFound(
        candidates.iter().map(|t| t.to_string()).collect(),
    ))
}

/// First ordering key whose columns all exist in `table`, alias-qualified.
pub async fn resolve_order_key(
    source: &dyn SourceQuery,
    table: &str,
    plan: &SourcePlan,
) -> Result<Vec<String>> {
    let columns = source.columns(table).await?;
    let has = |name: &str| columns.iter().any(|c| c.eq_ignore_ascii_case(name));

    let key = plan
        .order_keys
        .iter()
        .find(|key| key.iter().all(|col| has(*col)))
        .ok_or_else(|| {
            let tried: Vec<String> = plan.order_keys.iter().map(|k| k.join("+")).collect();
            MigrateError::data_access(
                format!("table {}", table),
                format!("no usable ordering key (tried {})", tried.join(", ")),
            )
        })?;

    Ok(key
        .iter()
        .map(|col| match plan.alias {
            Some(alias) => format!("{}.{}", alias, col),
            None => col.to_string(),
        })
        .collect())
}

/// Template Method trait for entity procedures.
#[async_trait]
pub trait EntityMigration: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn plan(&self) -> SourcePlan;

    /// Turn one source row into a record or a skip.
    ///
    /// May consult the destination through `ctx.target` for duplicate checks
    /// and foreign-key lookups.
    async fn transform(
        &self,
        row: &Row,
        ctx: &RunContext<'_>,
        tally: &mut Tally,
    ) -> Result<Transformed>;

    /// Setup before the first page is read. May refine the transform
    /// context for this run; an error fails the procedure.
    async fn prepare(
        &self,
        _ctx: &RunContext<'_>,
        _transform: &mut TransformContext,
        _log: &mut MigrationLog,
    ) -> Result<()> {
        Ok(())
    }

    /// Whether records carry their legacy `id`. When the id is already
    /// taken the record is written without it and the new id is remapped.
    fn preserve_ids(&self) -> bool {
        false
    }

    /// Run the procedure end to end.
    ///
    /// This is the Template Method. It never fails: errors are reported in
    /// the returned result together with the number of records written
    /// before the failure.
    async fn run(&self, ctx: &RunContext<'_>, chunk_size: usize) -> MigrationResult {
        let kind = self.kind();
        let mut log = MigrationLog::new();
        let mut tally = Tally::default();

        log.push(format!(
            "Starting {} migration (chunk size {})...",
            kind.label().to_lowercase(),
            chunk_size
        ));

        match self.copy_rows(ctx, chunk_size, &mut log, &mut tally).await {
            Ok(()) => {
                log.push(tally.completion_line(kind));
                MigrationResult::completed(tally.written, log.into_lines())
            }
            Err(e) => {
                let message = e.to_string();
                log.push(format!("{} migration failed: {}", kind.label(), message));
                MigrationResult::failed(tally.written, message, log.into_lines())
            }
        }
    }

    /// Steps 2 to 4 of the template.
    async fn copy_rows(
        &self,
        ctx: &RunContext<'_>,
        chunk_size: usize,
        log: &mut MigrationLog,
        tally: &mut Tally,
    ) -> Result<()> {
        let mut transform = ctx.transform.clone();
        self.prepare(ctx, &mut transform, log).await?;
        let ctx = &RunContext {
            transform: &transform,
            ..*ctx
        };

        let plan = self.plan();
        let table = resolve_table(ctx.source, plan.tables).await?;
        let order_key = resolve_order_key(ctx.source, &table, &plan).await?;
        let order_refs: Vec<&str> = order_key.iter().map(String::as_str).collect();
        debug!(
            "{}: reading {} ordered by {}",
            self.kind(),
            table,
            order_key.join(", ")
        );

        let query = ChunkedQuery::new((plan.query)(&table)?, &order_refs)?;
        let mut reader = ChunkedReader::new(ctx.source, query, Vec::new(), chunk_size)?;

        while let Some(row) = reader.next_row().await? {
            match self.transform(&row, ctx, tally).await? {
                Transformed::Write(record) => {
                    write_record(self.kind(), self.preserve_ids(), record, ctx, log).await?;
                    tally.written += 1;
                }
                Transformed::Skip(reason) => {
                    tally.skipped += 1;
                    if tally.skipped <= SKIP_LOG_LIMIT {
                        log.push(format!("Skipped: {}", reason));
                    }
                }
            }
        }

        debug!(
            "{}: {} pages, {} rows read",
            self.kind(),
            reader.pages_fetched(),
            reader.rows_yielded()
        );
        Ok(())
    }
}

async fn write_record(
    kind: EntityKind,
    preserve_ids: bool,
    record: Record,
    ctx: &RunContext<'_>,
    log: &mut MigrationLog,
) -> Result<()> {
    if preserve_ids {
        if let (Some(source_id), Some(id)) = (record.source_id, record.get("id").cloned()) {
            if ctx.target.find_id(record.table, "id", &id).await?.is_some() {
                let table = record.table;
                let assigned = ctx.target.write(&record.without("id")).await?;
                let new_id = i64::try_from(assigned).map_err(|_| {
                    MigrateError::write(table, format!("assigned id {} is out of range", assigned))
                })?;
                ctx.transform.remap.insert(table, source_id, new_id);
                log.push(format!(
                    "{} #{} already taken in {}, stored as #{}",
                    kind.label(),
                    source_id,
                    table,
                    new_id
                ));
                return Ok(());
            }
        }
    }

    ctx.target.write(&record).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySource;

    fn plan(order_keys: &'static [&'static [&'static str]]) -> SourcePlan {
        SourcePlan {
            tables: &["tsf_forums", "forums"],
            query: select_all,
            order_keys,
            alias: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_table_takes_first_existing() {
        let source = MemorySource::new()
            .with_table("forums", &["id"], vec![])
            .with_table("categories", &["id"], vec![]);
        let table = resolve_table(&source, &["tsf_forums", "forums", "categories"])
            .await
            .unwrap();
        assert_eq!(table, "forums");

        let err = resolve_table(&source, &["tsf_posts", "posts"]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not find a matching source table. Tried: tsf_posts, posts"
        );
    }

    #[tokio::test]
    async fn test_resolve_order_key() {
        let source = MemorySource::new().with_table("forums", &["fid", "name"], vec![]);
        let key = resolve_order_key(&source, "forums", &plan(&[&["id"], &["fid"]]))
            .await
            .unwrap();
        assert_eq!(key, vec!["fid".to_string()]);

        let aliased = SourcePlan {
            alias: Some("f"),
            ..plan(&[&["fid", "name"]])
        };
        let key = resolve_order_key(&source, "forums", &aliased).await.unwrap();
        assert_eq!(key, vec!["f.fid".to_string(), "f.name".to_string()]);

        let err = resolve_order_key(&source, "forums", &plan(&[&["id"]]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no usable ordering key"));
    }

    #[test]
    fn test_completion_line() {
        let mut tally = Tally {
            written: 12,
            ..Default::default()
        };
        assert_eq!(
            tally.completion_line(EntityKind::Users),
            "User migration completed: 12 records migrated"
        );

        tally.skipped = 2;
        tally.note("used fallback group");
        tally.note("used fallback group");
        assert_eq!(
            tally.completion_line(EntityKind::Users),
            "User migration completed: 12 records migrated, 2 skipped (2 used fallback group)"
        );
    }

    #[test]
    fn test_select_all_quotes() {
        assert_eq!(select_all("users").unwrap(), "SELECT * FROM `users`");
        assert_eq!(select_all("odd`name").unwrap(), "SELECT * FROM `odd``name`");
        assert!(select_all("").is_err());
    }
}
