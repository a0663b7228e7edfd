//! One [`EntityMigration`] per entity.
//!
//! The row mapping itself lives in [`crate::transform`]; the procedures add
//! what needs the destination: duplicate checks and parent lookups.

use async_trait::async_trait;

use super::entity::EntityKind;
use super::log::MigrationLog;
use super::mapping::{detect_categories, detect_groups};
use super::template::{select_all, EntityMigration, RunContext, SourcePlan, Tally};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};
use crate::transform::{
    comments, forums, peers, snatched, torrents, users, TransformContext, Transformed,
};

/// Procedure for an entity.
pub fn procedure(kind: EntityKind) -> Box<dyn EntityMigration> {
    match kind {
        EntityKind::Users => Box::new(Users),
        EntityKind::Torrents => Box::new(Torrents),
        EntityKind::Peers => Box::new(Peers),
        EntityKind::Snatched => Box::new(Snatched),
        EntityKind::ForumCategories => Box::new(ForumCategories),
        EntityKind::ForumThreads => Box::new(ForumThreads),
        EntityKind::ForumPosts => Box::new(ForumPosts),
        EntityKind::Comments => Box::new(Comments),
    }
}

/// Keys that identify a peer or snatch row. A user alone is not unique, so
/// tables without one of these cannot be paged safely.
const UNIQUE_PER_USER_TORRENT: &[&[&str]] = &[
    &["id"],
    &["userid", "infohash"],
    &["userid", "info_hash"],
];

fn has_text(value: &SqlValue) -> bool {
    value.as_text().is_some_and(|t| !t.is_empty())
}

/// Id of the migrated torrent with this info hash.
async fn torrent_by_hash(ctx: &RunContext<'_>, info_hash: &str) -> Result<Option<i64>> {
    ctx.target
        .find_id(torrents::TABLE, "info_hash", &SqlValue::from(info_hash))
        .await
}

pub struct Users;

#[async_trait]
impl EntityMigration for Users {
    fn kind(&self) -> EntityKind {
        EntityKind::Users
    }

    fn plan(&self) -> SourcePlan {
        SourcePlan {
            tables: &["users"],
            query: select_all,
            order_keys: &[&["id"]],
            alias: None,
        }
    }

    fn preserve_ids(&self) -> bool {
        true
    }

    async fn prepare(
        &self,
        ctx: &RunContext<'_>,
        transform: &mut TransformContext,
        log: &mut MigrationLog,
    ) -> Result<()> {
        let mapping = detect_groups(ctx.source, ctx.target, transform, log).await?;
        mapping.apply(transform);
        Ok(())
    }

    async fn transform(
        &self,
        row: &Row,
        ctx: &RunContext<'_>,
        tally: &mut Tally,
    ) -> Result<Transformed> {
        let record = match users::transform(row, ctx.transform)? {
            Transformed::Write(record) => record,
            skip => return Ok(skip),
        };
        let source_id = record.source_id.unwrap_or_default();

        // An existing username is the same person: content owned by the
        // legacy user follows the destination account.
        if let Some(username) = record.get("username").filter(|v| has_text(v)) {
            if let Some(existing) = ctx.target.find_id(users::TABLE, "username", username).await? {
                ctx.transform.remap.insert(users::TABLE, source_id, existing);
                return Ok(Transformed::Skip(format!(
                    "user #{} has a username that already exists as user #{}",
                    source_id, existing
                )));
            }
        }
        // A shared email alone does not identify the account.
        if let Some(email) = record.get("email").filter(|v| has_text(v)) {
            if ctx.target.find_id(users::TABLE, "email", email).await?.is_some() {
                return Ok(Transformed::Skip(format!(
                    "user #{} has an email that already exists",
                    source_id
                )));
            }
        }

        if users::resolve_group(row, ctx.transform).2 {
            tally.note("used fallback group");
        }
        Ok(Transformed::Write(record))
    }
}

pub struct Torrents;

#[async_trait]
impl EntityMigration for Torrents {
    fn kind(&self) -> EntityKind {
        EntityKind::Torrents
    }

    fn plan(&self) -> SourcePlan {
        SourcePlan {
            tables: &["torrents"],
            query: |_| Ok(torrents::SOURCE_QUERY.to_string()),
            order_keys: &[&["id"]],
            alias: None,
        }
    }

    async fn prepare(
        &self,
        ctx: &RunContext<'_>,
        transform: &mut TransformContext,
        log: &mut MigrationLog,
    ) -> Result<()> {
        detect_categories(ctx.source, ctx.target, log)
            .await?
            .apply(transform);
        Ok(())
    }

    async fn transform(
        &self,
        row: &Row,
        ctx: &RunContext<'_>,
        _tally: &mut Tally,
    ) -> Result<Transformed> {
        let record = match torrents::transform(row, ctx.transform)? {
            Transformed::Write(record) => record,
            skip => return Ok(skip),
        };

        if let Some(hash) = record.get("info_hash").and_then(SqlValue::as_text) {
            if torrent_by_hash(ctx, &hash).await?.is_some() {
                return Ok(Transformed::Skip(format!(
                    "torrent #{} ({}) already exists",
                    record.source_id.unwrap_or_default(),
                    hash
                )));
            }
        }
        Ok(Transformed::Write(record))
    }
}

pub struct Peers;

#[async_trait]
impl EntityMigration for Peers {
    fn kind(&self) -> EntityKind {
        EntityKind::Peers
    }

    fn plan(&self) -> SourcePlan {
        SourcePlan {
            tables: &["peers"],
            query: select_all,
            order_keys: UNIQUE_PER_USER_TORRENT,
            alias: None,
        }
    }

    async fn prepare(
        &self,
        ctx: &RunContext<'_>,
        _transform: &mut TransformContext,
        log: &mut MigrationLog,
    ) -> Result<()> {
        if ctx.target.row_count(torrents::TABLE).await? == 0 {
            log.push("No torrents found in the destination; migrate torrents first, then re-run peers");
            return Err(MigrateError::Prerequisite(
                "no torrents in the destination, run the torrent migration first".to_string(),
            ));
        }
        Ok(())
    }

    async fn transform(
        &self,
        row: &Row,
        ctx: &RunContext<'_>,
        _tally: &mut Tally,
    ) -> Result<Transformed> {
        let Some(hash) = peers::info_hash(row) else {
            return Ok(Transformed::Skip(
                "peer without a usable info hash".to_string(),
            ));
        };
        let Some(torrent_id) = torrent_by_hash(ctx, &hash).await? else {
            return Ok(Transformed::Skip(format!(
                "peer of torrent {} which was not migrated",
                hash
            )));
        };

        Ok(Transformed::Write(peers::transform(
            row,
            &hash,
            torrent_id,
            ctx.transform,
        )))
    }
}

pub struct Snatched;

#[async_trait]
impl EntityMigration for Snatched {
    fn kind(&self) -> EntityKind {
        EntityKind::Snatched
    }

    fn plan(&self) -> SourcePlan {
        SourcePlan {
            tables: &["snatched"],
            query: select_all,
            order_keys: UNIQUE_PER_USER_TORRENT,
            alias: None,
        }
    }

    async fn transform(
        &self,
        row: &Row,
        ctx: &RunContext<'_>,
        _tally: &mut Tally,
    ) -> Result<Transformed> {
        Ok(snatched::transform(row, ctx.transform))
    }
}

pub struct ForumCategories;

#[async_trait]
impl EntityMigration for ForumCategories {
    fn kind(&self) -> EntityKind {
        EntityKind::ForumCategories
    }

    fn plan(&self) -> SourcePlan {
        SourcePlan {
            tables: forums::FORUM_SOURCES,
            query: select_all,
            order_keys: &[&["fid"], &["id"], &["forum_id"]],
            alias: None,
        }
    }

    fn preserve_ids(&self) -> bool {
        true
    }

    async fn transform(
        &self,
        row: &Row,
        ctx: &RunContext<'_>,
        _tally: &mut Tally,
    ) -> Result<Transformed> {
        let name = forums::forum_name(row);
        let record = forums::forum(row, ctx.transform)?;

        if let Some(existing) = ctx
            .target
            .find_id(forums::FORUMS_TABLE, "name", &SqlValue::from(name.as_str()))
            .await?
        {
            if let Some(source_id) = record.source_id {
                ctx.transform
                    .remap
                    .insert(forums::FORUMS_TABLE, source_id, existing);
            }
            return Ok(Transformed::Skip(format!(
                "forum '{}' already exists as #{}",
                name, existing
            )));
        }
        Ok(Transformed::Write(record))
    }
}

pub struct ForumThreads;

#[async_trait]
impl EntityMigration for ForumThreads {
    fn kind(&self) -> EntityKind {
        EntityKind::ForumThreads
    }

    fn plan(&self) -> SourcePlan {
        SourcePlan {
            tables: forums::THREAD_SOURCES,
            query: select_all,
            order_keys: &[&["tid"], &["id"], &["thread_id"]],
            alias: None,
        }
    }

    fn preserve_ids(&self) -> bool {
        true
    }

    async fn transform(
        &self,
        row: &Row,
        ctx: &RunContext<'_>,
        _tally: &mut Tally,
    ) -> Result<Transformed> {
        let forum_id = forums::thread_forum_id(row, ctx.transform);
        let parent = ctx
            .target
            .find_id(forums::FORUMS_TABLE, "id", &SqlValue::I64(forum_id))
            .await?;
        if parent.is_none() {
            return Ok(Transformed::Skip(format!(
                "thread in forum #{} which was not migrated",
                forum_id
            )));
        }

        Ok(Transformed::Write(forums::thread(row, forum_id, ctx.transform)?))
    }
}

pub struct ForumPosts;

#[async_trait]
impl EntityMigration for ForumPosts {
    fn kind(&self) -> EntityKind {
        EntityKind::ForumPosts
    }

    fn plan(&self) -> SourcePlan {
        SourcePlan {
            tables: forums::POST_SOURCES,
            query: select_all,
            order_keys: &[&["pid"], &["id"], &["post_id"]],
            alias: None,
        }
    }

    fn preserve_ids(&self) -> bool {
        true
    }

    async fn transform(
        &self,
        row: &Row,
        ctx: &RunContext<'_>,
        _tally: &mut Tally,
    ) -> Result<Transformed> {
        let thread_id = forums::post_thread_id(row, ctx.transform);
        let parent = ctx
            .target
            .find_id(forums::THREADS_TABLE, "id", &SqlValue::I64(thread_id))
            .await?;
        if parent.is_none() {
            return Ok(Transformed::Skip(format!(
                "post in thread #{} which was not migrated",
                thread_id
            )));
        }

        Ok(Transformed::Write(forums::post(row, thread_id, ctx.transform)?))
    }
}

pub struct Comments;

#[async_trait]
impl EntityMigration for Comments {
    fn kind(&self) -> EntityKind {
        EntityKind::Comments
    }

    fn plan(&self) -> SourcePlan {
        SourcePlan {
            tables: &["comments"],
            query: |_| Ok(comments::SOURCE_QUERY.to_string()),
            order_keys: &[&["id"]],
            alias: Some("c"),
        }
    }

    async fn transform(
        &self,
        row: &Row,
        ctx: &RunContext<'_>,
        _tally: &mut Tally,
    ) -> Result<Transformed> {
        let Some(hash) = comments::info_hash(row) else {
            return Ok(Transformed::Skip(
                "comment on a torrent that no longer exists".to_string(),
            ));
        };
        let Some(torrent_id) = torrent_by_hash(ctx, &hash).await? else {
            return Ok(Transformed::Skip(format!(
                "comment on torrent {} which was not migrated",
                hash
            )));
        };

        Ok(Transformed::Write(comments::transform(
            row,
            torrent_id,
            ctx.transform,
        )))
    }
}
