//! Forum categories, threads and posts.
//!
//! Legacy installs name these tables differently, so each entity lists the
//! candidate table names and ordering columns the procedures look for.
//! Source ids are kept where the destination allows it; threads and posts
//! follow their parent through the [`super::IdRemap`].

use super::{int_or, opt_flag, parse_legacy_date, required_id, text, TransformContext};
use crate::core::value::{Record, Row};
use crate::error::Result;

pub const FORUMS_TABLE: &str = "forums";
pub const THREADS_TABLE: &str = "forum_threads";
pub const POSTS_TABLE: &str = "forum_posts";

pub const FORUM_SOURCES: &[&str] = &[
    "tsf_forums",
    "forums",
    "forum_categories",
    "forum_sections",
    "categories",
];
pub const THREAD_SOURCES: &[&str] = &["tsf_threads", "forum_threads", "threads", "topics", "forum_topics"];
pub const POST_SOURCES: &[&str] = &["tsf_posts", "forum_posts", "posts", "messages", "forum_messages"];

const FORUM_ID: &[&str] = &["fid", "id", "forum_id"];
const THREAD_ID: &[&str] = &["tid", "id", "thread_id"];
const POST_ID: &[&str] = &["pid", "id", "post_id"];
const AUTHOR: &[&str] = &["user_id", "uid", "author_id"];

/// Name used for the duplicate check against existing destination forums.
pub fn forum_name(row: &Row) -> String {
    text(row, &["name", "forum_name"]).unwrap_or_else(|| "Forum".to_string())
}

pub fn forum(row: &Row, ctx: &TransformContext) -> Result<Record> {
    let id = required_id(row, FORUM_ID, FORUMS_TABLE)?;

    Ok(Record::new(FORUMS_TABLE)
        .with_source_id(id)
        .set("id", id)
        .set("name", forum_name(row))
        .set(
            "description",
            text(row, &["description", "forum_desc"]).unwrap_or_default(),
        )
        .set("position", id)
        .set("created_at", ctx.now)
        .set("updated_at", ctx.now))
}

/// Destination forum id of a thread's parent.
pub fn thread_forum_id(row: &Row, ctx: &TransformContext) -> i64 {
    ctx.remap
        .apply(FORUMS_TABLE, int_or(row, &["forum_id", "fid"], 0))
}

pub fn thread(row: &Row, forum_id: i64, ctx: &TransformContext) -> Result<Record> {
    let id = required_id(row, THREAD_ID, THREADS_TABLE)?;
    let created = parse_legacy_date(row.first_of(&["thread_date", "created_at", "post_date"]));

    Ok(Record::new(THREADS_TABLE)
        .with_source_id(id)
        .set("id", id)
        .set("forum_id", forum_id)
        .set("user_id", ctx.user_id(int_or(row, AUTHOR, 0)))
        .set(
            "title",
            text(row, &["title", "thread_title", "subject"]).unwrap_or_else(|| "Thread".to_string()),
        )
        .set("sticky", opt_flag(row, &["sticky", "pinned"]).unwrap_or(false))
        .set("locked", opt_flag(row, &["locked", "closed"]).unwrap_or(false))
        .set("views", int_or(row, &["views"], 0))
        .set("created_at", created.unwrap_or(ctx.now))
        .set("updated_at", ctx.now))
}

/// Destination thread id of a post's parent.
pub fn post_thread_id(row: &Row, ctx: &TransformContext) -> i64 {
    ctx.remap
        .apply(THREADS_TABLE, int_or(row, &["thread_id", "tid"], 0))
}

pub fn post(row: &Row, thread_id: i64, ctx: &TransformContext) -> Result<Record> {
    let id = required_id(row, POST_ID, POSTS_TABLE)?;
    let created = parse_legacy_date(row.first_of(&["post_date", "created_at", "date_posted"]));
    let edited = parse_legacy_date(row.first_of(&["edited_at", "edited_time", "updated_at"]));

    Ok(Record::new(POSTS_TABLE)
        .with_source_id(id)
        .set("id", id)
        .set("thread_id", thread_id)
        .set("user_id", ctx.user_id(int_or(row, AUTHOR, 0)))
        .set(
            "content",
            text(row, &["post_text", "message", "content", "body"]).unwrap_or_default(),
        )
        .set("created_at", created.unwrap_or(ctx.now))
        .set("updated_at", edited.unwrap_or(ctx.now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;
    use crate::transform::{test_context, test_row};

    #[test]
    fn test_forum_keeps_source_id() {
        let ctx = test_context();
        let row = test_row(&[
            ("fid", SqlValue::I64(4)),
            ("name", SqlValue::from("Announcements")),
            ("description", SqlValue::Null),
        ]);
        let r = forum(&row, &ctx).unwrap();
        assert_eq!(r.get("id"), Some(&SqlValue::I64(4)));
        assert_eq!(r.get("position"), Some(&SqlValue::I64(4)));
        assert_eq!(r.get("description"), Some(&SqlValue::from("")));
        assert_eq!(forum_name(&row), "Announcements");
    }

    #[test]
    fn test_thread_follows_remapped_forum() {
        let ctx = test_context();
        ctx.remap.insert(FORUMS_TABLE, 4, 40);
        let row = test_row(&[
            ("tid", SqlValue::I64(100)),
            ("fid", SqlValue::I64(4)),
            ("uid", SqlValue::I64(5)),
            ("subject", SqlValue::from("Welcome")),
            ("pinned", SqlValue::I64(1)),
            ("thread_date", SqlValue::I64(1_234_567_890)),
        ]);
        let forum_id = thread_forum_id(&row, &ctx);
        assert_eq!(forum_id, 40);

        let r = thread(&row, forum_id, &ctx).unwrap();
        assert_eq!(r.get("id"), Some(&SqlValue::I64(100)));
        assert_eq!(r.get("title"), Some(&SqlValue::from("Welcome")));
        assert_eq!(r.get("sticky"), Some(&SqlValue::Bool(true)));
        assert_eq!(r.get("locked"), Some(&SqlValue::Bool(false)));
        assert_ne!(r.get("created_at"), Some(&SqlValue::DateTime(ctx.now)));
    }

    #[test]
    fn test_post_body_columns() {
        let ctx = test_context();
        let row = test_row(&[
            ("pid", SqlValue::I64(7)),
            ("tid", SqlValue::I64(100)),
            ("message", SqlValue::from("first!")),
        ]);
        assert_eq!(post_thread_id(&row, &ctx), 100);
        let r = post(&row, 100, &ctx).unwrap();
        assert_eq!(r.get("content"), Some(&SqlValue::from("first!")));
        assert_eq!(r.get("updated_at"), Some(&SqlValue::DateTime(ctx.now)));
    }

    #[test]
    fn test_post_without_id_fails() {
        let ctx = test_context();
        let row = test_row(&[("message", SqlValue::from("orphan"))]);
        assert!(post(&row, 1, &ctx).is_err());
    }
}
