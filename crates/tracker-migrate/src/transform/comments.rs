//! Legacy torrent comments to the destination's polymorphic `comments` table.

use super::{info_hash_hex, int_or, parse_legacy_date, text, TransformContext};
use crate::core::value::{Record, Row, SqlValue};

pub const TABLE: &str = "comments";

/// Comments reference torrents by legacy id; the join brings in the info
/// hash so the migrated torrent can be found.
pub const SOURCE_QUERY: &str = "SELECT c.id, c.text, c.userid, c.added, c.anonymous, \
     t.info_hash FROM `comments` c LEFT JOIN `torrents` t ON t.id = c.torrent";

const COMMENTABLE_TYPE: &str = "App\\Models\\Torrent";

pub fn info_hash(row: &Row) -> Option<String> {
    info_hash_hex(row.get("info_hash"))
}

pub fn transform(row: &Row, torrent_id: i64, ctx: &TransformContext) -> Record {
    let added = parse_legacy_date(row.get("added")).unwrap_or(ctx.now);
    let mut record = Record::new(TABLE);
    if let Some(id) = row.get("id").and_then(SqlValue::as_i64) {
        record = record.with_source_id(id);
    }

    record
        .set("content", text(row, &["text"]).unwrap_or_default())
        .set("anon", row.get("anonymous").is_some_and(SqlValue::is_truthy))
        .set("commentable_id", torrent_id)
        .set("commentable_type", COMMENTABLE_TYPE)
        .set("user_id", ctx.user_id(int_or(row, &["userid", "user_id"], 0)))
        .set("created_at", added)
        .set("updated_at", added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{test_context, test_row};

    #[test]
    fn test_comment_record() {
        let ctx = test_context();
        let row = test_row(&[
            ("id", SqlValue::I64(31)),
            ("text", SqlValue::from("thanks for the upload")),
            ("userid", SqlValue::I64(4)),
            ("added", SqlValue::from("2012-12-12 12:12:12")),
            ("anonymous", SqlValue::from("yes")),
            ("info_hash", SqlValue::Bytes(vec![0xee; 20])),
        ]);
        assert_eq!(info_hash(&row), Some("ee".repeat(20)));

        let r = transform(&row, 8, &ctx);
        assert_eq!(r.source_id, Some(31));
        assert_eq!(r.get("commentable_id"), Some(&SqlValue::I64(8)));
        assert_eq!(
            r.get("commentable_type"),
            Some(&SqlValue::from("App\\Models\\Torrent"))
        );
        assert_eq!(r.get("anon"), Some(&SqlValue::Bool(true)));
        assert_eq!(r.get("created_at"), r.get("updated_at"));
        assert_ne!(r.get("created_at"), Some(&SqlValue::DateTime(ctx.now)));
    }

    #[test]
    fn test_orphan_comment_has_no_hash() {
        let row = test_row(&[("id", SqlValue::I64(1)), ("info_hash", SqlValue::Null)]);
        assert_eq!(info_hash(&row), None);
    }
}
