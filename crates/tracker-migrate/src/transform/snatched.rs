//! Legacy `snatched` rows to destination `history` records.

use super::{info_hash_hex, int_or, parse_legacy_date, TransformContext, Transformed};
use crate::core::value::{Record, Row};

pub const TABLE: &str = "history";

pub fn transform(row: &Row, ctx: &TransformContext) -> Transformed {
    let Some(info_hash) = info_hash_hex(row.first_of(&["infohash", "info_hash"])) else {
        return Transformed::Skip("snatch without a usable info hash".to_string());
    };

    let uploaded = int_or(row, &["uploaded"], 0);
    let downloaded = int_or(row, &["downloaded"], 0);
    let completed_at = parse_legacy_date(row.first_of(&["snatched_time", "completedtime"]));

    Transformed::Write(
        Record::new(TABLE)
            .set("user_id", ctx.user_id(int_or(row, &["userid", "user_id"], 0)))
            .set("info_hash", info_hash)
            .set("uploaded", uploaded)
            .set("actual_uploaded", uploaded)
            .set("client_uploaded", uploaded)
            .set("downloaded", downloaded)
            .set("actual_downloaded", downloaded)
            .set("client_downloaded", downloaded)
            .set("seeder", false)
            .set("active", false)
            .set("seedtime", 0i64)
            .set("completed_at", completed_at)
            .set("created_at", ctx.now)
            .set("updated_at", ctx.now),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;
    use crate::transform::{test_context, test_row};

    #[test]
    fn test_snatch_to_history() {
        let ctx = test_context();
        ctx.remap.insert("users", 9, 90);
        let row = test_row(&[
            ("userid", SqlValue::I64(9)),
            ("infohash", SqlValue::Bytes(vec![0xcd; 20])),
            ("uploaded", SqlValue::I64(300)),
            ("downloaded", SqlValue::I64(100)),
            ("snatched_time", SqlValue::I64(1_234_567_890)),
        ]);
        let Transformed::Write(r) = transform(&row, &ctx) else {
            panic!("expected a record");
        };
        assert_eq!(r.table, "history");
        assert_eq!(r.get("user_id"), Some(&SqlValue::I64(90)));
        assert_eq!(r.get("client_uploaded"), Some(&SqlValue::I64(300)));
        assert_eq!(r.get("actual_downloaded"), Some(&SqlValue::I64(100)));
        assert!(matches!(r.get("completed_at"), Some(SqlValue::DateTime(_))));
    }

    #[test]
    fn test_zero_completion_time_is_null() {
        let ctx = test_context();
        let row = test_row(&[
            ("userid", SqlValue::I64(1)),
            ("infohash", SqlValue::from("ab".repeat(20))),
            ("completedtime", SqlValue::from("0000-00-00 00:00:00")),
        ]);
        let Transformed::Write(r) = transform(&row, &ctx) else {
            panic!("expected a record");
        };
        assert_eq!(r.get("completed_at"), Some(&SqlValue::Null));
    }

    #[test]
    fn test_missing_hash_skipped() {
        let ctx = test_context();
        let row = test_row(&[("userid", SqlValue::I64(1)), ("infohash", SqlValue::Null)]);
        assert!(matches!(transform(&row, &ctx), Transformed::Skip(_)));
    }
}
