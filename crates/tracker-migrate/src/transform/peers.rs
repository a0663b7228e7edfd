//! Legacy `peers` rows to destination `peers` records.

use super::{info_hash_hex, int_or, TransformContext};
use crate::core::value::{Record, Row, SqlValue};

pub const TABLE: &str = "peers";

const HASH_COLUMNS: &[&str] = &["infohash", "info_hash", "torrent_hash"];

/// Hex info hash of the peer's torrent, used to find the migrated torrent.
pub fn info_hash(row: &Row) -> Option<String> {
    info_hash_hex(row.first_of(HASH_COLUMNS))
}

/// Build the record once the destination torrent id is known.
pub fn transform(row: &Row, info_hash: &str, torrent_id: i64, ctx: &TransformContext) -> Record {
    let left = int_or(row, &["left"], 1);

    Record::new(TABLE)
        .set(
            "peer_id",
            row.first_of(&["peer_id", "peerid"])
                .cloned()
                .unwrap_or(SqlValue::Null),
        )
        .set("hash", info_hash)
        .set("ip", row.get("ip").cloned().unwrap_or(SqlValue::Null))
        .set("port", int_or(row, &["port"], 0))
        .set("left", int_or(row, &["left"], 0))
        .set("uploaded", int_or(row, &["uploaded"], 0))
        .set("downloaded", int_or(row, &["downloaded"], 0))
        .set("seeder", left == 0)
        .set("torrent_id", torrent_id)
        .set("user_id", ctx.user_id(int_or(row, &["userid", "user_id"], 0)))
        .set("created_at", ctx.now)
        .set("updated_at", ctx.now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{test_context, test_row};

    #[test]
    fn test_seeder_flag_follows_left() {
        let ctx = test_context();
        let seeding = test_row(&[
            ("userid", SqlValue::I64(5)),
            ("infohash", SqlValue::Bytes(vec![0x11; 20])),
            ("left", SqlValue::I64(0)),
            ("port", SqlValue::I64(51413)),
        ]);
        let hash = info_hash(&seeding).unwrap();
        assert_eq!(hash, "11".repeat(20));

        let r = transform(&seeding, &hash, 12, &ctx);
        assert_eq!(r.get("seeder"), Some(&SqlValue::Bool(true)));
        assert_eq!(r.get("torrent_id"), Some(&SqlValue::I64(12)));
        assert_eq!(r.get("user_id"), Some(&SqlValue::I64(5)));
        assert_eq!(r.get("port"), Some(&SqlValue::I64(51413)));

        let leeching = test_row(&[("userid", SqlValue::I64(0)), ("left", SqlValue::I64(1024))]);
        let r = transform(&leeching, &hash, 12, &ctx);
        assert_eq!(r.get("seeder"), Some(&SqlValue::Bool(false)));
        assert_eq!(r.get("user_id"), Some(&SqlValue::Null));
    }

    #[test]
    fn test_missing_left_is_not_a_seeder() {
        let ctx = test_context();
        let row = test_row(&[("userid", SqlValue::I64(1))]);
        let r = transform(&row, &"00".repeat(20), 1, &ctx);
        assert_eq!(r.get("seeder"), Some(&SqlValue::Bool(false)));
        assert!(info_hash(&row).is_none());
    }
}
