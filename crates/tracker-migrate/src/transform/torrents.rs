//! Legacy `torrents` rows to destination `torrents` records.

use super::{
    float_or, info_hash_hex, int_or, parse_legacy_date, required_id, text, yes, TransformContext,
    Transformed,
};
use crate::core::value::{Record, Row};
use crate::error::Result;

pub const TABLE: &str = "torrents";

/// Banned torrents are filtered in SQL; invisible ones are skipped per row.
pub const SOURCE_QUERY: &str = "SELECT id, info_hash, name, filename, descr, category, size, \
     added, numfiles, leechers, seeders, times_completed, hits, visible, banned, owner, free, \
     anonymous, sticky FROM `torrents` WHERE banned = 'no'";

pub fn transform(row: &Row, ctx: &TransformContext) -> Result<Transformed> {
    let id = required_id(row, &["id"], TABLE)?;

    if text(row, &["visible"]).as_deref() == Some("no") {
        return Ok(Transformed::Skip(format!("torrent #{} is not visible", id)));
    }

    let Some(info_hash) = info_hash_hex(row.get("info_hash")) else {
        return Ok(Transformed::Skip(format!(
            "torrent #{} has an invalid info_hash",
            id
        )));
    };

    let source_category = int_or(row, &["category"], 0);
    let category_id = ctx
        .category_map
        .get(&source_category)
        .copied()
        .unwrap_or(ctx.fallback_category_id);

    let name = text(row, &["name"]).unwrap_or_else(|| "Unknown".to_string());
    let slug = match super::slugify(&name) {
        s if s.is_empty() => format!("torrent-{}", id),
        s => s,
    };
    let file_name = text(row, &["filename"]).unwrap_or_else(|| format!("{}.torrent", slug));
    let sticky = yes(row, &["sticky"]);
    let owner = int_or(row, &["owner"], 1).max(1);

    // The destination assigns a new id; torrents are matched by info hash.
    let record = Record::new(TABLE)
        .with_source_id(id)
        .set("name", name)
        .set("slug", slug)
        .set("description", text(row, &["descr"]).unwrap_or_default())
        .set("info_hash", info_hash)
        .set("file_name", file_name)
        .set("num_file", int_or(row, &["numfiles"], 1).max(1))
        .set("size", float_or(row, &["size"], 0.0))
        .set("leechers", int_or(row, &["leechers"], 0).max(0))
        .set("seeders", int_or(row, &["seeders"], 0).max(0))
        .set("times_completed", int_or(row, &["times_completed"], 0).max(0))
        .set("category_id", category_id)
        .set("type_id", ctx.default_type_id)
        .set("user_id", ctx.user_id(owner))
        .set("imdb", "0")
        .set("tvdb", "0")
        .set("tmdb", "0")
        .set("mal", "0")
        .set("igdb", "0")
        .set("free", yes(row, &["free"]))
        .set("anon", yes(row, &["anonymous"]))
        .set("sticky", sticky)
        .set("featured", sticky)
        .set("status", 1i64)
        .set("moderated_at", ctx.now)
        .set("moderated_by", 1i64)
        .set("stream", false)
        .set("doubleup", false)
        .set("highspeed", false)
        .set("sd", false)
        .set("internal", false)
        .set(
            "created_at",
            parse_legacy_date(row.get("added")).unwrap_or(ctx.now),
        )
        .set("updated_at", ctx.now);

    Ok(Transformed::Write(record))
}
