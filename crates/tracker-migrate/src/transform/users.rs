//! Legacy `users` rows to destination `users` records.
//!
//! Passwords are not rehashed. The legacy `passhash`/`secret` pair is stored
//! next to an unusable password (`'!'`) so the application can verify and
//! upgrade it on first login.

use super::{
    float_or, int_or, opt_flag, parse_legacy_date, random_key, required_id, text, yes,
    TransformContext, Transformed,
};
use crate::core::value::{Record, Row, SqlValue};
use crate::error::Result;

pub const TABLE: &str = "users";

/// Legacy group, destination group, and whether the fallback was used.
///
/// The group comes from the group column when the row has one, otherwise
/// from the user/group pivot lookup, otherwise it is 0.
pub fn resolve_group(row: &Row, ctx: &TransformContext) -> (i64, i64, bool) {
    let columns: Vec<&str> = ctx.group_columns.iter().map(String::as_str).collect();
    let source_group = row
        .first_of(&columns)
        .and_then(SqlValue::as_i64)
        .or_else(|| ctx.user_groups.get(&int_or(row, &["id"], 0)).copied())
        .unwrap_or(0);
    match ctx.group_map.get(&source_group) {
        Some(group) => (source_group, *group, false),
        None => (source_group, ctx.fallback_group_id, true),
    }
}

pub fn transform(row: &Row, ctx: &TransformContext) -> Result<Transformed> {
    let id = required_id(row, &["id"], TABLE)?;
    let (_, group_id, _) = resolve_group(row, ctx);

    let username =
        text(row, &["username", "user_name", "name"]).unwrap_or_else(|| format!("user_{}", id));
    let email = text(row, &["email", "email_address", "mail"]).unwrap_or_default();

    let legacy_passhash = text(row, &["passhash"]);
    let legacy_secret = text(row, &["secret"]);
    let is_legacy = legacy_passhash.is_some() && legacy_secret.is_some();

    let passkey = text(row, &["torrent_pass", "passkey", "announce_key"]).unwrap_or_else(random_key);
    let rsskey = text(row, &["rsskey", "rss_key", "feed_key"]).unwrap_or_else(random_key);

    let email_verified_at =
        (text(row, &["status"]).as_deref() == Some("confirmed")).then_some(ctx.now);

    let can_download = opt_flag(row, &["can_leech", "can_download"]).unwrap_or(true);

    let record = Record::new(TABLE)
        .with_source_id(id)
        .set("id", id)
        .set("username", username)
        .set("email", email)
        .set("password", "!")
        .set("legacy_passhash", legacy_passhash)
        .set("legacy_secret", legacy_secret)
        .set("legacy", is_legacy)
        .set("passkey", passkey)
        .set("rsskey", rsskey)
        .set("group_id", group_id)
        .set("uploaded", int_or(row, &["uploaded", "upload"], 0))
        .set("downloaded", int_or(row, &["downloaded", "download"], 0))
        .set("seedbonus", float_or(row, &["seedbonus", "bonus", "points"], 0.0))
        .set("fl_tokens", int_or(row, &["fl_tokens", "freelech_tokens"], 0))
        .set("invites", int_or(row, &["invites"], 0))
        .set("hitandruns", int_or(row, &["hitandruns", "hnr"], 0))
        .set("image", text(row, &["avatar", "image", "profile_pic"]))
        .set("title", text(row, &["title", "custom_title"]))
        .set("about", text(row, &["page", "about", "profile", "bio"]))
        .set("signature", text(row, &["signature", "sig"]))
        .set("is_donor", yes(row, &["donor"]))
        .set("can_chat", opt_flag(row, &["can_chat"]))
        .set("can_download", can_download)
        .set("can_request", opt_flag(row, &["can_request"]))
        .set("can_invite", opt_flag(row, &["can_invite"]))
        .set("can_upload", opt_flag(row, &["can_upload"]))
        .set("email_verified_at", email_verified_at)
        .set(
            "last_login",
            parse_legacy_date(row.first_of(&["last_login", "lastvisit", "last_seen"])),
        )
        .set(
            "last_action",
            parse_legacy_date(row.first_of(&["last_access", "last_action"])),
        )
        .set(
            "created_at",
            parse_legacy_date(row.first_of(&[
                "added",
                "registered",
                "created_at",
                "joindate",
                "join_date",
            ]))
            .unwrap_or(ctx.now),
        )
        .set("updated_at", ctx.now);

    Ok(Transformed::Write(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{test_context, test_row};

    fn tsse_user() -> Row {
        test_row(&[
            ("id", SqlValue::I64(5)),
            ("username", SqlValue::from("alice")),
            ("email", SqlValue::from("alice@example.org")),
            ("passhash", SqlValue::from("5f4dcc3b5aa765d61d8327deb882cf99")),
            ("secret", SqlValue::from("s4lt")),
            ("torrent_pass", SqlValue::from("0123456789abcdef0123456789abcdef")),
            ("usergroup", SqlValue::I64(4)),
            ("uploaded", SqlValue::U64(1_073_741_824)),
            ("downloaded", SqlValue::from("2048")),
            ("donor", SqlValue::from("yes")),
            ("status", SqlValue::from("confirmed")),
            ("can_leech", SqlValue::I64(0)),
            ("added", SqlValue::from("2010-05-01 12:00:00")),
            ("last_access", SqlValue::from("0000-00-00 00:00:00")),
            ("page", SqlValue::from("hello")),
        ])
    }

    fn record(transformed: Transformed) -> Record {
        match transformed {
            Transformed::Write(record) => record,
            Transformed::Skip(reason) => panic!("unexpected skip: {}", reason),
        }
    }

    #[test]
    fn test_user_fields() {
        let ctx = test_context();
        let r = record(transform(&tsse_user(), &ctx).unwrap());

        assert_eq!(r.source_id, Some(5));
        assert_eq!(r.get("id"), Some(&SqlValue::I64(5)));
        assert_eq!(r.get("password"), Some(&SqlValue::from("!")));
        assert_eq!(r.get("legacy"), Some(&SqlValue::Bool(true)));
        assert_eq!(
            r.get("passkey"),
            Some(&SqlValue::from("0123456789abcdef0123456789abcdef"))
        );
        assert_eq!(r.get("group_id"), Some(&SqlValue::I64(10)));
        assert_eq!(r.get("uploaded"), Some(&SqlValue::I64(1_073_741_824)));
        assert_eq!(r.get("downloaded"), Some(&SqlValue::I64(2048)));
        assert_eq!(r.get("is_donor"), Some(&SqlValue::Bool(true)));
        assert_eq!(r.get("can_download"), Some(&SqlValue::Bool(false)));
        assert_eq!(r.get("can_chat"), Some(&SqlValue::Null));
        assert_eq!(r.get("email_verified_at"), Some(&SqlValue::DateTime(ctx.now)));
        assert_eq!(r.get("last_action"), Some(&SqlValue::Null));
        assert_eq!(r.get("about"), Some(&SqlValue::from("hello")));
        assert_eq!(r.get("updated_at"), Some(&SqlValue::DateTime(ctx.now)));
    }

    #[test]
    fn test_unmapped_group_uses_fallback() {
        let ctx = test_context();
        let row = test_row(&[("id", SqlValue::I64(8)), ("class", SqlValue::I64(99))]);
        assert_eq!(resolve_group(&row, &ctx), (99, ctx.fallback_group_id, true));

        let r = record(transform(&row, &ctx).unwrap());
        assert_eq!(r.get("group_id"), Some(&SqlValue::I64(ctx.fallback_group_id)));
        assert_eq!(r.get("username"), Some(&SqlValue::from("user_8")));
        assert_eq!(r.get("legacy"), Some(&SqlValue::Bool(false)));
        assert_eq!(r.get("created_at"), Some(&SqlValue::DateTime(ctx.now)));
        assert_eq!(r.get("can_download"), Some(&SqlValue::Bool(true)));
    }

    #[test]
    fn test_group_from_pivot_lookup() {
        let mut ctx = test_context();
        ctx.user_groups.insert(8, 4);
        let row = test_row(&[("id", SqlValue::I64(8))]);
        assert_eq!(resolve_group(&row, &ctx), (4, 10, false));

        let row = test_row(&[("id", SqlValue::I64(9))]);
        assert_eq!(resolve_group(&row, &ctx), (0, ctx.fallback_group_id, true));
    }

    #[test]
    fn test_missing_keys_are_generated() {
        let ctx = test_context();
        let row = test_row(&[("id", SqlValue::I64(2))]);
        let r = record(transform(&row, &ctx).unwrap());
        let passkey = r.get("passkey").and_then(SqlValue::as_text).unwrap();
        assert_eq!(passkey.len(), 32);
        assert_ne!(r.get("passkey"), r.get("rsskey"));
    }

    #[test]
    fn test_non_numeric_id_fails() {
        let ctx = test_context();
        let row = test_row(&[("id", SqlValue::from("abc"))]);
        assert!(transform(&row, &ctx).is_err());
    }
}
