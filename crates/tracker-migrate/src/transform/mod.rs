//! Row-to-record transforms, one module per entity.
//!
//! Transforms are synchronous and side-effect free apart from reading the
//! [`IdRemap`]; anything that needs the destination (duplicate checks,
//! foreign-key lookups) happens in the migration procedures before the
//! transform is called.

pub mod comments;
pub mod forums;
pub mod peers;
pub mod snatched;
pub mod torrents;
pub mod users;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::config::MigrationConfig;
use crate::core::value::{Record, Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Columns tried for the legacy user group when none is configured.
pub const GROUP_COLUMNS: &[&str] = &[
    "usergroup",
    "group_id",
    "class",
    "rank",
    "role_id",
    "permission_id",
    "user_class",
    "level",
];

/// Ids used when neither the configuration nor the destination has one.
pub const DEFAULT_GROUP_ID: i64 = 3;
pub const DEFAULT_CATEGORY_ID: i64 = 1;
pub const DEFAULT_TYPE_ID: i64 = 3;

/// Outcome of transforming one source row.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    /// Write this record.
    Write(Record),
    /// Leave the row behind, with the reason.
    Skip(String),
}

/// Source id -> destination id pairs for rows that could not keep their id.
///
/// Keyed by destination table so that user, forum and thread ids live side
/// by side.
#[derive(Debug, Default)]
pub struct IdRemap {
    ids: Mutex<HashMap<(&'static str, i64), i64>>,
}

impl IdRemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination id for a source id; unchanged unless it was remapped.
    pub fn apply(&self, table: &'static str, source_id: i64) -> i64 {
        self.ids
            .lock()
            .map(|ids| ids.get(&(table, source_id)).copied().unwrap_or(source_id))
            .unwrap_or(source_id)
    }

    pub fn insert(&self, table: &'static str, source_id: i64, destination_id: i64) {
        if let Ok(mut ids) = self.ids.lock() {
            ids.insert((table, source_id), destination_id);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.lock().map(|ids| ids.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything a transform may consult besides the row itself.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Fixed "now" for the run, used for created/updated stamps.
    pub now: NaiveDateTime,
    pub group_map: BTreeMap<i64, i64>,
    pub fallback_group_id: i64,
    pub group_columns: Vec<String>,
    /// Legacy user id -> legacy group, for installs that keep groups in a
    /// pivot table instead of a column on `users`.
    pub user_groups: HashMap<i64, i64>,
    pub category_map: BTreeMap<i64, i64>,
    pub fallback_category_id: i64,
    pub default_type_id: i64,
    pub remap: Arc<IdRemap>,
    settings: MigrationConfig,
}

impl TransformContext {
    pub fn new(config: &MigrationConfig, now: NaiveDateTime, remap: Arc<IdRemap>) -> Self {
        let group_columns = match &config.group_column {
            Some(column) => vec![column.clone()],
            None => GROUP_COLUMNS.iter().map(|c| c.to_string()).collect(),
        };

        Self {
            now,
            group_map: config.group_map.clone(),
            fallback_group_id: config.fallback_group_id.unwrap_or(DEFAULT_GROUP_ID),
            group_columns,
            user_groups: HashMap::new(),
            category_map: config.category_map.clone(),
            fallback_category_id: config.fallback_category_id.unwrap_or(DEFAULT_CATEGORY_ID),
            default_type_id: config.default_type_id.unwrap_or(DEFAULT_TYPE_ID),
            remap,
            settings: config.clone(),
        }
    }

    /// Configured values; these win over anything detected.
    pub fn settings(&self) -> &MigrationConfig {
        &self.settings
    }

    /// Destination id of a legacy user, `None` for 0/missing.
    pub fn user_id(&self, source_id: i64) -> Option<i64> {
        (source_id > 0).then(|| self.remap.apply("users", source_id))
    }
}

/// First non-NULL value among `names`, as owned text.
pub fn text(row: &Row, names: &[&str]) -> Option<String> {
    row.first_of(names)
        .and_then(SqlValue::as_text)
        .map(|t| t.into_owned())
}

/// First non-NULL value among `names` as an integer, or `default`.
pub fn int_or(row: &Row, names: &[&str], default: i64) -> i64 {
    row.first_of(names)
        .and_then(SqlValue::as_i64)
        .unwrap_or(default)
}

pub fn float_or(row: &Row, names: &[&str], default: f64) -> f64 {
    row.first_of(names)
        .and_then(SqlValue::as_f64)
        .unwrap_or(default)
}

/// `'yes'`/`'no'` enum column.
pub fn yes(row: &Row, names: &[&str]) -> bool {
    text(row, names)
        .map(|v| v.trim().eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

/// Permission-style flag: `None` when the column is absent or NULL.
pub fn opt_flag(row: &Row, names: &[&str]) -> Option<bool> {
    row.first_of(names).map(SqlValue::is_truthy)
}

/// Primary key of the source row. Missing or non-numeric ids fail the transform.
pub fn required_id(row: &Row, names: &[&str], entity: &str) -> Result<i64> {
    match row.first_of(names) {
        Some(value) => value.as_i64().ok_or_else(|| {
            MigrateError::transform(
                entity,
                format!(
                    "non-numeric {} {:?}",
                    names[0],
                    value.as_text().unwrap_or_default()
                ),
            )
        }),
        None => Err(MigrateError::transform(
            entity,
            format!("row has no {} column", names.join("/")),
        )),
    }
}

/// Parse the date formats found in the legacy schema.
///
/// Unix timestamps (numeric or numeric strings), `Y-m-d H:i:s` and `Y-m-d`
/// are accepted; zero dates, `'0'`, non-positive timestamps and garbage give
/// `None`.
pub fn parse_legacy_date(value: Option<&SqlValue>) -> Option<NaiveDateTime> {
    match value? {
        SqlValue::Null => None,
        SqlValue::DateTime(dt) => Some(*dt),
        SqlValue::Date(d) => d.and_hms_opt(0, 0, 0),
        SqlValue::I64(ts) => from_unix(*ts),
        SqlValue::U64(ts) => i64::try_from(*ts).ok().and_then(from_unix),
        other => {
            let raw = other.as_text()?;
            let raw = raw.trim();
            if raw.is_empty() || raw == "0" || raw.starts_with("0000-00-00") {
                return None;
            }
            if raw.bytes().all(|b| b.is_ascii_digit()) {
                return raw.parse().ok().and_then(from_unix);
            }
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
    }
}

fn from_unix(ts: i64) -> Option<NaiveDateTime> {
    if ts <= 0 {
        return None;
    }
    DateTime::from_timestamp(ts, 0).map(|dt| dt.naive_utc())
}

/// Normalize an info hash to 40 lowercase hex characters.
///
/// The legacy tables store BINARY(20); some installs store the hex form. Any
/// value that does not end up as 40 hex characters is rejected.
pub fn info_hash_hex(value: Option<&SqlValue>) -> Option<String> {
    let raw = value?.as_bytes()?;
    if raw.is_empty() {
        return None;
    }

    let hex = if raw.len() == 40 && raw.iter().all(u8::is_ascii_hexdigit) {
        String::from_utf8_lossy(raw).to_ascii_lowercase()
    } else {
        raw.iter().map(|b| format!("{:02x}", b)).collect()
    };

    (hex.len() == 40).then_some(hex)
}

/// URL slug: lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Fresh 32-character hex key for passkeys and RSS keys.
pub fn random_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
pub(crate) fn test_context() -> TransformContext {
    let now = NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(3, 4, 5))
        .unwrap();
    let mut config = MigrationConfig::default();
    config.group_map.insert(1, 3);
    config.group_map.insert(4, 10);
    config.category_map.insert(7, 2);
    TransformContext::new(&config, now, Arc::new(IdRemap::new()))
}

#[cfg(test)]
pub(crate) fn test_row(pairs: &[(&str, SqlValue)]) -> Row {
    let columns: Arc<[String]> = pairs.iter().map(|(c, _)| c.to_string()).collect();
    Row::new(columns, pairs.iter().map(|(_, v)| v.clone()).collect())
}
