//! Legacy group and category ids to destination ids.
//!
//! Groups are detected from both databases before users are migrated:
//!
//! 1. Load the destination groups (`id`, `name`, `slug`)
//! 2. Find the group column on the legacy `users` table and the values in use
//! 3. Match each row of a legacy groups table by slug, name or keyword
//! 4. Map values still missing with the numeric class ladder
//! 5. Without a group column, read the user/group pivot table instead
//!
//! Categories are matched by name before torrents are migrated. Configured
//! maps and ids always win over detected ones.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::log::MigrationLog;
use super::template::{resolve_table, select_all};
use crate::core::identifier::quote_mysql;
use crate::core::traits::{DestinationWriter, SourceQuery};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};
use crate::transform::{
    int_or, slugify, text, TransformContext, DEFAULT_CATEGORY_ID, DEFAULT_GROUP_ID,
    DEFAULT_TYPE_ID, GROUP_COLUMNS,
};

/// Legacy tables that name the user groups.
const GROUP_TABLES: &[&str] = &[
    "groups",
    "user_groups",
    "member_groups",
    "permissions",
    "usergroups",
    "ranks",
    "classes",
    "user_classes",
    "roles",
    "user_roles",
    "tsf_groups",
    "tsf_user_groups",
    "tsf_classes",
    "tsf_roles",
];

/// Legacy user/group junction tables.
const PIVOT_TABLES: &[&str] = &[
    "users_groups",
    "user_group",
    "users_usergroups",
    "user_usergroup",
    "xbt_users_groups",
    "tsf_users_groups",
];
const PIVOT_USER_COLUMNS: &[&str] = &["user_id", "userid", "uid"];
const PIVOT_GROUP_COLUMNS: &[&str] = &["group_id", "groupid", "gid", "usergroup_id"];

/// Keyword -> destination slug, most specific first so that "power user"
/// matches before "user".
const KEYWORD_RULES: &[(&[&str], &str)] = &[
    (&["sysop", "sys op", "root", "siteop"], "administrator"),
    (&["owner", "founder", "co-owner", "coowner"], "owner"),
    (&["super admin", "superadmin"], "administrator"),
    (&["team leader", "team lead"], "administrator"),
    (&["security team", "sec team"], "administrator"),
    (&["admin", "administrator", "staff admin"], "administrator"),
    (&["technical team", "tech team"], "moderator"),
    (&["torrent mod", "torrent moderator", "torrentmod"], "torrent-moderator"),
    (&["forum mod", "forum moderator", "forummod"], "moderator"),
    (&["super mod", "supermod", "senior mod", "smod"], "moderator"),
    (&["mod", "moderator", "modo", "global mod"], "moderator"),
    (&["staff"], "moderator"),
    (&["site artist", "artist"], "uploader"),
    (&["encoder", "internal"], "uploader"),
    (&["uploader", "upload"], "uploader"),
    (&["trustee", "trusted", "trusted user"], "trustee"),
    (&["beta test", "beta tester", "beta"], "poweruser"),
    (&["ex vip", "exvip", "former vip", "ex-vip"], "poweruser"),
    (&["insane", "insaneuser"], "insaneuser"),
    (&["extreme", "extremeuser"], "extremeuser"),
    (&["super user", "superuser"], "superuser"),
    (&["power user", "poweruser", "powerpeer", "elite"], "poweruser"),
    (&["veteran", "vet"], "veteran"),
    (&["seeder", "top seeder"], "seeder"),
    (&["archivist"], "archivist"),
    (&["btc", "bitcoin", "crypto", "legend"], "vip"),
    (&["vip", "donator", "donor", "supporter", "premium"], "vip"),
    (&["ban", "banned", "suspended"], "banned"),
    (&["disabled", "deactivated", "locked"], "disabled"),
    (&["pruned", "deleted", "removed", "purged"], "pruned"),
    (
        &[
            "validating",
            "pending",
            "unvalidated",
            "inactive",
            "unconfirmed",
            "awaiting",
            "not confirmed",
            "parked",
        ],
        "validating",
    ),
    (&["leech", "leecher"], "leech"),
    (
        &["user", "member", "registered", "normal", "default", "regular", "guest", "basic"],
        "user",
    ),
];

/// Category keyword -> fragment of a destination category name.
const CATEGORY_KEYWORDS: &[(&[&str], &str)] = &[
    (&["movie", "film", "4k", "uhd", "bluray", "blu-ray"], "movie"),
    (&["tv show", "tv pack", "episode", "series", "season"], "tv show"),
    (&["music", "album", "discograph"], "music"),
    (&["anime"], "anime"),
    (&["ebook", "e-book", "comic", "audiobook"], "ebook"),
    (&["game", "xbox", "playstation", "nintendo"], "game"),
    (&["app", "software"], "software"),
    (&["sport", "fitness"], "sport"),
];

/// Destination slug for a TBDev-style numeric class.
fn class_slug(class: i64) -> &'static str {
    match class {
        1 => "poweruser",
        2 => "superuser",
        3 => "uploader",
        4 | 5 => "moderator",
        6 | 7 => "administrator",
        -1 => "banned",
        -2 => "disabled",
        _ => "user",
    }
}

/// A row of the destination `groups` table.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationGroup {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Matches legacy group names and classes against the destination groups.
pub struct GroupMatcher<'a> {
    groups: &'a [DestinationGroup],
    fallback: i64,
}

impl<'a> GroupMatcher<'a> {
    /// The fallback is the configured one, else the `user` group, else the
    /// first destination group.
    pub fn new(groups: &'a [DestinationGroup], configured_fallback: Option<i64>) -> Self {
        let fallback = configured_fallback
            .or_else(|| groups.iter().find(|g| g.slug == "user").map(|g| g.id))
            .or_else(|| groups.first().map(|g| g.id))
            .unwrap_or(DEFAULT_GROUP_ID);
        Self { groups, fallback }
    }

    pub fn fallback(&self) -> i64 {
        self.fallback
    }

    fn by_slug(&self, slug: &str) -> Option<i64> {
        self.groups.iter().find(|g| g.slug == slug).map(|g| g.id)
    }

    /// Slug, then name, then slugified and compact forms, then keywords.
    pub fn match_name(&self, name: &str) -> i64 {
        let lower = name.trim().to_lowercase();
        if lower.is_empty() {
            return self.fallback;
        }

        if let Some(id) = self.by_slug(&lower) {
            return id;
        }
        if let Some(g) = self.groups.iter().find(|g| g.name.to_lowercase() == lower) {
            return g.id;
        }
        if let Some(id) = self.by_slug(&slugify(&lower)) {
            return id;
        }
        let compact: String = lower
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect();
        if let Some(g) = self.groups.iter().find(|g| g.slug.replace('-', "") == compact) {
            return g.id;
        }

        for (keywords, slug) in KEYWORD_RULES {
            if keywords.iter().any(|kw| lower.contains(kw)) {
                return self.by_slug(slug).unwrap_or(self.fallback);
            }
        }
        self.fallback
    }

    pub fn match_class(&self, class: i64) -> i64 {
        self.by_slug(class_slug(class)).unwrap_or(self.fallback)
    }
}

/// Destination category for a legacy category name.
///
/// `categories` holds destination ids with lowercased names. Exact match,
/// then containment either way, then a keyword family, then `fallback`.
pub fn match_category(name: &str, categories: &[(i64, String)], fallback: i64) -> i64 {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return fallback;
    }

    if let Some((id, _)) = categories.iter().find(|(_, n)| *n == name) {
        return *id;
    }
    if let Some((id, _)) = categories
        .iter()
        .find(|(_, n)| !n.is_empty() && (name.contains(n.as_str()) || n.contains(&name)))
    {
        return *id;
    }

    let family = CATEGORY_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|kw| name.contains(kw)))
        .map(|(_, family)| *family);
    family
        .and_then(|family| categories.iter().find(|(_, n)| n.contains(family)))
        .map(|(id, _)| *id)
        .unwrap_or(fallback)
}

/// Group mapping detected for one users run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupMapping {
    pub map: BTreeMap<i64, i64>,
    pub fallback: i64,
    pub column: Option<String>,
    pub user_groups: HashMap<i64, i64>,
}

impl GroupMapping {
    /// Install into `ctx`, keeping configured entries on top.
    pub fn apply(self, ctx: &mut TransformContext) {
        let settings = ctx.settings().clone();

        let mut map = self.map;
        map.extend(settings.group_map.iter().map(|(k, v)| (*k, *v)));
        ctx.group_map = map;
        ctx.fallback_group_id = settings.fallback_group_id.unwrap_or(self.fallback);
        if settings.group_column.is_none() {
            if let Some(column) = self.column {
                ctx.group_columns = vec![column];
            }
        }
        ctx.user_groups = self.user_groups;
    }
}

/// Category mapping detected for one torrents run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMapping {
    pub map: BTreeMap<i64, i64>,
    pub fallback: i64,
    pub type_id: i64,
}

impl CategoryMapping {
    /// Install into `ctx`, keeping configured entries on top.
    pub fn apply(self, ctx: &mut TransformContext) {
        let settings = ctx.settings().clone();

        let mut map = self.map;
        map.extend(settings.category_map.iter().map(|(k, v)| (*k, *v)));
        ctx.category_map = map;
        ctx.fallback_category_id = settings.fallback_category_id.unwrap_or(self.fallback);
        ctx.default_type_id = settings.default_type_id.unwrap_or(self.type_id);
    }
}

/// Destination reference rows; a missing table is logged and treated as empty.
async fn reference_rows(
    target: &dyn DestinationWriter,
    table: &str,
    columns: &[&str],
    log: &mut MigrationLog,
) -> Vec<Row> {
    match target.lookup(table, columns).await {
        Ok(rows) => rows,
        Err(e) => {
            log.push(format!("Could not read destination {}: {}", table, e));
            Vec::new()
        }
    }
}

/// First existing table among `candidates`, `None` when there is none.
async fn optional_table(source: &dyn SourceQuery, candidates: &[&str]) -> Result<Option<String>> {
    match resolve_table(source, candidates).await {
        Ok(table) => Ok(Some(table)),
        Err(MigrateError::TableNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn find_column(columns: &[String], candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|c| columns.iter().any(|col| col.eq_ignore_ascii_case(c)))
        .map(|c| c.to_string())
}

/// Detect the group mapping for the users procedure.
///
/// Source problems while reading the optional tables are logged and the
/// step is skipped, so a partial mapping is still usable.
pub async fn detect_groups(
    source: &dyn SourceQuery,
    target: &dyn DestinationWriter,
    ctx: &TransformContext,
    log: &mut MigrationLog,
) -> Result<GroupMapping> {
    let settings = ctx.settings();

    let groups: Vec<DestinationGroup> =
        reference_rows(target, "groups", &["id", "name", "slug"], log)
            .await
            .iter()
            .filter_map(|row| {
                Some(DestinationGroup {
                    id: row.get("id").and_then(SqlValue::as_i64)?,
                    name: text(row, &["name"]).unwrap_or_default(),
                    slug: text(row, &["slug"]).unwrap_or_default().to_lowercase(),
                })
            })
            .collect();
    let matcher = GroupMatcher::new(&groups, settings.fallback_group_id);
    if !groups.is_empty() {
        log.push(format!(
            "Destination groups available: {}",
            groups
                .iter()
                .map(|g| format!("#{} {}", g.id, g.name))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    let column = match &settings.group_column {
        Some(column) => Some(column.clone()),
        None => match source.columns("users").await {
            Ok(columns) => find_column(&columns, GROUP_COLUMNS),
            Err(e) => {
                log.push(format!("Could not inspect users columns: {}", e));
                None
            }
        },
    };
    log.push(format!(
        "Source group column in users table: {}",
        column.as_deref().unwrap_or("(none found)")
    ));

    let mut in_use = BTreeSet::new();
    if let Some(column) = &column {
        let quoted = quote_mysql(column)?;
        let sql = format!(
            "SELECT DISTINCT {col} FROM `users` WHERE {col} IS NOT NULL",
            col = quoted
        );
        match source.query(&sql, &[]).await {
            Ok(rows) => {
                in_use = rows
                    .iter()
                    .filter_map(|row| row.get(column).and_then(SqlValue::as_i64))
                    .collect();
            }
            Err(e) => log.push(format!("Could not read distinct group values: {}", e)),
        }
    }

    let mut map = BTreeMap::new();
    let mut group_table = None;
    match optional_table(source, GROUP_TABLES).await {
        Ok(Some(table)) => match source.query(&select_all(&table)?, &[]).await {
            Ok(rows) => {
                for row in &rows {
                    let Some(id) = row
                        .first_of(&["id", "group_id", "gid", "class_id"])
                        .and_then(SqlValue::as_i64)
                    else {
                        continue;
                    };
                    let name =
                        text(row, &["name", "group_name", "title", "class_name"]).unwrap_or_default();
                    map.insert(id, matcher.match_name(&name));
                }
                log.push(format!(
                    "Group map built from `{}`: {} source groups mapped",
                    table,
                    map.len()
                ));
                let doubles_as_pivot = rows
                    .first()
                    .is_some_and(|row| find_column(row.columns(), PIVOT_USER_COLUMNS).is_some());
                if doubles_as_pivot {
                    group_table = Some(table);
                }
            }
            Err(e) => log.push(format!("Could not read source groups table: {}", e)),
        },
        Ok(None) => {}
        Err(e) => log.push(format!("Could not look for a source groups table: {}", e)),
    }

    let missing: Vec<i64> = in_use
        .into_iter()
        .filter(|value| !map.contains_key(value))
        .collect();
    if !missing.is_empty() {
        for value in &missing {
            map.insert(*value, matcher.match_class(*value));
        }
        log.push(format!(
            "Mapped {} group values by numeric class: {}",
            missing.len(),
            missing
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    let mut user_groups = HashMap::new();
    if column.is_none() && !map.is_empty() {
        let candidates: Vec<&str> = group_table
            .as_deref()
            .into_iter()
            .chain(PIVOT_TABLES.iter().copied())
            .collect();
        user_groups = pivot_lookup(source, &candidates, &map, matcher.fallback(), log).await;
    }

    Ok(GroupMapping {
        map,
        fallback: matcher.fallback(),
        column,
        user_groups,
    })
}

/// Legacy user id -> legacy group from the first readable pivot table.
///
/// A user with several groups keeps the first one unless a later one maps
/// to something other than the fallback group.
async fn pivot_lookup(
    source: &dyn SourceQuery,
    candidates: &[&str],
    map: &BTreeMap<i64, i64>,
    fallback: i64,
    log: &mut MigrationLog,
) -> HashMap<i64, i64> {
    let mut lookup = HashMap::new();
    let destination = |group: i64| map.get(&group).copied().unwrap_or(fallback);

    for table in candidates {
        match source.table_exists(table).await {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                log.push(format!("Could not check pivot `{}`: {}", table, e));
                continue;
            }
        }
        let columns = match source.columns(table).await {
            Ok(columns) => columns,
            Err(e) => {
                log.push(format!("Could not inspect pivot `{}`: {}", table, e));
                continue;
            }
        };
        let (Some(user_col), Some(group_col)) = (
            find_column(&columns, PIVOT_USER_COLUMNS),
            find_column(&columns, PIVOT_GROUP_COLUMNS),
        ) else {
            continue;
        };

        let sql = match (quote_mysql(&user_col), quote_mysql(&group_col), quote_mysql(table)) {
            (Ok(u), Ok(g), Ok(t)) => format!("SELECT {}, {} FROM {}", u, g, t),
            _ => continue,
        };
        match source.query(&sql, &[]).await {
            Ok(rows) => {
                for row in &rows {
                    let user = int_or(row, &[user_col.as_str()], 0);
                    let group = int_or(row, &[group_col.as_str()], 0);
                    if user <= 0 {
                        continue;
                    }
                    let replace = match lookup.get(&user).copied() {
                        None => true,
                        Some(current) => {
                            destination(current) == fallback && destination(group) != fallback
                        }
                    };
                    if replace {
                        lookup.insert(user, group);
                    }
                }
                log.push(format!(
                    "User group pivot `{}` ({}, {}): {} users",
                    table,
                    user_col,
                    group_col,
                    lookup.len()
                ));
                return lookup;
            }
            Err(e) => log.push(format!("Could not read pivot `{}`: {}", table, e)),
        }
    }

    log.push("No user group pivot table found; users without a group column use the fallback group");
    lookup
}

/// Detect the category mapping, fallback category and torrent type.
pub async fn detect_categories(
    source: &dyn SourceQuery,
    target: &dyn DestinationWriter,
    log: &mut MigrationLog,
) -> Result<CategoryMapping> {
    let categories: Vec<(i64, String)> =
        reference_rows(target, "categories", &["id", "name"], log)
            .await
            .iter()
            .filter_map(|row| {
                let id = row.get("id").and_then(SqlValue::as_i64)?;
                Some((id, text(row, &["name"]).unwrap_or_default().trim().to_lowercase()))
            })
            .collect();
    let fallback = categories
        .first()
        .map(|(id, _)| *id)
        .unwrap_or(DEFAULT_CATEGORY_ID);
    let type_id = reference_rows(target, "types", &["id"], log)
        .await
        .first()
        .and_then(|row| row.get("id").and_then(SqlValue::as_i64))
        .unwrap_or(DEFAULT_TYPE_ID);

    let mut map = BTreeMap::new();
    if source.table_exists("categories").await? {
        match source
            .query("SELECT `id`, `name` FROM `categories` ORDER BY `id`", &[])
            .await
        {
            Ok(rows) => {
                for row in &rows {
                    let Some(id) = row.get("id").and_then(SqlValue::as_i64) else {
                        continue;
                    };
                    let name = text(row, &["name"]).unwrap_or_default();
                    map.insert(id, match_category(&name, &categories, fallback));
                }
                log.push(format!("Category map built: {} source categories mapped", map.len()));
            }
            Err(e) => log.push(format!("Could not read source categories: {}", e)),
        }
    }

    Ok(CategoryMapping {
        map,
        fallback,
        type_id,
    })
}
