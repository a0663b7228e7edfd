//! The entities a run can migrate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// One migratable entity, in the order a full run processes them.
///
/// Later entities resolve foreign keys against earlier ones (peers need
/// torrents, posts need threads), so [`EntityKind::ALL`] is also the
/// dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Users,
    Torrents,
    Peers,
    Snatched,
    ForumCategories,
    ForumThreads,
    ForumPosts,
    Comments,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Users,
        EntityKind::Torrents,
        EntityKind::Peers,
        EntityKind::Snatched,
        EntityKind::ForumCategories,
        EntityKind::ForumThreads,
        EntityKind::ForumPosts,
        EntityKind::Comments,
    ];

    /// Config and CLI name.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Torrents => "torrents",
            EntityKind::Peers => "peers",
            EntityKind::Snatched => "snatched",
            EntityKind::ForumCategories => "forum_categories",
            EntityKind::ForumThreads => "forum_threads",
            EntityKind::ForumPosts => "forum_posts",
            EntityKind::Comments => "comments",
        }
    }

    /// Capitalized label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Users => "User",
            EntityKind::Torrents => "Torrent",
            EntityKind::Peers => "Peer",
            EntityKind::Snatched => "Snatched",
            EntityKind::ForumCategories => "Forum category",
            EntityKind::ForumThreads => "Forum thread",
            EntityKind::ForumPosts => "Forum post",
            EntityKind::Comments => "Comment",
        }
    }

    /// Page size when the config does not override it.
    pub fn default_chunk_size(self) -> usize {
        match self {
            EntityKind::Users | EntityKind::Torrents | EntityKind::ForumCategories => 200,
            EntityKind::Peers
            | EntityKind::Snatched
            | EntityKind::ForumThreads
            | EntityKind::ForumPosts
            | EntityKind::Comments => 500,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = EntityKind::ALL.iter().map(|k| k.name()).collect();
                MigrateError::Config(format!(
                    "unknown entity '{}' (expected one of: {})",
                    s,
                    names.join(", ")
                ))
            })
    }
}
