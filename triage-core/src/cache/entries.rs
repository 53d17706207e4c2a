//! Serialized shapes stored on disk by the two cache families.

use crate::model::ItemDetails;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version for every cache entry. Bumping this invalidates every
/// older file on read (spec.md §4.2, invariant I3).
pub const CURRENT_VERSION: u32 = 1;

/// Per-item enrichment cache entry, 24h TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailsCacheEntry {
    pub details: ItemDetails,
    pub cached_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
}

/// Which list-family a `ListCacheEntry` belongs to; drives TTL and the
/// extra invalidation rules in spec.md §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFamily {
    /// Notifications list: `notif_list_<user>.json`, 30–60 min TTL.
    Notifications,
    /// PR/issue search list: `prlist_<listType>_<user>.json`, 5 min TTL.
    Search,
    /// Orphan-detection result: `orphaned_<user>.json`, 15 min–24h TTL.
    Orphan,
}

impl ListFamily {
    pub fn ttl(self) -> chrono::Duration {
        match self {
            ListFamily::Notifications => chrono::Duration::minutes(45),
            ListFamily::Search => chrono::Duration::minutes(5),
            ListFamily::Orphan => chrono::Duration::minutes(15),
        }
    }

    pub fn key_prefix(self) -> &'static str {
        match self {
            ListFamily::Notifications => "notif_list",
            ListFamily::Search => "prlist",
            ListFamily::Orphan => "orphaned",
        }
    }
}

/// Options the caller supplies when asking for a cached list; these drive
/// the extra per-family miss rules in spec.md §4.2.
#[derive(Debug, Clone, Default)]
pub struct ListCacheOpts {
    /// Notifications family: caller wants history back to this time.
    pub since_time: Option<DateTime<Utc>>,
    /// Orphan family: repos the caller wants covered.
    pub repos: Vec<String>,
}

/// Generic serialized payload for any list family. `T` is the concrete item
/// type (`Item` for notifications/search, orphan synthetic items for the
/// orphan family) — kept generic so one file format serves all three
/// families, matching spec.md's single `ListCacheEntry` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCacheEntry<T> {
    pub items: Vec<T>,
    pub cached_at: DateTime<Utc>,
    pub last_fetch_time: DateTime<Utc>,
    pub since_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repos: Vec<String>,
    pub version: u32,
}
