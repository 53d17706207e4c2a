//! Versioned on-disk key/value store over two entry families (spec.md §4.2).
//!
//! A single directory, file-per-entry, JSON-encoded, keys distinguished by
//! prefix (`notif_list_*`, `prlist_*`, `orphaned_*`, everything else is a
//! per-item details entry) — the "single directory, prefix-distinguished
//! families" design spec.md §9 calls out, generalized from the teacher's
//! single-family `mr_reviewer::cache` (which only ever cached large diff
//! bundles under a provider/project/iid path).

pub mod entries;

use crate::errors::{CacheError, TriageResult};
use crate::model::{Item, ItemDetails};
use chrono::{DateTime, Utc};
use entries::{CURRENT_VERSION, DetailsCacheEntry, ListCacheEntry, ListCacheOpts, ListFamily};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const DETAILS_TTL: chrono::Duration = chrono::Duration::hours(24);

/// Filesystem-safe replacement for repo names (`"owner/name"` → `"owner_name"`).
///
/// Injective within the `repo_<subjectType>_<number>` namespace because the
/// subject-type/number suffix is appended after substitution and repo names
/// may not themselves contain the separator we introduce.
fn sanitize(s: &str) -> String {
    s.replace('/', "_")
}

/// File-based cache over `<cache_root>/details/`.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

/// Category counts reported by [`Cache::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub notif_list_total: u64,
    pub notif_list_valid: u64,
    pub search_list_total: u64,
    pub search_list_valid: u64,
    pub orphan_list_total: u64,
    pub orphan_list_valid: u64,
    pub details_total: u64,
    pub details_valid: u64,
}

impl Cache {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            root: cache_root.into().join("details"),
        }
    }

    async fn ensure_dir(&self) -> TriageResult<()> {
        fs::create_dir_all(&self.root).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            fs::set_permissions(&self.root, perms).await?;
        }
        Ok(())
    }

    fn details_key(repo_full_name: &str, subject_type: &str, number: u64) -> String {
        format!("{}_{}_{}", sanitize(repo_full_name), subject_type, number)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> TriageResult<()> {
        self.ensure_dir().await?;
        let path = self.path_for(key);
        let json = serde_json::to_vec_pretty(value).map_err(CacheError::Serde)?;
        fs::write(&path, json).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).await?;
        }
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let data = fs::read(&path).await.ok()?;
        match serde_json::from_slice::<T>(&data) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("cache read failed for {key}: {e}");
                None
            }
        }
    }

    /// `Get(item) → (details, hit)`.
    ///
    /// Miss when: file absent, malformed JSON, version mismatch,
    /// `item.updated_at > entry.updated_at`, or entry older than 24h.
    pub async fn get_details(&self, item: &Item) -> Option<ItemDetails> {
        let Some((owner, repo)) = item.repository.owner_and_name() else {
            return None;
        };
        let number = item.subject.number()?;
        let subject_type = format!("{:?}", item.subject.subject_type);
        let key = Self::details_key(&format!("{owner}/{repo}"), &subject_type, number);

        let entry: DetailsCacheEntry = self.read_json(&key).await?;
        if entry.version != CURRENT_VERSION {
            return None;
        }
        if item.updated_at > entry.updated_at {
            return None;
        }
        if Utc::now() - entry.cached_at > DETAILS_TTL {
            return None;
        }
        Some(entry.details)
    }

    /// `Set(item, details)` — best-effort; failures are logged, not
    /// propagated (spec.md §4.2).
    pub async fn set_details(&self, item: &Item, details: &ItemDetails) {
        let Some((owner, repo)) = item.repository.owner_and_name() else {
            return;
        };
        let Some(number) = item.subject.number() else {
            return;
        };
        let subject_type = format!("{:?}", item.subject.subject_type);
        let key = Self::details_key(&format!("{owner}/{repo}"), &subject_type, number);

        let entry = DetailsCacheEntry {
            details: details.clone(),
            cached_at: Utc::now(),
            updated_at: item.updated_at,
            version: CURRENT_VERSION,
        };
        if let Err(e) = self.write_json(&key, &entry).await {
            warn!("failed to write details cache entry {key}: {e}");
        }
    }

    fn list_key(family: ListFamily, user: &str) -> String {
        format!("{}_{}", family.key_prefix(), sanitize(user))
    }

    /// `GetList(family, user, opts)` with the family-specific extra miss
    /// rules from spec.md §4.2.
    pub async fn get_list<T: DeserializeOwned>(
        &self,
        family: ListFamily,
        user: &str,
        opts: &ListCacheOpts,
    ) -> Option<ListCacheEntry<T>> {
        let key = Self::list_key(family, user);
        let entry: ListCacheEntry<T> = self.read_json(&key).await?;
        if entry.version != CURRENT_VERSION {
            return None;
        }
        if Utc::now() - entry.cached_at > family.ttl() {
            return None;
        }
        match family {
            ListFamily::Notifications => {
                if let (Some(wanted), Some(cached)) = (opts.since_time, entry.since_time) {
                    if wanted < cached {
                        return None;
                    }
                }
            }
            ListFamily::Orphan => {
                if !opts.repos.iter().all(|r| entry.repos.contains(r)) {
                    return None;
                }
            }
            ListFamily::Search => {}
        }
        Some(entry)
    }

    /// `SetList(family, user, entry)` — best-effort.
    pub async fn set_list<T: Serialize>(
        &self,
        family: ListFamily,
        user: &str,
        entry: &ListCacheEntry<T>,
    ) {
        let key = Self::list_key(family, user);
        if let Err(e) = self.write_json(&key, entry).await {
            warn!("failed to write list cache entry {key}: {e}");
        }
    }

    /// Removes every entry under the cache root.
    pub async fn clear(&self) -> TriageResult<()> {
        if !self.root.exists() {
            return Ok(());
        }
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }

    /// Categorizes every entry by key prefix and reports total vs. valid
    /// (current-version, unexpired) counts, without deserializing the full
    /// payload shape (version/cached_at are read via a minimal envelope).
    pub async fn stats(&self) -> TriageResult<CacheStats> {
        let mut stats = CacheStats::default();
        if !self.root.exists() {
            return Ok(stats);
        }

        #[derive(serde::Deserialize)]
        struct Envelope {
            #[serde(default)]
            version: u32,
            #[serde(default)]
            cached_at: Option<DateTime<Utc>>,
        }

        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let data = fs::read(&path).await?;
            let envelope: Option<Envelope> = serde_json::from_slice(&data).ok();
            let (version, cached_at) = envelope
                .map(|e| (e.version, e.cached_at))
                .unwrap_or((0, None));

            let family = if stem.starts_with("notif_list_") {
                Some((ListFamily::Notifications, &mut stats.notif_list_total, &mut stats.notif_list_valid))
            } else if stem.starts_with("prlist_") {
                Some((ListFamily::Search, &mut stats.search_list_total, &mut stats.search_list_valid))
            } else if stem.starts_with("orphaned_") {
                Some((ListFamily::Orphan, &mut stats.orphan_list_total, &mut stats.orphan_list_valid))
            } else {
                None
            };

            let valid = version == CURRENT_VERSION
                && cached_at.is_some_and(|c| {
                    let ttl = family.as_ref().map(|(f, ..)| f.ttl()).unwrap_or(DETAILS_TTL);
                    Utc::now() - c <= ttl
                });

            match family {
                Some((_, total, valid_count)) => {
                    *total += 1;
                    if valid {
                        *valid_count += 1;
                    }
                }
                None => {
                    stats.details_total += 1;
                    if valid {
                        stats.details_valid += 1;
                    }
                }
            }
        }

        Ok(stats)
    }
}

/// Path helper shared with `Config`: default cache root under the user's
/// cache directory, mirroring the teacher's `MR_REVIEWER_CACHE_DIR`
/// override pattern.
pub fn default_cache_root(app_name: &str) -> PathBuf {
    std::env::var("TRIAGE_CACHE_DIR").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::cache_dir()
            .unwrap_or_else(|| Path::new(".cache").to_path_buf())
            .join(app_name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Repository, Subject, SubjectType, Reason};

    fn test_item(updated_at: DateTime<Utc>) -> Item {
        Item {
            id: "1".into(),
            reason: Reason::Mention,
            unread: true,
            updated_at,
            repository: Repository {
                full_name: "owner/repo".into(),
                html_url: String::new(),
                private: false,
            },
            subject: Subject {
                title: "t".into(),
                api_url: "https://api.github.com/repos/owner/repo/issues/42".into(),
                subject_type: SubjectType::Issue,
            },
            details: None,
        }
    }

    #[tokio::test]
    async fn set_then_get_is_a_hit() {
        let dir = tempdir();
        let cache = Cache::new(&dir);
        let now = Utc::now();
        let item = test_item(now);
        let details = ItemDetails::empty(42, false);

        cache.set_details(&item, &details).await;
        let got = cache.get_details(&item).await;
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn newer_updated_at_is_a_miss() {
        let dir = tempdir();
        let cache = Cache::new(&dir);
        let now = Utc::now();
        let item = test_item(now);
        let details = ItemDetails::empty(42, false);
        cache.set_details(&item, &details).await;

        let mut newer = test_item(now + chrono::Duration::nanoseconds(1));
        newer.subject.api_url = item.subject.api_url.clone();
        let got = cache.get_details(&newer).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn equal_updated_at_is_a_hit() {
        let dir = tempdir();
        let cache = Cache::new(&dir);
        let now = Utc::now();
        let item = test_item(now);
        cache.set_details(&item, &ItemDetails::empty(42, false)).await;

        let same = test_item(now);
        let got = cache.get_details(&same).await;
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn empty_api_url_is_never_cached() {
        let dir = tempdir();
        let cache = Cache::new(&dir);
        let mut item = test_item(Utc::now());
        item.subject.api_url = String::new();
        cache.set_details(&item, &ItemDetails::empty(1, false)).await;
        assert!(cache.get_details(&item).await.is_none());
    }

    #[tokio::test]
    async fn stale_version_details_entry_is_a_miss() {
        let dir = tempdir();
        let cache = Cache::new(&dir);
        let item = test_item(Utc::now());

        let (owner, repo) = item.repository.owner_and_name().unwrap();
        let subject_type = format!("{:?}", item.subject.subject_type);
        let key = Cache::details_key(&format!("{owner}/{repo}"), &subject_type, item.subject.number().unwrap());
        let stale_entry = DetailsCacheEntry {
            details: ItemDetails::empty(42, false),
            cached_at: Utc::now(),
            updated_at: item.updated_at,
            version: CURRENT_VERSION - 1,
        };
        cache.write_json(&key, &stale_entry).await.unwrap();

        assert!(cache.get_details(&item).await.is_none());
    }

    #[tokio::test]
    async fn stale_version_list_entry_is_a_miss() {
        let dir = tempdir();
        let cache = Cache::new(&dir);
        let key = Cache::list_key(ListFamily::Search, "octocat");
        let stale_entry: ListCacheEntry<Item> = ListCacheEntry {
            items: vec![],
            cached_at: Utc::now(),
            last_fetch_time: Utc::now(),
            since_time: None,
            repos: vec![],
            version: CURRENT_VERSION - 1,
        };
        cache.write_json(&key, &stale_entry).await.unwrap();

        let got = cache.get_list::<Item>(ListFamily::Search, "octocat", &ListCacheOpts::default()).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let dir = tempdir();
        let cache = Cache::new(&dir);
        let item = test_item(Utc::now());
        cache.set_details(&item, &ItemDetails::empty(42, false)).await;
        cache.clear().await.unwrap();
        assert!(cache.get_details(&item).await.is_none());
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("triage-cache-test-{}", uuid_like()));
        dir
    }

    fn uuid_like() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    }
}
