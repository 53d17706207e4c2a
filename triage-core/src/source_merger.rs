//! Folds in PRs/issues the Platform's notification feed misses entirely:
//! review requests, authored PRs, and assigned issues, found via search
//! (spec.md §4.5).

use crate::cache::Cache;
use crate::cache::entries::{self, ListCacheEntry, ListCacheOpts, ListFamily};
use crate::errors::TriageResult;
use crate::gateway::{GitHubClient, SearchKind, search_item_to_item};
use crate::model::{Item, Reason};
use crate::pipeline::ProgressEvent;
use chrono::Utc;
use std::collections::HashSet;
use tracing::warn;

/// Search-derived items are cached as one combined list per user (spec.md
/// §4.2's `prlist_<listType>_<user>` key collapses here to a single
/// `prlist_<user>` entry covering all three search kinds).
pub async fn merge_sources(
    items: &mut Vec<Item>,
    cache: &Cache,
    gateway: &GitHubClient,
    user: &str,
    on_progress: &(dyn Fn(ProgressEvent) + Sync),
) -> TriageResult<()> {
    let opts = ListCacheOpts::default();
    if let Some(cached) = cache.get_list::<Item>(ListFamily::Search, user, &opts).await {
        let count = cached.items.len();
        dedup_extend(items, cached.items);
        on_progress(ProgressEvent::ItemsFetched { source: "search-cache", count });
        return Ok(());
    }

    let mut synthetic = Vec::new();
    let searches = [
        (
            format!("is:pr review-requested:{user} state:open"),
            SearchKind::ReviewRequested,
            Reason::ReviewRequested,
        ),
        (format!("is:pr author:{user} state:open"), SearchKind::Authored, Reason::Author),
        (
            format!("is:issue assignee:{user} state:open"),
            SearchKind::AssignedIssues,
            Reason::Assign,
        ),
    ];

    for (query, kind, reason) in searches {
        match gateway.search(&query, kind).await {
            Ok(results) => {
                on_progress(ProgressEvent::ItemsFetched { source: "search", count: results.len() });
                synthetic.extend(results.iter().map(|r| search_item_to_item(r, reason.clone())));
            }
            Err(err) if err.is_rate_limited() || err.is_auth_error() => return Err(err),
            Err(err) => {
                warn!("search query failed ({query}): {err}");
                on_progress(ProgressEvent::Warning(format!("search query failed: {err}")));
            }
        }
    }

    let entry = ListCacheEntry {
        items: synthetic.clone(),
        cached_at: Utc::now(),
        last_fetch_time: Utc::now(),
        since_time: None,
        repos: Vec::new(),
        version: entries::CURRENT_VERSION,
    };
    cache.set_list(ListFamily::Search, user, &entry).await;

    dedup_extend(items, synthetic);
    Ok(())
}

/// De-dupes by `(repository, subject number)` when the subject carries one,
/// falling back to an exact `subject.api_url` match otherwise (spec.md
/// §4.5's two-key de-duplication rule).
fn dedup_extend(items: &mut Vec<Item>, additions: Vec<Item>) {
    let mut seen: HashSet<String> = items.iter().map(item_key).collect();
    for item in additions {
        if seen.insert(item_key(&item)) {
            items.push(item);
        }
    }
}

fn item_key(item: &Item) -> String {
    match item.subject.number() {
        Some(number) => format!("{}#{number}", item.repository.full_name),
        None => item.subject.api_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Repository, Subject, SubjectType};

    fn item(repo: &str, api_url: &str, reason: Reason) -> Item {
        Item {
            id: api_url.to_string(),
            reason,
            unread: true,
            updated_at: Utc::now(),
            repository: Repository {
                full_name: repo.to_string(),
                html_url: String::new(),
                private: false,
            },
            subject: Subject {
                title: "t".into(),
                api_url: api_url.to_string(),
                subject_type: SubjectType::PullRequest,
            },
            details: None,
        }
    }

    #[test]
    fn dedup_extend_drops_same_repo_and_number() {
        let mut items = vec![item("o/r", "https://api.github.com/repos/o/r/pulls/9", Reason::Mention)];
        let additions = vec![item("o/r", "https://api.github.com/repos/o/r/pulls/9", Reason::ReviewRequested)];
        dedup_extend(&mut items, additions);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].reason, Reason::Mention);
    }

    #[test]
    fn dedup_extend_keeps_distinct_numbers() {
        let mut items = vec![item("o/r", "https://api.github.com/repos/o/r/pulls/9", Reason::Mention)];
        let additions = vec![item("o/r", "https://api.github.com/repos/o/r/pulls/10", Reason::Author)];
        dedup_extend(&mut items, additions);
        assert_eq!(items.len(), 2);
    }
}
