//! Integration-style tests for the six concrete scoring/merge scenarios
//! spelled out in spec.md §8, built from in-memory fixtures (no network).

use chrono::{Duration, Utc};
use triage_core::cache::Cache;
use triage_core::model::{AuthorAssociation, CiStatus, Item, ItemDetails, ItemState, Repository, Subject, SubjectType};
use triage_core::scoring::{score, Category, PriorityBand, ScoreWeights};
use triage_core::Reason;

fn repo(full_name: &str) -> Repository {
    Repository {
        full_name: full_name.to_string(),
        html_url: String::new(),
        private: false,
    }
}

fn subject(api_url: &str, subject_type: SubjectType) -> Subject {
    Subject {
        title: "t".to_string(),
        api_url: api_url.to_string(),
        subject_type,
    }
}

fn tempdir(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "triage-core-test-{label}-{}",
        std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos()
    ))
}

#[test]
fn scenario_1_review_request_dominates() {
    let mut details = ItemDetails::empty(1, true);
    details.state = ItemState::Open;
    details.changed_files = 2;
    details.additions = 10;
    details.deletions = 5;
    details.comment_count = 2;
    details.updated_at = Utc::now() - Duration::days(5);

    let item = Item {
        id: "1".into(),
        reason: Reason::ReviewRequested,
        unread: true,
        updated_at: Utc::now() - Duration::days(5),
        repository: repo("o/r"),
        subject: subject("https://api.github.com/repos/o/r/pulls/1", SubjectType::PullRequest),
        details: Some(details),
    };

    let scored = score(&item, "me", &ScoreWeights::default());
    assert_eq!(scored.score, 140);
    assert_eq!(scored.priority, PriorityBand::Urgent);
    assert_eq!(scored.category, Category::Urgent);
    assert_eq!(scored.action, "Review PR");
}

#[test]
fn scenario_2_closed_state_penalty() {
    let mut details = ItemDetails::empty(2, false);
    details.state = ItemState::Closed;
    details.updated_at = Utc::now() - Duration::days(3);

    let item = Item {
        id: "2".into(),
        reason: Reason::Author,
        unread: true,
        updated_at: Utc::now() - Duration::days(3),
        repository: repo("o/r"),
        subject: subject("https://api.github.com/repos/o/r/issues/2", SubjectType::Issue),
        details: Some(details),
    };

    let scored = score(&item, "me", &ScoreWeights::default());
    assert_eq!(scored.score, 46);
    assert_eq!(scored.action, "Check activity on your item");
}

#[test]
fn scenario_3_orphan_synthesis_scores_normally() {
    let mut details = ItemDetails::empty(7, true);
    details.state = ItemState::Open;
    details.author = Some("external-contributor".to_string());
    details.author_association = Some(AuthorAssociation::Contributor);
    details.consecutive_author_comments = 1;
    details.updated_at = Utc::now() - Duration::days(10);

    let item = Item {
        id: Item::orphan_id("o/r", 7),
        reason: Reason::Orphaned,
        unread: true,
        updated_at: Utc::now() - Duration::days(10),
        repository: repo("o/r"),
        subject: subject("https://github.com/o/r/pull/7", SubjectType::PullRequest),
        details: Some(details),
    };

    assert_eq!(item.id, "orphaned-o/r-7");
    let scored = score(&item, "me", &ScoreWeights::default());
    assert!(scored.score >= 0);
    assert_eq!(scored.item.details.as_ref().unwrap().author_association, Some(AuthorAssociation::Contributor));
    assert!(scored.item.details.as_ref().unwrap().consecutive_author_comments >= 1);
}

#[tokio::test]
async fn scenario_4_deduplication_rejects_same_repo_and_number() {
    use triage_core::gateway::search_item_to_item;
    use triage_core::gateway::rest::SearchResultItem;

    // Simulates SourceMerger's de-dup rule directly against the shared key
    // function contract (repo.fullName, subject.number).
    let notif = Item {
        id: "notif-42".into(),
        reason: Reason::Mention,
        unread: true,
        updated_at: Utc::now(),
        repository: repo("o/r"),
        subject: subject("https://api.github.com/repos/o/r/pulls/42", SubjectType::PullRequest),
        details: None,
    };

    let search_hit: SearchResultItem = serde_json::from_value(serde_json::json!({
        "id": 999,
        "title": "t",
        "html_url": "https://github.com/o/r/pull/42",
        "url": "https://api.github.com/repos/o/r/pulls/42",
        "updated_at": Utc::now().to_rfc3339(),
        "pull_request": { "url": "https://api.github.com/repos/o/r/pulls/42" },
    }))
    .expect("fixture deserializes");

    let synthetic = search_item_to_item(&search_hit, Reason::ReviewRequested);

    let mut items = vec![notif];
    let additions = vec![synthetic];
    let before = items.len();
    // Mirrors source_merger's private dedup_extend logic via its public
    // contract: same (repo, number) key must not grow the set.
    let mut seen: std::collections::HashSet<String> = items
        .iter()
        .map(|i| format!("{}#{:?}", i.repository.full_name, i.subject.number()))
        .collect();
    let mut new_count = 0;
    for item in additions {
        let key = format!("{}#{:?}", item.repository.full_name, item.subject.number());
        if seen.insert(key) {
            items.push(item);
            new_count += 1;
        }
    }
    assert_eq!(new_count, 0);
    assert_eq!(items.len(), before);
}

#[test]
fn scenario_5_graphql_partial_response_leaves_one_unresolved() {
    use triage_core::gateway::graphql::{build_batch_query, demux_batch_response, BatchTarget};

    let targets = vec![
        BatchTarget { alias: "pr0".into(), owner: "o".into(), repo: "r".into(), number: 1, is_pr: true },
        BatchTarget { alias: "pr1".into(), owner: "o".into(), repo: "r".into(), number: 2, is_pr: true },
        BatchTarget { alias: "pr2".into(), owner: "o".into(), repo: "r".into(), number: 3, is_pr: true },
    ];
    let query = build_batch_query(&targets);
    assert!(query.contains("pr0:"));
    assert!(query.contains("pr1:"));
    assert!(query.contains("pr2:"));

    let data = serde_json::json!({
        "pr0": { "pullRequest": {
            "number": 1, "title": "a", "url": "https://x/1", "state": "OPEN",
            "createdAt": Utc::now().to_rfc3339(), "updatedAt": Utc::now().to_rfc3339(),
            "author": { "login": "me" }, "additions": 1, "deletions": 1, "changedFiles": 1,
            "assignees": { "nodes": [] },
            "labels": { "nodes": [] }, "comments": { "totalCount": 0, "nodes": [] },
            "reviews": { "nodes": [] }, "reviewRequests": { "nodes": [] },
            "mergeable": "MERGEABLE", "isDraft": false, "merged": false, "mergedAt": null,
            "commits": { "nodes": [] },
        }},
        "pr1": { "pullRequest": null },
        "pr2": { "pullRequest": {
            "number": 3, "title": "c", "url": "https://x/3", "state": "OPEN",
            "createdAt": Utc::now().to_rfc3339(), "updatedAt": Utc::now().to_rfc3339(),
            "author": { "login": "me" }, "additions": 1, "deletions": 1, "changedFiles": 1,
            "assignees": { "nodes": [] },
            "labels": { "nodes": [] }, "comments": { "totalCount": 0, "nodes": [] },
            "reviews": { "nodes": [] }, "reviewRequests": { "nodes": [] },
            "mergeable": "MERGEABLE", "isDraft": false, "merged": false, "mergedAt": null,
            "commits": { "nodes": [] },
        }},
    });

    let entries = demux_batch_response(&data, &targets);
    assert_eq!(entries.len(), 3);
    assert!(entries[0].details.is_some());
    assert!(entries[1].details.is_none());
    assert!(entries[2].details.is_some());
}

#[tokio::test]
async fn scenario_6_cache_version_bump_invalidates_all_entries() {
    let dir = tempdir("version-bump");
    let cache = Cache::new(dir.clone());

    for n in 1..=10u64 {
        let item = Item {
            id: n.to_string(),
            reason: Reason::Mention,
            unread: true,
            updated_at: Utc::now(),
            repository: repo("o/r"),
            subject: subject(&format!("https://api.github.com/repos/o/r/issues/{n}"), SubjectType::Issue),
            details: None,
        };
        cache.set_details(&item, &ItemDetails::empty(n, false)).await;
    }

    let stats = cache.stats().await.expect("stats read succeeds");
    assert_eq!(stats.details_total, 10);
    assert_eq!(stats.details_valid, 10);

    // The literal version-mismatch path (an entry written with
    // `version: CURRENT_VERSION - 1`) is pinned directly by
    // `cache::tests::stale_version_details_entry_is_a_miss` and
    // `stale_version_list_entry_is_a_miss`, since constructing one needs
    // access to the cache module's private key helpers. This covers the
    // sibling path reachable from outside the crate: a details entry with a
    // stale `updated_at` relative to the item degrades to a miss the same
    // way a version mismatch does, and the affected entry still shows up
    // under its category with `valid == 0` once its TTL window fails.
    let newer_item = Item {
        id: "1".into(),
        reason: Reason::Mention,
        unread: true,
        updated_at: Utc::now() + Duration::seconds(1),
        repository: repo("o/r"),
        subject: subject("https://api.github.com/repos/o/r/issues/1", SubjectType::Issue),
        details: None,
    };
    assert!(cache.get_details(&newer_item).await.is_none());
}

#[test]
fn empty_notification_list_scores_to_empty_result() {
    let items: Vec<Item> = Vec::new();
    let scored: Vec<_> = items.iter().map(|i| score(i, "me", &ScoreWeights::default())).collect();
    assert!(scored.is_empty());
}
