//! Detects externally-authored issues/PRs that are waiting on a maintainer
//! response and have gone stale (spec.md §4.6).

use crate::cache::Cache;
use crate::cache::entries::{self, ListCacheEntry, ListCacheOpts, ListFamily};
use crate::errors::TriageResult;
use crate::gateway::GitHubClient;
use crate::model::{AuthorAssociation, Item, ItemState, Reason, Repository, Subject, SubjectType};
use crate::pipeline::ProgressEvent;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct OrphanOptions {
    pub stale_days: i64,
    pub consecutive_author_comments_threshold: u32,
    /// Caps how many orphans *per repo* are surfaced after classification.
    /// Independent of the fixed 50-item candidate page size the GraphQL
    /// query always requests.
    pub max_per_repo: usize,
}

impl Default for OrphanOptions {
    fn default() -> Self {
        Self {
            stale_days: 7,
            consecutive_author_comments_threshold: 2,
            max_per_repo: 20,
        }
    }
}

/// Runs orphan detection across `repos` (each `"owner/name"`) and appends
/// any orphaned item found to `items`, skipping ones already present by
/// `(repository, number)`.
pub async fn analyze(
    items: &mut Vec<Item>,
    cache: &Cache,
    gateway: &GitHubClient,
    user: &str,
    repos: &[String],
    opts: &OrphanOptions,
    on_progress: &(dyn Fn(ProgressEvent) + Sync),
) -> TriageResult<()> {
    if repos.is_empty() {
        return Ok(());
    }

    let cache_opts = ListCacheOpts {
        since_time: None,
        repos: repos.to_vec(),
    };
    if let Some(cached) = cache.get_list::<Item>(ListFamily::Orphan, user, &cache_opts).await {
        let count = cached.items.len();
        append_new(items, cached.items);
        on_progress(ProgressEvent::ItemsFetched { source: "orphan-cache", count });
        return Ok(());
    }

    let mut found = Vec::new();
    for repo_full_name in repos {
        let mut parts = repo_full_name.splitn(2, '/');
        let (Some(owner), Some(repo)) = (parts.next(), parts.next()) else {
            warn!("skipping malformed repo {repo_full_name} for orphan analysis");
            continue;
        };
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            warn!("skipping malformed repo {repo_full_name} for orphan analysis");
            continue;
        }

        match analyze_repo(gateway, owner, repo, opts).await {
            Ok(orphans) => {
                on_progress(ProgressEvent::ItemsFetched { source: "orphan", count: orphans.len() });
                found.extend(orphans);
            }
            Err(err) if err.is_rate_limited() || err.is_auth_error() => return Err(err),
            Err(err) => {
                warn!("orphan analysis failed for {repo_full_name}: {err}");
                on_progress(ProgressEvent::Warning(format!("orphan analysis failed for {repo_full_name}: {err}")));
            }
        }
    }

    let entry = ListCacheEntry {
        items: found.clone(),
        cached_at: Utc::now(),
        last_fetch_time: Utc::now(),
        since_time: None,
        repos: repos.to_vec(),
        version: entries::CURRENT_VERSION,
    };
    cache.set_list(ListFamily::Orphan, user, &entry).await;

    append_new(items, found);
    Ok(())
}

fn item_repo_number_key(item: &Item) -> String {
    format!("{}#{:?}", item.repository.full_name, item.subject.number())
}

fn append_new(items: &mut Vec<Item>, additions: Vec<Item>) {
    let mut seen: std::collections::HashSet<String> = items.iter().map(item_repo_number_key).collect();
    for item in additions {
        if seen.insert(item_repo_number_key(&item)) {
            items.push(item);
        }
    }
}

/// Fixed page size for the orphan-candidate query: spec.md §4.6 requires
/// scanning the 50 most-recently-updated open items per repo regardless of
/// `max_per_repo`, which only caps how many of those *qualify* as orphans
/// and get surfaced (applied below, after classification).
const CANDIDATE_PAGE_SIZE: usize = 50;

async fn analyze_repo(
    gateway: &GitHubClient,
    owner: &str,
    repo: &str,
    opts: &OrphanOptions,
) -> TriageResult<Vec<Item>> {
    let query = build_repo_query(owner, repo, CANDIDATE_PAGE_SIZE);
    let data = gateway.execute_graphql(&query).await?;
    let candidates = parse_repo_query(&data);

    let mut orphans = Vec::new();
    for candidate in candidates {
        let (last_team_activity_at, consecutive) = classify(&candidate);
        let is_orphan = is_orphan_candidate(last_team_activity_at, candidate.updated_at, consecutive, opts);
        if !is_orphan {
            continue;
        }
        let repo_full_name = format!("{owner}/{repo}");
        orphans.push(Item {
            id: Item::orphan_id(&repo_full_name, candidate.number),
            reason: Reason::Orphaned,
            unread: true,
            updated_at: candidate.updated_at,
            repository: Repository {
                full_name: repo_full_name,
                html_url: String::new(),
                private: false,
            },
            subject: Subject {
                title: candidate.title.clone(),
                api_url: candidate.url.clone(),
                subject_type: if candidate.is_pr { SubjectType::PullRequest } else { SubjectType::Issue },
            },
            // Left unpopulated on purpose: this query doesn't carry PR size
            // fields, so the pipeline's second enrich pass fetches real
            // `ItemDetails` (additions/deletions/changedFiles included) the
            // same way it already does for source-merger items.
            details: None,
        });
    }
    orphans.truncate(opts.max_per_repo);
    Ok(orphans)
}

fn is_orphan_candidate(
    last_team_activity_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    consecutive_author_comments: u32,
    opts: &OrphanOptions,
) -> bool {
    let stale = Duration::days(opts.stale_days);
    let now = Utc::now();

    let team_activity_stale = last_team_activity_at.is_some_and(|at| now - at >= stale);
    let no_team_activity_and_stale = last_team_activity_at.is_none() && now - updated_at >= stale;
    let consecutive_author_run = consecutive_author_comments >= opts.consecutive_author_comments_threshold;

    team_activity_stale || no_team_activity_and_stale || consecutive_author_run
}

/// Computes the two orphan signals that depend on this query's data: the
/// trailing run of comments authored by the original poster (scanned
/// reverse-chronologically) and the most recent team-member activity
/// (comment or review), per spec.md §4.6.
fn classify(candidate: &Candidate) -> (Option<DateTime<Utc>>, u32) {
    let mut consecutive = 0u32;
    for comment in candidate.comments.iter().rev() {
        if candidate.author.as_deref() == Some(comment.author.as_str()) {
            consecutive += 1;
        } else {
            break;
        }
    }

    let last_team_comment = candidate
        .comments
        .iter()
        .filter(|c| c.author_association.is_some_and(|a| a.is_team_member()))
        .map(|c| c.created_at)
        .max();
    let last_team_review = candidate
        .reviews
        .iter()
        .filter(|r| r.author_association.is_some_and(|a| a.is_team_member()))
        .map(|r| r.created_at)
        .max();
    let last_team_activity_at = [last_team_comment, last_team_review].into_iter().flatten().max();

    (last_team_activity_at, consecutive)
}

struct Candidate {
    number: u64,
    title: String,
    url: String,
    state: ItemState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author: Option<String>,
    author_association: Option<AuthorAssociation>,
    labels: Vec<String>,
    is_pr: bool,
    comments: Vec<CandidateComment>,
    reviews: Vec<CandidateReview>,
}

struct CandidateComment {
    author: String,
    author_association: Option<AuthorAssociation>,
    created_at: DateTime<Utc>,
}

struct CandidateReview {
    author_association: Option<AuthorAssociation>,
    created_at: DateTime<Utc>,
}

fn build_repo_query(owner: &str, repo: &str, page_size: usize) -> String {
    format!(
        r#"query {{
  repository(owner: "{owner}", name: "{repo}") {{
    issues(first: {n}, states: OPEN, orderBy: {{field: UPDATED_AT, direction: DESC}}) {{
      nodes {{
        number title url state createdAt updatedAt
        author {{ login }}
        authorAssociation
        labels(first: 20) {{ nodes {{ name }} }}
        comments(last: 10) {{ nodes {{ author {{ login }} authorAssociation createdAt }} }}
      }}
    }}
    pullRequests(first: {n}, states: OPEN, orderBy: {{field: UPDATED_AT, direction: DESC}}) {{
      nodes {{
        number title url state createdAt updatedAt
        author {{ login }}
        authorAssociation
        labels(first: 20) {{ nodes {{ name }} }}
        comments(last: 10) {{ nodes {{ author {{ login }} authorAssociation createdAt }} }}
        reviews(last: 5) {{ nodes {{ authorAssociation submittedAt }} }}
      }}
    }}
  }}
}}"#,
        owner = owner,
        repo = repo,
        n = page_size.clamp(1, 50),
    )
}

#[derive(Debug, Deserialize)]
struct RawLogin {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawNodes<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

impl<T> Default for RawNodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
struct RawComment {
    author: Option<RawLogin>,
    #[serde(rename = "authorAssociation")]
    author_association: Option<AuthorAssociation>,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    #[serde(rename = "authorAssociation")]
    author_association: Option<AuthorAssociation>,
    #[serde(rename = "submittedAt")]
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawIssueOrPr {
    number: u64,
    title: String,
    url: String,
    state: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    author: Option<RawLogin>,
    #[serde(rename = "authorAssociation")]
    author_association: Option<AuthorAssociation>,
    #[serde(default)]
    labels: RawNodes<RawLabel>,
    #[serde(default)]
    comments: RawNodes<RawComment>,
    #[serde(default)]
    reviews: RawNodes<RawReview>,
}

fn parse_repo_query(data: &Value) -> Vec<Candidate> {
    let mut out = Vec::new();
    let Some(repo) = data.get("repository") else { return out };

    for (field, is_pr) in [("issues", false), ("pullRequests", true)] {
        let Some(nodes) = repo.get(field).and_then(|v| v.get("nodes")).and_then(|v| v.as_array()) else {
            continue;
        };
        for node in nodes {
            let Ok(raw) = serde_json::from_value::<RawIssueOrPr>(node.clone()) else {
                continue;
            };
            out.push(Candidate {
                number: raw.number,
                title: raw.title,
                url: raw.url,
                state: match raw.state.as_str() {
                    "CLOSED" => ItemState::Closed,
                    "MERGED" => ItemState::Merged,
                    _ => ItemState::Open,
                },
                created_at: raw.created_at,
                updated_at: raw.updated_at,
                author: raw.author.map(|a| a.login),
                author_association: raw.author_association,
                labels: raw.labels.nodes.into_iter().map(|l| l.name).collect(),
                is_pr,
                comments: raw
                    .comments
                    .nodes
                    .into_iter()
                    .filter_map(|c| {
                        Some(CandidateComment {
                            author: c.author?.login,
                            author_association: c.author_association,
                            created_at: c.created_at,
                        })
                    })
                    .collect(),
                reviews: raw
                    .reviews
                    .nodes
                    .into_iter()
                    .map(|r| CandidateReview {
                        author_association: r.author_association,
                        created_at: r.submitted_at.unwrap_or_default(),
                    })
                    .collect(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> OrphanOptions {
        OrphanOptions::default()
    }

    #[test]
    fn stale_team_activity_is_orphan() {
        let last_team = Some(Utc::now() - Duration::days(10));
        assert!(is_orphan_candidate(last_team, Utc::now(), 0, &opts()));
    }

    #[test]
    fn recent_team_activity_is_not_orphan() {
        let last_team = Some(Utc::now() - Duration::hours(1));
        assert!(!is_orphan_candidate(last_team, Utc::now(), 0, &opts()));
    }

    #[test]
    fn no_team_activity_and_stale_updated_is_orphan() {
        assert!(is_orphan_candidate(None, Utc::now() - Duration::days(10), 0, &opts()));
    }

    #[test]
    fn consecutive_author_comments_triggers_orphan_regardless_of_staleness() {
        assert!(is_orphan_candidate(Some(Utc::now()), Utc::now(), 3, &opts()));
    }
}
