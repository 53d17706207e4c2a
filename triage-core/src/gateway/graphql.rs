//! Alias-based batch GraphQL queries (spec.md §4.4 steps 2-4).
//!
//! Up to 50 issues/PRs are folded into a single query using `pr0:`/`issue0:`
//! style aliases so the Platform answers them all in one round trip. The
//! response is demultiplexed back into one [`BatchEntry`] per alias.

use crate::model::{AuthorAssociation, CiStatus, ItemDetails, ItemState, ReviewState};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// One item to fold into a batch query.
#[derive(Debug, Clone)]
pub struct BatchTarget {
    pub alias: String,
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub is_pr: bool,
}

/// Builds a single GraphQL document covering every target, aliasing each
/// lookup `pr0`, `pr1`, ... or `issue0`, `issue1`, ... so the response can be
/// demultiplexed by alias. Callers must cap `targets` at 50 (spec.md §4.4).
pub fn build_batch_query(targets: &[BatchTarget]) -> String {
    let mut fields = String::new();
    for target in targets {
        let block = if target.is_pr {
            pr_fragment(target)
        } else {
            issue_fragment(target)
        };
        fields.push_str(&block);
        fields.push('\n');
    }
    format!("query {{\n{fields}}}")
}

fn pr_fragment(t: &BatchTarget) -> String {
    format!(
        r#"  {alias}: repository(owner: "{owner}", name: "{repo}") {{
    pullRequest(number: {number}) {{
      number
      state
      url
      createdAt
      updatedAt
      closedAt
      mergedAt
      merged
      author {{ login }}
      assignees(first: 20) {{ nodes {{ login }} }}
      labels(first: 20) {{ nodes {{ name }} }}
      comments(last: 1) {{ totalCount nodes {{ author {{ login }} }} }}
      additions
      deletions
      changedFiles
      mergeable
      isDraft
      authorAssociation
      reviewRequests(first: 20) {{ nodes {{ requestedReviewer {{ ... on User {{ login }} }} }} }}
      reviews(last: 20) {{ nodes {{ author {{ login }} state submittedAt }} }}
      commits(last: 1) {{ nodes {{ commit {{ statusCheckRollup {{ state }} }} }} }}
    }}
  }}"#,
        alias = t.alias,
        owner = t.owner,
        repo = t.repo,
        number = t.number,
    )
}

fn issue_fragment(t: &BatchTarget) -> String {
    format!(
        r#"  {alias}: repository(owner: "{owner}", name: "{repo}") {{
    issue(number: {number}) {{
      number
      state
      url
      createdAt
      updatedAt
      closedAt
      author {{ login }}
      assignees(first: 20) {{ nodes {{ login }} }}
      labels(first: 20) {{ nodes {{ name }} }}
      comments(last: 1) {{ totalCount nodes {{ author {{ login }} }} }}
      authorAssociation
    }}
  }}"#,
        alias = t.alias,
        owner = t.owner,
        repo = t.repo,
        number = t.number,
    )
}

/// Query for `--discover-repos` (spec.md §4.6 "Input"): repositories where
/// the viewer has `WRITE`/`MAINTAIN`/`ADMIN` permission, sorted by most
/// recently pushed, skipping archived ones. `first: 100` matches the single
/// round-trip GitHub allows per `orderBy` cursor page; callers asking for
/// more than 100 repos are out of scope for this flag.
pub fn build_viewer_repos_query() -> String {
    r#"query {
  viewer {
    repositories(first: 100, orderBy: { field: PUSHED_AT, direction: DESC }, affiliations: [OWNER, COLLABORATOR, ORGANIZATION_MEMBER]) {
      nodes {
        nameWithOwner
        isArchived
        viewerPermission
      }
    }
  }
}"#
    .to_string()
}

#[derive(Debug, Deserialize)]
struct RawViewerRepo {
    #[serde(rename = "nameWithOwner")]
    name_with_owner: String,
    #[serde(rename = "isArchived")]
    is_archived: bool,
    #[serde(rename = "viewerPermission")]
    viewer_permission: String,
}

#[derive(Debug, Deserialize)]
struct RawViewerRepos {
    nodes: Vec<RawViewerRepo>,
}

#[derive(Debug, Deserialize)]
struct RawViewer {
    repositories: RawViewerRepos,
}

#[derive(Debug, Deserialize)]
struct RawViewerResponse {
    viewer: RawViewer,
}

/// Demultiplexes `build_viewer_repos_query`'s response, keeping only
/// non-archived repos with at least `WRITE` permission. `orderBy` already
/// sorted the nodes by `pushedAt` descending, so this is a pure filter.
pub fn parse_viewer_repos_response(data: &Value) -> Vec<String> {
    let Ok(parsed) = serde_json::from_value::<RawViewerResponse>(data.clone()) else {
        return Vec::new();
    };
    parsed
        .viewer
        .repositories
        .nodes
        .into_iter()
        .filter(|r| !r.is_archived)
        .filter(|r| matches!(r.viewer_permission.as_str(), "WRITE" | "MAINTAIN" | "ADMIN"))
        .map(|r| r.name_with_owner)
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawLogin {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawNodes<T> {
    #[serde(default)]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawCommentNode {
    author: Option<RawLogin>,
}

#[derive(Debug, Deserialize)]
struct RawCommentsConnection {
    #[serde(rename = "totalCount")]
    total_count: u32,
    #[serde(default)]
    nodes: Vec<RawCommentNode>,
}

impl RawCommentsConnection {
    fn last_commenter(&self) -> Option<String> {
        self.nodes.last().and_then(|n| n.author.as_ref()).map(|a| a.login.clone())
    }
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawReviewRequest {
    #[serde(rename = "requestedReviewer")]
    requested_reviewer: Option<RawLogin>,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    author: Option<RawLogin>,
    state: String,
    #[serde(rename = "submittedAt")]
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawStatusRollup {
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    #[serde(rename = "statusCheckRollup")]
    status_check_rollup: Option<RawStatusRollup>,
}

#[derive(Debug, Deserialize)]
struct RawCommitWrapper {
    commit: RawCommit,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    state: String,
    url: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    #[serde(rename = "closedAt")]
    closed_at: Option<DateTime<Utc>>,
    #[serde(rename = "mergedAt")]
    merged_at: Option<DateTime<Utc>>,
    merged: bool,
    author: Option<RawLogin>,
    assignees: RawNodes<RawLogin>,
    labels: RawNodes<RawLabel>,
    comments: RawCommentsConnection,
    additions: u32,
    deletions: u32,
    #[serde(rename = "changedFiles")]
    changed_files: u32,
    mergeable: Option<String>,
    #[serde(rename = "isDraft")]
    is_draft: bool,
    #[serde(rename = "authorAssociation")]
    author_association: Option<AuthorAssociation>,
    #[serde(rename = "reviewRequests")]
    review_requests: RawNodes<RawReviewRequest>,
    reviews: RawNodes<RawReview>,
    commits: RawNodes<RawCommitWrapper>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    state: String,
    url: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    #[serde(rename = "closedAt")]
    closed_at: Option<DateTime<Utc>>,
    author: Option<RawLogin>,
    assignees: RawNodes<RawLogin>,
    labels: RawNodes<RawLabel>,
    comments: RawCommentsConnection,
    #[serde(rename = "authorAssociation")]
    author_association: Option<AuthorAssociation>,
}

#[derive(Debug, Deserialize)]
struct RepoWrapperPr {
    #[serde(rename = "pullRequest")]
    pull_request: Option<RawPullRequest>,
}

#[derive(Debug, Deserialize)]
struct RepoWrapperIssue {
    issue: Option<RawIssue>,
}

/// One demultiplexed batch result: the alias it answers and the details
/// extracted from it (`None` if the node came back null — e.g. the PR or
/// issue was deleted between list and enrich).
pub struct BatchEntry {
    pub alias: String,
    pub details: Option<ItemDetails>,
}

/// Splits the raw `data` block from `execute_graphql` back into one
/// [`BatchEntry`] per target, using the same aliases `build_batch_query`
/// assigned. A target whose alias is missing from the response, or whose
/// repository/issue/pullRequest node is null, yields `details: None`
/// rather than failing the whole batch (spec.md §4.4, partial tolerance).
pub fn demux_batch_response(data: &Value, targets: &[BatchTarget]) -> Vec<BatchEntry> {
    targets
        .iter()
        .map(|target| {
            let node = data.get(&target.alias);
            let details = node.and_then(|repo_node| {
                if target.is_pr {
                    let wrapper: RepoWrapperPr = serde_json::from_value(repo_node.clone()).ok()?;
                    wrapper.pull_request.map(pr_into_details)
                } else {
                    let wrapper: RepoWrapperIssue = serde_json::from_value(repo_node.clone()).ok()?;
                    wrapper.issue.map(issue_into_details)
                }
            });
            BatchEntry {
                alias: target.alias.clone(),
                details,
            }
        })
        .collect()
}

fn pr_into_details(raw: RawPullRequest) -> ItemDetails {
    let mut d = ItemDetails::empty(raw.number, true);
    d.state = match raw.state.as_str() {
        "CLOSED" => ItemState::Closed,
        "MERGED" => ItemState::Merged,
        _ => ItemState::Open,
    };
    d.html_url = raw.url;
    d.created_at = raw.created_at;
    d.updated_at = raw.updated_at;
    d.closed_at = raw.closed_at;
    d.merged_at = raw.merged_at;
    d.merged = raw.merged;
    d.author = raw.author.map(|a| a.login);
    d.assignees = raw.assignees.nodes.into_iter().map(|a| a.login).collect();
    d.labels = raw.labels.nodes.into_iter().map(|l| l.name).collect();
    d.comment_count = raw.comments.total_count;
    d.last_commenter = raw.comments.last_commenter();
    d.additions = raw.additions;
    d.deletions = raw.deletions;
    d.changed_files = raw.changed_files;
    d.mergeable = raw.mergeable.map(|m| m == "MERGEABLE");
    d.draft = raw.is_draft;
    d.author_association = raw.author_association;
    d.requested_reviewers = raw
        .review_requests
        .nodes
        .into_iter()
        .filter_map(|r| r.requested_reviewer.map(|l| l.login))
        .collect();

    let reviews: Vec<(Option<String>, String)> = raw
        .reviews
        .nodes
        .into_iter()
        .map(|r| (r.author.map(|a| a.login), r.state))
        .collect();
    let (review_state, latest_reviewer) = fold_raw_reviews(&reviews);
    d.review_state = match review_state {
        Some(state) => Some(state),
        None if !d.requested_reviewers.is_empty() => Some(ReviewState::ReviewRequired),
        None => None,
    };
    d.latest_reviewer = latest_reviewer;

    d.ci_status = raw
        .commits
        .nodes
        .first()
        .and_then(|c| c.commit.status_check_rollup.as_ref())
        .and_then(|r| r.state.as_deref())
        .map(ci_status_from_rollup_state)
        .unwrap_or(CiStatus::Unknown);

    d.apply_merge_invariant();
    d
}

fn issue_into_details(raw: RawIssue) -> ItemDetails {
    let mut d = ItemDetails::empty(raw.number, false);
    d.state = if raw.state == "CLOSED" { ItemState::Closed } else { ItemState::Open };
    d.html_url = raw.url;
    d.created_at = raw.created_at;
    d.updated_at = raw.updated_at;
    d.closed_at = raw.closed_at;
    d.author = raw.author.map(|a| a.login);
    d.assignees = raw.assignees.nodes.into_iter().map(|a| a.login).collect();
    d.labels = raw.labels.nodes.into_iter().map(|l| l.name).collect();
    d.comment_count = raw.comments.total_count;
    d.last_commenter = raw.comments.last_commenter();
    d.author_association = raw.author_association;
    d
}

fn ci_status_from_rollup_state(state: &str) -> CiStatus {
    match state {
        "SUCCESS" => CiStatus::Success,
        "FAILURE" | "ERROR" => CiStatus::Failure,
        "PENDING" | "EXPECTED" => CiStatus::Pending,
        _ => CiStatus::Unknown,
    }
}

/// Same folding rule as the REST reviews path (spec.md §4.4 step 5),
/// generalized over `(author, state)` pairs since the GraphQL and REST
/// review shapes differ before this point.
fn fold_raw_reviews(reviews: &[(Option<String>, String)]) -> (Option<ReviewState>, Option<String>) {
    if reviews.is_empty() {
        return (None, None);
    }

    let mut latest_by_user: std::collections::HashMap<String, &str> = std::collections::HashMap::new();
    for (author, state) in reviews {
        if matches!(state.as_str(), "COMMENTED" | "PENDING" | "") {
            continue;
        }
        let Some(author) = author else { continue };
        latest_by_user.insert(author.clone(), state.as_str());
    }

    if latest_by_user.is_empty() {
        return (Some(ReviewState::Pending), None);
    }

    let any_changes_requested = latest_by_user.values().any(|s| *s == "CHANGES_REQUESTED");
    let any_approved = latest_by_user.values().any(|s| *s == "APPROVED");

    let state = if any_changes_requested {
        ReviewState::ChangesRequested
    } else if any_approved {
        ReviewState::Approved
    } else {
        ReviewState::Reviewed
    };

    let latest_reviewer = reviews
        .iter()
        .rev()
        .find(|(_, s)| s != "COMMENTED")
        .and_then(|(author, _)| author.clone());

    (Some(state), latest_reviewer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target(alias: &str, is_pr: bool) -> BatchTarget {
        BatchTarget {
            alias: alias.to_string(),
            owner: "octocat".to_string(),
            repo: "Hello-World".to_string(),
            number: 1,
            is_pr,
        }
    }

    #[test]
    fn build_batch_query_aliases_each_target() {
        let query = build_batch_query(&[target("pr0", true), target("issue0", false)]);
        assert!(query.contains("pr0: repository"));
        assert!(query.contains("issue0: repository"));
        assert!(query.contains("pullRequest(number: 1)"));
        assert!(query.contains("issue(number: 1)"));
    }

    #[test]
    fn demux_handles_missing_alias_as_none() {
        let data = json!({});
        let entries = demux_batch_response(&data, &[target("pr0", true)]);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].details.is_none());
    }

    #[test]
    fn demux_parses_present_pull_request() {
        let data = json!({
            "pr0": {
                "pullRequest": {
                    "number": 1,
                    "state": "OPEN",
                    "url": "https://github.com/octocat/Hello-World/pull/1",
                    "createdAt": "2026-01-01T00:00:00Z",
                    "updatedAt": "2026-01-02T00:00:00Z",
                    "closedAt": null,
                    "mergedAt": null,
                    "merged": false,
                    "author": { "login": "alice" },
                    "assignees": { "nodes": [] },
                    "labels": { "nodes": [{"name": "bug"}] },
                    "comments": { "totalCount": 3 },
                    "additions": 10,
                    "deletions": 2,
                    "changedFiles": 1,
                    "mergeable": "MERGEABLE",
                    "isDraft": false,
                    "authorAssociation": "MEMBER",
                    "reviewRequests": { "nodes": [] },
                    "reviews": { "nodes": [{"author": {"login": "bob"}, "state": "APPROVED", "submittedAt": "2026-01-02T00:00:00Z"}] },
                    "commits": { "nodes": [{"commit": {"statusCheckRollup": {"state": "SUCCESS"}}}] }
                }
            }
        });
        let entries = demux_batch_response(&data, &[target("pr0", true)]);
        let details = entries[0].details.as_ref().expect("pr present");
        assert_eq!(details.labels, vec!["bug".to_string()]);
        assert_eq!(details.review_state, Some(ReviewState::Approved));
        assert_eq!(details.ci_status, CiStatus::Success);
        assert!(details.mergeable.unwrap());
    }

    #[test]
    fn fold_raw_reviews_one_approved_one_dismissed_is_still_approved() {
        let reviews = vec![
            (Some("alice".to_string()), "APPROVED".to_string()),
            (Some("bob".to_string()), "DISMISSED".to_string()),
        ];
        let (state, _) = fold_raw_reviews(&reviews);
        assert_eq!(state, Some(ReviewState::Approved));
    }

    #[test]
    fn viewer_repos_query_requests_pushed_at_ordering() {
        let query = build_viewer_repos_query();
        assert!(query.contains("PUSHED_AT"));
        assert!(query.contains("viewerPermission"));
    }

    #[test]
    fn viewer_repos_filters_archived_and_read_only() {
        let data = json!({
            "viewer": {
                "repositories": {
                    "nodes": [
                        { "nameWithOwner": "me/active", "isArchived": false, "viewerPermission": "WRITE" },
                        { "nameWithOwner": "me/archived", "isArchived": true, "viewerPermission": "ADMIN" },
                        { "nameWithOwner": "me/read-only", "isArchived": false, "viewerPermission": "READ" },
                        { "nameWithOwner": "me/maintained", "isArchived": false, "viewerPermission": "MAINTAIN" },
                    ]
                }
            }
        });
        let repos = parse_viewer_repos_response(&data);
        assert_eq!(repos, vec!["me/active".to_string(), "me/maintained".to_string()]);
    }
}
