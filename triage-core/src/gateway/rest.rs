//! Raw REST response shapes, and their conversion into the internal model.
//!
//! Kept deliberately "dumb": these structs mirror the wire format with
//! `#[serde(default)]` sprinkled wherever the Platform may omit a field,
//! and the `into_item`/`into_details` conversions apply invariant I2 the
//! same way the GraphQL path does.

use crate::model::{AuthorAssociation, CiStatus, Item, ItemDetails, ItemState, Reason, Repository, ReviewState, Subject, SubjectType};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRepository {
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSubject {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub subject_type: String,
}

fn subject_type_from_str(s: &str) -> SubjectType {
    match s {
        "PullRequest" => SubjectType::PullRequest,
        "Release" => SubjectType::Release,
        "Discussion" => SubjectType::Discussion,
        _ => SubjectType::Issue,
    }
}

/// One entry of `GET /notifications`.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationThread {
    pub id: String,
    pub unread: bool,
    pub updated_at: DateTime<Utc>,
    pub reason: String,
    pub repository: RawRepository,
    pub subject: RawSubject,
}

impl NotificationThread {
    pub fn into_item(self) -> Item {
        Item {
            id: self.id,
            reason: Reason::from_wire(&self.reason),
            unread: self.unread,
            updated_at: self.updated_at,
            repository: Repository {
                full_name: self.repository.full_name,
                html_url: self.repository.html_url,
                private: self.repository.private,
            },
            subject: Subject {
                title: self.subject.title,
                api_url: self.subject.url,
                subject_type: subject_type_from_str(&self.subject.subject_type),
            },
            details: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Assignee {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IssueComment {
    pub user: Option<Assignee>,
}

/// `GET /repos/{o}/{r}/issues/{n}` (also used for the issue half of a PR).
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub state: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub user: Option<Assignee>,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub comments: u32,
    pub author_association: Option<AuthorAssociation>,
}

impl Issue {
    pub fn into_details(self) -> ItemDetails {
        let mut d = ItemDetails::empty(self.number, false);
        d.state = if self.state == "closed" { ItemState::Closed } else { ItemState::Open };
        d.html_url = self.html_url;
        d.created_at = self.created_at;
        d.updated_at = self.updated_at;
        d.closed_at = self.closed_at;
        d.author = self.user.map(|u| u.login);
        d.assignees = self.assignees.into_iter().map(|a| a.login).collect();
        d.labels = self.labels.into_iter().map(|l| l.name).collect();
        d.comment_count = self.comments;
        d.author_association = self.author_association;
        d
    }
}

/// `GET /repos/{o}/{r}/pulls/{n}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub state: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged: bool,
    pub user: Option<Assignee>,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub comments: u32,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    #[serde(default)]
    pub changed_files: u32,
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub requested_reviewers: Vec<Assignee>,
    pub author_association: Option<AuthorAssociation>,
    pub head: PullRequestRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestRef {
    pub sha: String,
}

impl PullRequest {
    pub fn into_details(self) -> ItemDetails {
        let mut d = ItemDetails::empty(self.number, true);
        d.state = if self.state == "closed" { ItemState::Closed } else { ItemState::Open };
        d.html_url = self.html_url;
        d.created_at = self.created_at;
        d.updated_at = self.updated_at;
        d.closed_at = self.closed_at;
        d.merged_at = self.merged_at;
        d.merged = self.merged;
        d.author = self.user.map(|u| u.login);
        d.assignees = self.assignees.into_iter().map(|a| a.login).collect();
        d.labels = self.labels.into_iter().map(|l| l.name).collect();
        d.comment_count = self.comments;
        d.additions = self.additions;
        d.deletions = self.deletions;
        d.changed_files = self.changed_files;
        d.mergeable = self.mergeable;
        d.draft = self.draft;
        d.requested_reviewers = self.requested_reviewers.into_iter().map(|a| a.login).collect();
        d.author_association = self.author_association;
        d.apply_merge_invariant();
        d
    }
}

/// `GET /repos/{o}/{r}/pulls/{n}/reviews`, in submission order.
#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub user: Option<Assignee>,
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Folds a list of reviews (oldest first, as GitHub returns them) into the
/// aggregate `ReviewState` + latest reviewer login, per spec.md §4.4 step 5:
/// reviews in state `COMMENTED`/`PENDING`/empty are discarded, the most
/// recent qualifying review per user wins, and `CHANGES_REQUESTED` beats
/// `APPROVED` if it is the latest state on the PR overall. Returns
/// `Pending` (not `None`) when reviews exist but none qualify — `None` is
/// reserved for a PR with zero reviews at all (the caller then decides
/// between `None` and `ReviewRequired` based on pending review requests).
pub fn fold_reviews(reviews: &[Review]) -> (Option<ReviewState>, Option<String>) {
    if reviews.is_empty() {
        return (None, None);
    }

    let mut latest_by_user: std::collections::HashMap<String, &Review> = std::collections::HashMap::new();
    for review in reviews {
        if matches!(review.state.as_str(), "COMMENTED" | "PENDING" | "") {
            continue;
        }
        let Some(user) = review.user.as_ref().map(|u| u.login.clone()) else {
            continue;
        };
        latest_by_user.insert(user, review);
    }

    if latest_by_user.is_empty() {
        return (Some(ReviewState::Pending), None);
    }

    let any_changes_requested = latest_by_user.values().any(|r| r.state == "CHANGES_REQUESTED");
    let any_approved = latest_by_user.values().any(|r| r.state == "APPROVED");

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
        .find(|r| r.state != "COMMENTED")
        .and_then(|r| r.user.as_ref().map(|u| u.login.clone()));

    (Some(state), latest_reviewer)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRunsResponse {
    #[serde(default)]
    pub check_runs: Vec<CheckRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRun {
    pub status: String,
    pub conclusion: Option<String>,
}

/// Rolls up a list of check-runs into a single `CiStatus`, per spec.md
/// §4.4 step 6's REST fallback rule: any `failure`/`timed_out`/
/// `action_required` conclusion fails the whole rollup; else any run still
/// `queued`/`in_progress` makes it pending; else success only if every
/// conclusion is `success`/`skipped`/`neutral`; no runs at all is `Unknown`.
pub fn fold_check_runs(runs: &[CheckRun]) -> CiStatus {
    if runs.is_empty() {
        return CiStatus::Unknown;
    }
    let any_failure = runs
        .iter()
        .any(|r| matches!(r.conclusion.as_deref(), Some("failure") | Some("timed_out") | Some("action_required")));
    if any_failure {
        return CiStatus::Failure;
    }
    let any_pending = runs.iter().any(|r| matches!(r.status.as_str(), "queued" | "in_progress"));
    if any_pending {
        return CiStatus::Pending;
    }
    let all_success = runs
        .iter()
        .all(|r| matches!(r.conclusion.as_deref(), Some("success") | Some("skipped") | Some("neutral")));
    if all_success {
        CiStatus::Success
    } else {
        CiStatus::Unknown
    }
}

/// `GET /search/issues` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<SearchResultItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResultItem {
    pub id: u64,
    pub title: String,
    pub html_url: String,
    pub url: String,
    pub updated_at: DateTime<Utc>,
    pub pull_request: Option<serde_json::Value>,
}

impl SearchResultItem {
    /// Derives `"owner/repo"` from `html_url`, e.g.
    /// `https://github.com/o/r/issues/3` → `"o/r"`.
    pub fn repository_full_name(&self) -> String {
        let trimmed = self.html_url.trim_start_matches("https://github.com/");
        let mut parts = trimmed.splitn(3, '/');
        match (parts.next(), parts.next()) {
            (Some(owner), Some(repo)) => format!("{owner}/{repo}"),
            _ => String::new(),
        }
    }
}

impl Reason {
    /// Maps the Platform's raw `reason` string to our enum, falling back to
    /// `Other` for anything unrecognized (spec.md §3).
    pub fn from_wire(s: &str) -> Self {
        match s {
            "mention" => Reason::Mention,
            "review_requested" => Reason::ReviewRequested,
            "author" => Reason::Author,
            "assign" => Reason::Assign,
            "comment" => Reason::Comment,
            "subscribed" => Reason::Subscribed,
            "team_mention" => Reason::TeamMention,
            "state_change" => Reason::StateChange,
            "ci_activity" => Reason::CiActivity,
            "manual" => Reason::Manual,
            other => Reason::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(user: &str, state: &str) -> Review {
        Review {
            user: Some(Assignee { login: user.to_string() }),
            state: state.to_string(),
            submitted_at: Some(Utc::now()),
        }
    }

    #[test]
    fn fold_reviews_empty_is_none() {
        assert_eq!(fold_reviews(&[]), (None, None));
    }

    #[test]
    fn fold_reviews_all_comments_is_pending() {
        let reviews = vec![review("alice", "COMMENTED")];
        let (state, _) = fold_reviews(&reviews);
        assert_eq!(state, Some(ReviewState::Pending));
    }

    #[test]
    fn fold_reviews_changes_requested_wins() {
        let reviews = vec![review("alice", "APPROVED"), review("bob", "CHANGES_REQUESTED")];
        let (state, _) = fold_reviews(&reviews);
        assert_eq!(state, Some(ReviewState::ChangesRequested));
    }

    #[test]
    fn fold_reviews_all_approved() {
        let reviews = vec![review("alice", "APPROVED"), review("bob", "APPROVED")];
        let (state, reviewer) = fold_reviews(&reviews);
        assert_eq!(state, Some(ReviewState::Approved));
        assert_eq!(reviewer, Some("bob".to_string()));
    }

    #[test]
    fn fold_reviews_one_approved_one_dismissed_is_still_approved() {
        let reviews = vec![review("alice", "APPROVED"), review("bob", "DISMISSED")];
        let (state, _) = fold_reviews(&reviews);
        assert_eq!(state, Some(ReviewState::Approved));
    }

    #[test]
    fn fold_check_runs_empty_is_unknown() {
        assert_eq!(fold_check_runs(&[]), CiStatus::Unknown);
    }

    #[test]
    fn fold_check_runs_in_progress_is_pending() {
        let runs = vec![CheckRun { status: "in_progress".into(), conclusion: None }];
        assert_eq!(fold_check_runs(&runs), CiStatus::Pending);
    }

    #[test]
    fn fold_check_runs_one_failure_fails_rollup() {
        let runs = vec![
            CheckRun { status: "completed".into(), conclusion: Some("success".into()) },
            CheckRun { status: "completed".into(), conclusion: Some("failure".into()) },
        ];
        assert_eq!(fold_check_runs(&runs), CiStatus::Failure);
    }

    #[test]
    fn repository_full_name_from_html_url() {
        let item = SearchResultItem {
            id: 1,
            title: "t".into(),
            html_url: "https://github.com/octocat/Hello-World/issues/3".into(),
            url: "https://api.github.com/repos/octocat/Hello-World/issues/3".into(),
            updated_at: Utc::now(),
            pull_request: None,
        };
        assert_eq!(item.repository_full_name(), "octocat/Hello-World");
    }
}
