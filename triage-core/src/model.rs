//! Provider-agnostic data model for the triage pipeline.
//!
//! Mirrors the shape of `mr_reviewer::git_providers::types`: plain structs,
//! `chrono::DateTime<Utc>` timestamps, `serde` derives on everything that
//! crosses the cache boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The Platform's classification of why the user was notified. The
/// synthetic `Orphaned` variant is added by this system (never sent by the
/// Platform itself).
///
/// Deserializes from (and serializes to) a plain lowercase string, with a
/// hand-written `Other` fallback: an unrecognized reason degrades to the
/// lowest score bucket (spec.md §4.7 default table) instead of failing the
/// whole list fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reason {
    Mention,
    ReviewRequested,
    Author,
    Assign,
    Comment,
    Subscribed,
    TeamMention,
    StateChange,
    CiActivity,
    Manual,
    /// Synthesized by `OrphanAnalyzer`; never comes from the Platform.
    Orphaned,
    /// Anything the Platform sends that we don't recognize.
    Other(String),
}

impl Reason {
    /// Stable lowercase token, used both for search-query construction and
    /// as a cache-key fragment.
    pub fn as_str(&self) -> &str {
        match self {
            Reason::Mention => "mention",
            Reason::ReviewRequested => "review_requested",
            Reason::Author => "author",
            Reason::Assign => "assign",
            Reason::Comment => "comment",
            Reason::Subscribed => "subscribed",
            Reason::TeamMention => "team_mention",
            Reason::StateChange => "state_change",
            Reason::CiActivity => "ci_activity",
            Reason::Manual => "manual",
            Reason::Orphaned => "orphaned",
            Reason::Other(s) => s.as_str(),
        }
    }

    fn from_str(s: &str) -> Self {
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
            "orphaned" => Reason::Orphaned,
            other => Reason::Other(other.to_string()),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Reason {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Reason::from_str(&s))
    }
}

/// The kind of thing a notification's subject refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectType {
    Issue,
    PullRequest,
    Release,
    Discussion,
}

/// State of an issue or pull request after enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Open,
    Closed,
    Merged,
}

/// Aggregate review state across all non-stale reviews on a PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Pending,
    Reviewed,
    ReviewRequired,
}

/// Aggregate CI check-rollup conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiStatus {
    Success,
    Failure,
    Pending,
    /// No rollup/checks at all — spec.md represents this as `""`.
    Unknown,
}

/// `authorAssociation` as reported by the Platform's GraphQL API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorAssociation {
    #[serde(rename = "OWNER")]
    Owner,
    #[serde(rename = "MEMBER")]
    Member,
    #[serde(rename = "COLLABORATOR")]
    Collaborator,
    #[serde(rename = "CONTRIBUTOR")]
    Contributor,
    #[serde(rename = "FIRST_TIMER")]
    FirstTimer,
    #[serde(rename = "FIRST_TIME_CONTRIBUTOR")]
    FirstTimeContributor,
    #[serde(rename = "NONE")]
    None,
}

impl AuthorAssociation {
    /// §4.6: team iff OWNER/MEMBER/COLLABORATOR.
    pub fn is_team_member(&self) -> bool {
        matches!(
            self,
            AuthorAssociation::Owner | AuthorAssociation::Member | AuthorAssociation::Collaborator
        )
    }
}

/// `{ fullName, htmlUrl, private }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub html_url: String,
    pub private: bool,
}

impl Repository {
    /// Splits `"owner/repo"`. Used for both REST paths and GraphQL query
    /// arguments; a repository whose `full_name` doesn't split into exactly
    /// two segments is left unenriched (spec.md §4.4 step 1).
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        let mut parts = self.full_name.splitn(2, '/');
        let owner = parts.next()?;
        let name = parts.next()?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some((owner, name))
    }
}

/// `{ title, apiUrl, type }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub title: String,
    pub api_url: String,
    #[serde(rename = "type")]
    pub subject_type: SubjectType,
}

impl Subject {
    /// Parses the trailing issue/PR number out of a REST "api url", e.g.
    /// `https://api.github.com/repos/o/r/issues/42` → `Some(42)`.
    ///
    /// Returns `None` for an empty or unparseable URL — per spec.md's
    /// boundary behavior, such items pass through unenriched rather than
    /// erroring.
    pub fn number(&self) -> Option<u64> {
        if self.api_url.is_empty() {
            return None;
        }
        self.api_url.rsplit('/').next()?.parse().ok()
    }
}

/// The central entity: an issue or pull request surfaced by any source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub reason: Reason,
    pub unread: bool,
    pub updated_at: DateTime<Utc>,
    pub repository: Repository,
    pub subject: Subject,
    pub details: Option<ItemDetails>,
}

impl Item {
    /// Synthetic id for an orphan-detection result: `"orphaned-<owner/repo>-<number>"`.
    pub fn orphan_id(repo_full_name: &str, number: u64) -> String {
        format!("orphaned-{repo_full_name}-{number}")
    }
}

/// Enrichment payload for an `Item`, absent until `Enricher` runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetails {
    pub number: u64,
    pub state: ItemState,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
    pub comment_count: u32,
    pub last_commenter: Option<String>,

    // --- PR-only ---
    pub is_pr: bool,
    pub merged: bool,
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: u32,
    pub deletions: u32,
    pub changed_files: u32,
    pub review_state: Option<ReviewState>,
    pub mergeable: Option<bool>,
    pub ci_status: CiStatus,
    pub draft: bool,
    pub requested_reviewers: Vec<String>,
    pub latest_reviewer: Option<String>,

    // --- orphan-only ---
    pub author_association: Option<AuthorAssociation>,
    pub last_team_activity_at: Option<DateTime<Utc>>,
    pub consecutive_author_comments: u32,
}

impl ItemDetails {
    /// A details payload with every optional/collection field empty, to be
    /// filled in by whichever caller constructs it (REST or GraphQL path).
    pub fn empty(number: u64, is_pr: bool) -> Self {
        Self {
            number,
            state: ItemState::Open,
            html_url: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
            author: None,
            assignees: Vec::new(),
            labels: Vec::new(),
            comment_count: 0,
            last_commenter: None,
            is_pr,
            merged: false,
            merged_at: None,
            additions: 0,
            deletions: 0,
            changed_files: 0,
            review_state: None,
            mergeable: None,
            ci_status: CiStatus::Unknown,
            draft: false,
            requested_reviewers: Vec::new(),
            latest_reviewer: None,
            author_association: None,
            last_team_activity_at: None,
            consecutive_author_comments: 0,
        }
    }

    /// Enforces invariant I2: `merged ⇒ state == Merged ∧ merged_at.is_some()`.
    pub fn apply_merge_invariant(&mut self) {
        if self.merged_at.is_some() {
            self.merged = true;
            self.state = ItemState::Merged;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_and_name_splits_cleanly() {
        let repo = Repository {
            full_name: "octocat/Hello-World".into(),
            html_url: String::new(),
            private: false,
        };
        assert_eq!(repo.owner_and_name(), Some(("octocat", "Hello-World")));
    }

    #[test]
    fn owner_and_name_rejects_malformed() {
        let repo = Repository {
            full_name: "octocat".into(),
            html_url: String::new(),
            private: false,
        };
        assert_eq!(repo.owner_and_name(), None);

        let repo = Repository {
            full_name: "a/b/c".into(),
            html_url: String::new(),
            private: false,
        };
        assert_eq!(repo.owner_and_name(), None);
    }

    #[test]
    fn subject_number_parses_trailing_segment() {
        let subj = Subject {
            title: "t".into(),
            api_url: "https://api.github.com/repos/o/r/issues/42".into(),
            subject_type: SubjectType::Issue,
        };
        assert_eq!(subj.number(), Some(42));
    }

    #[test]
    fn subject_number_empty_url_is_none() {
        let subj = Subject {
            title: "t".into(),
            api_url: String::new(),
            subject_type: SubjectType::Issue,
        };
        assert_eq!(subj.number(), None);
    }

    #[test]
    fn merge_invariant_forces_merged_state() {
        let mut d = ItemDetails::empty(1, true);
        d.merged_at = Some(Utc::now());
        d.apply_merge_invariant();
        assert!(d.merged);
        assert_eq!(d.state, ItemState::Merged);
    }
}
