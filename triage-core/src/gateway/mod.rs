//! Thin wrapper over the Platform's REST and GraphQL endpoints (spec.md §4.3).
//!
//! One concrete client (not an enum-dispatch facade like the teacher's
//! `ProviderClient`, since this spec targets a single platform): a shared
//! `reqwest::Client`, base API URL, and bearer token, with one method per
//! REST operation plus `execute_graphql` for the batched enrichment path.
//! Rate-limit headers are parsed on every response and fed to the shared
//! `RateGuard`.

pub mod graphql;
pub mod rest;

use crate::errors::{ProviderError, TriageResult};
use crate::model::{Item, Reason, Repository, Subject, SubjectType};
use crate::rate_guard::RateGuard;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Runtime configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// REST base, e.g. `"https://api.github.com"`.
    pub rest_base: String,
    /// GraphQL endpoint, e.g. `"https://api.github.com/graphql"`.
    pub graphql_url: String,
    pub token: String,
}

impl GatewayConfig {
    pub fn github_dot_com(token: String) -> Self {
        Self {
            rest_base: "https://api.github.com".to_string(),
            graphql_url: "https://api.github.com/graphql".to_string(),
            token,
        }
    }
}

/// Options for listing notifications (spec.md §4.3/§6).
#[derive(Debug, Clone, Default)]
pub struct ListNotificationsOpts {
    pub since: Option<DateTime<Utc>>,
    pub all: bool,
    pub participating: bool,
}

/// Which search surface `Search` should query (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    ReviewRequested,
    Authored,
    AssignedIssues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOrder {
    Asc,
    Desc,
}

/// GitHub REST+GraphQL client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    cfg: GatewayConfig,
    rate_guard: RateGuard,
}

impl GitHubClient {
    pub fn new(cfg: GatewayConfig, rate_guard: RateGuard) -> TriageResult<Self> {
        let http = Client::builder().user_agent("gh-triage/0.1").build()?;
        Ok(Self { http, cfg, rate_guard })
    }

    pub fn rate_guard(&self) -> &RateGuard {
        &self.rate_guard
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.cfg.token)
    }

    /// Reads `x-ratelimit-{remaining,limit,reset}` off any response and
    /// feeds them to the shared [`RateGuard`]. Never fails — a missing or
    /// malformed header set simply leaves the guard unchanged.
    fn record_rate_limit(&self, resp: &Response) {
        let headers = resp.headers();
        let remaining = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let limit = headers
            .get("x-ratelimit-limit")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let reset = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

        if let (Some(remaining), Some(limit), Some(reset)) = (remaining, limit, reset) {
            self.rate_guard.update(remaining, limit, reset);
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> TriageResult<T> {
        if self.rate_guard.is_limited() {
            return Err(ProviderError::RateLimited { retry_after_secs: None }.into());
        }
        let resp = self
            .http
            .get(url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        self.record_rate_limit(&resp);
        let resp = resp.error_for_status()?;
        Ok(resp.json().await?)
    }

    /// `GetAuthenticatedUser() → login`.
    pub async fn get_authenticated_user(&self) -> TriageResult<String> {
        let url = format!("{}/user", self.cfg.rest_base);
        let user: rest::User = self.get_json(&url).await?;
        Ok(user.login)
    }

    /// `MarkThreadRead(id)`.
    pub async fn mark_thread_read(&self, thread_id: &str) -> TriageResult<()> {
        if self.rate_guard.is_limited() {
            return Err(ProviderError::RateLimited { retry_after_secs: None }.into());
        }
        let url = format!("{}/notifications/threads/{thread_id}", self.cfg.rest_base);
        let resp = self
            .http
            .patch(url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        self.record_rate_limit(&resp);
        resp.error_for_status()?;
        Ok(())
    }

    /// `ListNotifications(opts) → Item[]`: paginates at 100/page, converts
    /// each raw thread into the internal [`Item`] shape.
    pub async fn list_notifications(&self, opts: &ListNotificationsOpts) -> TriageResult<Vec<Item>> {
        if self.rate_guard.is_limited() {
            return Err(ProviderError::RateLimited { retry_after_secs: None }.into());
        }

        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let mut url = format!(
                "{}/notifications?per_page=100&page={page}&all={}&participating={}",
                self.cfg.rest_base, opts.all, opts.participating
            );
            if let Some(since) = opts.since {
                url.push_str(&format!("&since={}", since.to_rfc3339()));
            }

            let resp = self
                .http
                .get(&url)
                .header("Authorization", self.auth_header())
                .send()
                .await?;
            self.record_rate_limit(&resp);
            let resp = resp.error_for_status()?;
            let threads: Vec<rest::NotificationThread> = resp.json().await?;
            if threads.is_empty() {
                break;
            }
            let got = threads.len();
            items.extend(threads.into_iter().map(rest::NotificationThread::into_item));
            if got < 100 {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    /// `ListIssueComments(owner, repo, number, limit, order)` — used for
    /// `lastCommenter`.
    pub async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        limit: u32,
        order: CommentOrder,
    ) -> TriageResult<Vec<rest::IssueComment>> {
        let dir = match order {
            CommentOrder::Asc => "asc",
            CommentOrder::Desc => "desc",
        };
        let url = format!(
            "{}/repos/{owner}/{repo}/issues/{number}/comments?per_page={limit}&sort=created&direction={dir}",
            self.cfg.rest_base
        );
        self.get_json(&url).await
    }

    pub async fn get_pr(&self, owner: &str, repo: &str, number: u64) -> TriageResult<rest::PullRequest> {
        let url = format!("{}/repos/{owner}/{repo}/pulls/{number}", self.cfg.rest_base);
        self.get_json(&url).await
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> TriageResult<rest::Issue> {
        let url = format!("{}/repos/{owner}/{repo}/issues/{number}", self.cfg.rest_base);
        self.get_json(&url).await
    }

    pub async fn list_pr_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> TriageResult<Vec<rest::Review>> {
        let url = format!(
            "{}/repos/{owner}/{repo}/pulls/{number}/reviews?per_page=100",
            self.cfg.rest_base
        );
        self.get_json(&url).await
    }

    pub async fn list_check_runs(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> TriageResult<Vec<rest::CheckRun>> {
        let url = format!(
            "{}/repos/{owner}/{repo}/commits/{git_ref}/check-runs?per_page=100",
            self.cfg.rest_base
        );
        let resp: rest::CheckRunsResponse = self.get_json(&url).await?;
        Ok(resp.check_runs)
    }

    /// `ExecuteGraphQL(query, token) → rawJson`.
    ///
    /// Posts `{"query": ...}` with a bearer token. A non-200 HTTP status is
    /// an `Error`; a non-empty top-level `errors` array is logged
    /// (`ProviderError::GraphQlPartial`) but the `data` block is still
    /// returned — partial data is acceptable (spec.md §4.3).
    pub async fn execute_graphql(&self, query: &str) -> TriageResult<Value> {
        if self.rate_guard.is_limited() {
            return Err(ProviderError::RateLimited { retry_after_secs: None }.into());
        }

        let body = serde_json::json!({ "query": query });
        let resp = self
            .http
            .post(&self.cfg.graphql_url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;
        self.record_rate_limit(&resp);
        let resp = resp.error_for_status()?;
        let payload: Value = resp.json().await?;

        if let Some(errors) = payload.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                warn!("graphql response carried {} error(s): {:?}", errors.len(), errors);
                debug!("{}", ProviderError::GraphQlPartial(errors.len()));
            }
        }

        payload
            .get("data")
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse("missing data block".to_string()).into())
    }

    /// `DiscoverRepos()` — the optional `--discover-repos` path (spec.md §4.6
    /// "Input", SPEC_FULL.md §9.d): repositories where the viewer has
    /// `WRITE`/`MAINTAIN`/`ADMIN` permission, sorted by most recently
    /// pushed, skipping archived ones.
    pub async fn discover_repos(&self) -> TriageResult<Vec<String>> {
        let query = graphql::build_viewer_repos_query();
        let data = self.execute_graphql(&query).await?;
        Ok(graphql::parse_viewer_repos_response(&data))
    }

    /// `Search(query, kind)` — paginated search used by `SourceMerger` to
    /// find review-requested and authored PRs/issues.
    pub async fn search(&self, query: &str, kind: SearchKind) -> TriageResult<Vec<rest::SearchResultItem>> {
        if self.rate_guard.is_limited() {
            return Err(ProviderError::RateLimited { retry_after_secs: None }.into());
        }
        let endpoint = match kind {
            SearchKind::ReviewRequested | SearchKind::Authored => "issues",
            SearchKind::AssignedIssues => "issues",
        };

        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}/search/{endpoint}?q={}&per_page=100&page={page}",
                self.cfg.rest_base,
                urlencoding::encode(query)
            );
            let resp = self
                .http
                .get(&url)
                .header("Authorization", self.auth_header())
                .send()
                .await?;
            self.record_rate_limit(&resp);
            let resp = resp.error_for_status()?;
            let page_result: rest::SearchResponse = resp.json().await?;
            let got = page_result.items.len();
            items.extend(page_result.items);
            if got < 100 {
                break;
            }
            page += 1;
        }
        Ok(items)
    }
}

/// Converts a search result item into a synthetic [`Item`] for
/// `SourceMerger` (the PR-size fields are filled later via REST follow-up).
pub fn search_item_to_item(result: &rest::SearchResultItem, reason: Reason) -> Item {
    Item {
        id: format!("search-{}", result.id),
        reason,
        unread: true,
        updated_at: result.updated_at,
        repository: Repository {
            full_name: result.repository_full_name(),
            html_url: String::new(),
            private: false,
        },
        subject: Subject {
            title: result.title.clone(),
            api_url: result.url.clone(),
            subject_type: if result.pull_request.is_some() {
                SubjectType::PullRequest
            } else {
                SubjectType::Issue
            },
        },
        details: None,
    }
}
