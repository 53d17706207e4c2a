//! Fills in `Item::details` for notification-sourced items (spec.md §4.4).
//!
//! Three passes, in order: a cache lookup (free), a GraphQL batch pass (up
//! to `batch_size` items per round trip), and a `Semaphore`-bounded REST
//! fallback for anything the batch pass left unresolved — the same
//! bounded-worker-pool shape as the teacher's `publish::gitlab` pipeline,
//! generalized from publish workers to enrichment fetches.

use crate::cache::Cache;
use crate::errors::{Error, TriageResult};
use crate::gateway::graphql::{self, BatchTarget};
use crate::gateway::rest::{fold_check_runs, fold_reviews};
use crate::gateway::{CommentOrder, GitHubClient};
use crate::model::{Item, ItemDetails, SubjectType};
use crate::pipeline::ProgressEvent;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Max items per GraphQL batch query (spec.md §4.4 caps this at 50).
    pub batch_size: usize,
    /// Max concurrent REST fallback requests.
    pub rest_concurrency: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            rest_concurrency: 8,
        }
    }
}

/// Enriches every item in place. Items whose repository or subject can't be
/// parsed into an owner/repo/number triple are left with `details: None`
/// (spec.md §4.4 step 1 boundary case) and never counted as failures.
///
/// Returns `Err` only for a rate-limit or auth failure, which aborts the
/// whole enrichment phase per spec.md §7; any other per-item failure is
/// logged and the item is simply left unenriched.
pub async fn enrich(
    cache: &Cache,
    gateway: &GitHubClient,
    items: &mut [Item],
    opts: &EnrichOptions,
    on_progress: &(dyn Fn(ProgressEvent) + Sync),
) -> TriageResult<()> {
    let mut pending_idx = Vec::new();
    let mut cache_hits = 0usize;

    for (idx, item) in items.iter_mut().enumerate() {
        if item.details.is_some() {
            continue;
        }
        if let Some(details) = cache.get_details(item).await {
            item.details = Some(details);
            cache_hits += 1;
        } else if item.repository.owner_and_name().is_some() && item.subject.number().is_some() {
            pending_idx.push(idx);
        }
    }
    if cache_hits > 0 {
        on_progress(ProgressEvent::CacheHit { count: cache_hits });
    }

    for chunk in pending_idx.chunks(opts.batch_size.max(1)) {
        let targets: Vec<BatchTarget> = chunk
            .iter()
            .enumerate()
            .map(|(i, &idx)| {
                let item = &items[idx];
                let (owner, repo) = item
                    .repository
                    .owner_and_name()
                    .expect("pending_idx only contains parseable repositories");
                let is_pr = item.subject.subject_type == SubjectType::PullRequest;
                let alias = format!("{}{i}", if is_pr { "pr" } else { "issue" });
                BatchTarget {
                    alias,
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    number: item.subject.number().expect("pending_idx only contains numbered subjects"),
                    is_pr,
                }
            })
            .collect();

        let query = graphql::build_batch_query(&targets);
        match gateway.execute_graphql(&query).await {
            Ok(data) => {
                let entries = graphql::demux_batch_response(&data, &targets);
                let mut unresolved = Vec::new();
                for (&idx, entry) in chunk.iter().zip(entries.iter()) {
                    match &entry.details {
                        Some(details) => {
                            items[idx].details = Some(details.clone());
                            cache.set_details(&items[idx], details).await;
                        }
                        None => unresolved.push(idx),
                    }
                }
                on_progress(ProgressEvent::BatchEnriched {
                    batch_size: chunk.len() - unresolved.len(),
                });
                rest_fallback(cache, gateway, items, &unresolved, opts, on_progress).await?;
            }
            Err(err) if err.is_rate_limited() || err.is_auth_error() => return Err(err),
            Err(err) => {
                warn!("graphql batch failed, falling back to REST for {} item(s): {err}", chunk.len());
                rest_fallback(cache, gateway, items, chunk, opts, on_progress).await?;
            }
        }
    }

    Ok(())
}

async fn rest_fallback(
    cache: &Cache,
    gateway: &GitHubClient,
    items: &mut [Item],
    idxs: &[usize],
    opts: &EnrichOptions,
    on_progress: &(dyn Fn(ProgressEvent) + Sync),
) -> TriageResult<()> {
    if idxs.is_empty() {
        return Ok(());
    }

    let semaphore = Arc::new(Semaphore::new(opts.rest_concurrency.max(1)));
    let mut set = tokio::task::JoinSet::new();

    for &idx in idxs {
        let item = items[idx].clone();
        let gateway = gateway.clone();
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closes");
            (idx, fetch_one(&gateway, &item).await)
        });
    }

    let mut fatal: Option<Error> = None;
    while let Some(joined) = set.join_next().await {
        let (idx, result) = joined.expect("rest fallback task panicked");
        match result {
            Ok(details) => {
                items[idx].details = Some(details.clone());
                cache.set_details(&items[idx], &details).await;
                on_progress(ProgressEvent::ItemEnriched);
            }
            Err(err) if err.is_rate_limited() || err.is_auth_error() => {
                fatal.get_or_insert(err);
            }
            Err(err) => {
                debug!("rest enrichment failed for item {}: {err}", items[idx].id);
                on_progress(ProgressEvent::Warning(format!(
                    "failed to enrich {}: {err}",
                    items[idx].id
                )));
            }
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn fetch_one(gateway: &GitHubClient, item: &Item) -> TriageResult<ItemDetails> {
    let (owner, repo) = item
        .repository
        .owner_and_name()
        .ok_or_else(|| Error::Validation(format!("unparseable repository {}", item.repository.full_name)))?;
    let number = item
        .subject
        .number()
        .ok_or_else(|| Error::Validation("subject has no trailing number".to_string()))?;

    if item.subject.subject_type == SubjectType::PullRequest {
        let pr = gateway.get_pr(owner, repo, number).await?;
        let head_sha = pr.head.sha.clone();
        let mut details = pr.into_details();

        let reviews = gateway.list_pr_reviews(owner, repo, number).await.unwrap_or_default();
        let (review_state, latest_reviewer) = fold_reviews(&reviews);
        details.review_state = match review_state {
            Some(state) => Some(state),
            None if !details.requested_reviewers.is_empty() => Some(crate::model::ReviewState::ReviewRequired),
            None => None,
        };
        details.latest_reviewer = latest_reviewer;

        let checks = gateway.list_check_runs(owner, repo, &head_sha).await.unwrap_or_default();
        details.ci_status = fold_check_runs(&checks);
        details.last_commenter = last_commenter(gateway, owner, repo, number).await;
        Ok(details)
    } else {
        let issue = gateway.get_issue(owner, repo, number).await?;
        let mut details = issue.into_details();
        details.last_commenter = last_commenter(gateway, owner, repo, number).await;
        Ok(details)
    }
}

async fn last_commenter(gateway: &GitHubClient, owner: &str, repo: &str, number: u64) -> Option<String> {
    let comments = gateway
        .list_issue_comments(owner, repo, number, 1, CommentOrder::Desc)
        .await
        .ok()?;
    comments.into_iter().next().and_then(|c| c.user).map(|u| u.login)
}
