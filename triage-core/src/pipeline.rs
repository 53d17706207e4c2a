//! Orchestrates the full triage run: list → enrich → merge extra sources →
//! optional orphan analysis → score → filter → sort → truncate (spec.md
//! §4.8).

use crate::cache::Cache;
use crate::cache::entries::{self, ListCacheEntry, ListCacheOpts, ListFamily};
use crate::enricher::{self, EnrichOptions};
use crate::errors::TriageResult;
use crate::gateway::{GitHubClient, ListNotificationsOpts};
use crate::model::{Item, Reason, SubjectType};
use crate::orphan::{self, OrphanOptions};
use crate::scoring::{self, Category, ScoreWeights, Scored};
use crate::source_merger;
use chrono::{DateTime, Utc};

/// Progress notifications delivered through a plain `Fn` callback — no
/// channels, matching the teacher's preference for in-process callbacks
/// over message-passing when no real concurrency crosses the boundary.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    PhaseStarted { phase: &'static str },
    PhaseCompleted { phase: &'static str, item_count: usize },
    ItemsFetched { source: &'static str, count: usize },
    CacheHit { count: usize },
    BatchEnriched { batch_size: usize },
    ItemEnriched,
    Warning(String),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub user: String,
    pub since: Option<DateTime<Utc>>,
    pub all: bool,
    pub participating: bool,
    pub repo_filter: Vec<String>,

    pub include_review_requested: bool,
    pub include_authored: bool,
    pub include_assigned_issues: bool,

    pub orphan_repos: Vec<String>,
    pub orphan: OrphanOptions,

    pub enrich: EnrichOptions,
    pub weights: ScoreWeights,

    pub category_filter: Option<Category>,
    pub reason_filter: Option<Reason>,
    pub subject_type_filter: Option<SubjectType>,
    pub include_closed: bool,
    pub include_merged: bool,
    pub limit: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            user: String::new(),
            since: None,
            all: false,
            participating: false,
            repo_filter: Vec::new(),
            include_review_requested: true,
            include_authored: true,
            include_assigned_issues: false,
            orphan_repos: Vec::new(),
            orphan: OrphanOptions::default(),
            enrich: EnrichOptions::default(),
            weights: ScoreWeights::default(),
            category_filter: None,
            reason_filter: None,
            subject_type_filter: None,
            include_closed: false,
            include_merged: false,
            limit: None,
        }
    }
}

/// Ties `Cache` and `GitHubClient` together into one runnable pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    cache: Cache,
    gateway: GitHubClient,
}

impl Pipeline {
    pub fn new(cache: Cache, gateway: GitHubClient) -> Self {
        Self { cache, gateway }
    }

    pub async fn run(
        &self,
        opts: &PipelineOptions,
        on_progress: &(dyn Fn(ProgressEvent) + Sync),
    ) -> TriageResult<Vec<Scored>> {
        on_progress(ProgressEvent::PhaseStarted { phase: "list" });
        let mut items = self.list_notifications(opts).await?;
        on_progress(ProgressEvent::PhaseCompleted { phase: "list", item_count: items.len() });

        on_progress(ProgressEvent::PhaseStarted { phase: "enrich" });
        enricher::enrich(&self.cache, &self.gateway, &mut items, &opts.enrich, on_progress).await?;
        on_progress(ProgressEvent::PhaseCompleted { phase: "enrich", item_count: items.len() });

        if opts.include_review_requested || opts.include_authored || opts.include_assigned_issues {
            on_progress(ProgressEvent::PhaseStarted { phase: "merge" });
            source_merger::merge_sources(&mut items, &self.cache, &self.gateway, &opts.user, on_progress).await?;
            on_progress(ProgressEvent::PhaseCompleted { phase: "merge", item_count: items.len() });
        }

        if !opts.orphan_repos.is_empty() {
            on_progress(ProgressEvent::PhaseStarted { phase: "orphan" });
            orphan::analyze(
                &mut items,
                &self.cache,
                &self.gateway,
                &opts.user,
                &opts.orphan_repos,
                &opts.orphan,
                on_progress,
            )
            .await?;
            on_progress(ProgressEvent::PhaseCompleted { phase: "orphan", item_count: items.len() });
        }

        // A second enrichment pass fills in PR size fields for
        // SourceMerger's and OrphanAnalyzer's synthetic items (neither
        // populates `details` itself) and any REST-only detail gaps; items
        // already enriched are skipped (spec.md §4.5).
        on_progress(ProgressEvent::PhaseStarted { phase: "enrich-extras" });
        enricher::enrich(&self.cache, &self.gateway, &mut items, &opts.enrich, on_progress).await?;
        on_progress(ProgressEvent::PhaseCompleted { phase: "enrich-extras", item_count: items.len() });

        on_progress(ProgressEvent::PhaseStarted { phase: "score" });
        let mut scored: Vec<Scored> = items.iter().map(|item| scoring::score(item, &opts.user, &opts.weights)).collect();
        scored.retain(|s| passes_filters(s, opts));
        scored.sort_by(scoring::compare);
        if let Some(limit) = opts.limit {
            scored.truncate(limit);
        }
        on_progress(ProgressEvent::PhaseCompleted { phase: "score", item_count: scored.len() });

        Ok(scored)
    }

    async fn list_notifications(&self, opts: &PipelineOptions) -> TriageResult<Vec<Item>> {
        let cache_opts = ListCacheOpts {
            since_time: opts.since,
            repos: Vec::new(),
        };

        let mut items = if let Some(cached) = self
            .cache
            .get_list::<Item>(ListFamily::Notifications, &opts.user, &cache_opts)
            .await
        {
            cached.items
        } else {
            let list_opts = ListNotificationsOpts {
                since: opts.since,
                all: opts.all,
                participating: opts.participating,
            };
            let fetched = self.gateway.list_notifications(&list_opts).await?;

            let entry = ListCacheEntry {
                items: fetched.clone(),
                cached_at: Utc::now(),
                last_fetch_time: Utc::now(),
                since_time: opts.since,
                repos: Vec::new(),
                version: entries::CURRENT_VERSION,
            };
            self.cache.set_list(ListFamily::Notifications, &opts.user, &entry).await;
            fetched
        };

        if !opts.repo_filter.is_empty() {
            items.retain(|item| opts.repo_filter.iter().any(|r| r == &item.repository.full_name));
        }

        Ok(items)
    }
}

fn passes_filters(scored: &Scored, opts: &PipelineOptions) -> bool {
    if let Some(category) = opts.category_filter {
        if scored.category != category {
            return false;
        }
    }
    if let Some(reason) = &opts.reason_filter {
        if &scored.item.reason != reason {
            return false;
        }
    }
    if let Some(subject_type) = opts.subject_type_filter {
        if scored.item.subject.subject_type != subject_type {
            return false;
        }
    }
    if let Some(details) = &scored.item.details {
        use crate::model::ItemState;
        match details.state {
            ItemState::Closed if !opts.include_closed => return false,
            ItemState::Merged if !opts.include_merged => return false,
            _ => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemDetails, ItemState, Repository, Subject};

    fn scored_item(reason: Reason, state: ItemState) -> Scored {
        let mut details = ItemDetails::empty(1, false);
        details.state = state;
        let item = Item {
            id: "1".into(),
            reason,
            unread: true,
            updated_at: Utc::now(),
            repository: Repository {
                full_name: "o/r".into(),
                html_url: String::new(),
                private: false,
            },
            subject: Subject {
                title: "t".into(),
                api_url: "https://api.github.com/repos/o/r/issues/1".into(),
                subject_type: SubjectType::Issue,
            },
            details: Some(details),
        };
        scoring::score(&item, "me", &ScoreWeights::default())
    }

    #[test]
    fn closed_items_excluded_by_default() {
        let scored = scored_item(Reason::Mention, ItemState::Closed);
        let opts = PipelineOptions::default();
        assert!(!passes_filters(&scored, &opts));
    }

    #[test]
    fn closed_items_included_when_requested() {
        let scored = scored_item(Reason::Mention, ItemState::Closed);
        let mut opts = PipelineOptions::default();
        opts.include_closed = true;
        assert!(passes_filters(&scored, &opts));
    }

    #[test]
    fn reason_filter_excludes_non_matching() {
        let scored = scored_item(Reason::Mention, ItemState::Open);
        let mut opts = PipelineOptions::default();
        opts.reason_filter = Some(Reason::Assign);
        assert!(!passes_filters(&scored, &opts));
    }
}
