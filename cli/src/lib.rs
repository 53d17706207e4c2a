//! Wires config → gateway → cache → pipeline → output, and maps `Error` to
//! the exit-code contract (SPEC_FULL.md §7): the CLI's `main` treats any
//! `Err` as fatal, matching the teacher's `main.rs` top-level `Result`
//! propagation out of `#[tokio::main]`.

pub mod args;
pub mod config;
pub mod output;

use args::Args;
use chrono::Utc;
use clap::Parser;
use config::Config;
use triage_core::cache::Cache;
use triage_core::gateway::{GatewayConfig, GitHubClient};
use triage_core::rate_guard::RateGuard;
use triage_core::scoring::Category;
use triage_core::{duration, Error, Pipeline, PipelineOptions, ProgressEvent, Reason, SubjectType, TriageResult};
use tracing_subscriber::EnvFilter;

pub async fn run() -> TriageResult<()> {
    init_tracing();
    let args = Args::parse();
    let config = Config::load().await?;
    let cache = Cache::new(config.cache_dir.clone());

    if args.clear_cache {
        cache.clear().await?;
        tracing::info!("cache cleared at {}", config.cache_dir.display());
    }

    if args.cache_stats {
        let stats = cache.stats().await?;
        println!("{stats:#?}");
        return Ok(());
    }

    let gateway_cfg = GatewayConfig::github_dot_com(config.token.clone());
    let gateway = GitHubClient::new(gateway_cfg, RateGuard::new())?;
    let user = gateway.get_authenticated_user().await?;

    let discovered_repos = if args.discover_repos {
        let repos = gateway.discover_repos().await?;
        tracing::info!("discovered {} writable repo(s)", repos.len());
        Some(repos)
    } else {
        None
    };

    let opts = build_pipeline_options(&args, &config, &user, discovered_repos)?;
    let pipeline = Pipeline::new(cache, gateway);

    let use_color = !args.no_color;
    let scored = pipeline
        .run(&opts, &move |event| report_progress(event, use_color))
        .await?;

    if args.json {
        output::print_json(&scored).map_err(|e| Error::Validation(format!("failed to serialize output: {e}")))?;
    } else {
        output::print_table(&scored, use_color);
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn build_pipeline_options(
    args: &Args,
    config: &Config,
    user: &str,
    discovered_repos: Option<Vec<String>>,
) -> TriageResult<PipelineOptions> {
    let since = match &args.since {
        Some(spec) => Some(Utc::now() - duration::parse_duration_spec(spec)?),
        None => None,
    };

    let repos = if !args.repos.is_empty() {
        args.repos.clone()
    } else if let Some(discovered) = discovered_repos {
        discovered
    } else {
        config.default_repos.clone()
    };

    let mut opts = PipelineOptions {
        user: user.to_string(),
        since,
        all: args.all,
        participating: args.participating,
        repo_filter: repos.clone(),
        orphan_repos: repos,
        weights: config.weights,
        category_filter: args.category.as_deref().map(parse_category).transpose()?,
        reason_filter: args.reason.as_deref().map(parse_reason),
        subject_type_filter: args.subject_type.as_deref().map(parse_subject_type).transpose()?,
        include_closed: args.include_closed || config.default_include_closed,
        include_merged: args.include_merged || config.default_include_merged,
        limit: args.limit.or(config.default_limit),
        ..PipelineOptions::default()
    };

    if let Some(workers) = args.workers {
        opts.enrich.rest_concurrency = workers.max(1);
    }

    Ok(opts)
}

fn parse_category(s: &str) -> TriageResult<Category> {
    match s.to_lowercase().as_str() {
        "urgent" => Ok(Category::Urgent),
        "important" => Ok(Category::Important),
        "low_hanging" | "low-hanging" | "quick_win" | "quick-win" => Ok(Category::LowHanging),
        "fyi" => Ok(Category::Fyi),
        other => Err(Error::Validation(format!("unknown category '{other}'"))),
    }
}

fn parse_reason(s: &str) -> Reason {
    match s.to_lowercase().as_str() {
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

fn parse_subject_type(s: &str) -> TriageResult<SubjectType> {
    match s.to_lowercase().as_str() {
        "issue" => Ok(SubjectType::Issue),
        "pr" | "pull_request" | "pullrequest" => Ok(SubjectType::PullRequest),
        "release" => Ok(SubjectType::Release),
        "discussion" => Ok(SubjectType::Discussion),
        other => Err(Error::Validation(format!("unknown subject type '{other}'"))),
    }
}

fn report_progress(event: ProgressEvent, use_color: bool) {
    match event {
        ProgressEvent::PhaseStarted { phase } => tracing::debug!("phase started: {phase}"),
        ProgressEvent::PhaseCompleted { phase, item_count } => tracing::info!("{phase}: {item_count} item(s)"),
        ProgressEvent::ItemsFetched { source, count } => tracing::info!("{source}: fetched {count} item(s)"),
        ProgressEvent::CacheHit { count } => tracing::debug!("{count} cache hit(s)"),
        ProgressEvent::BatchEnriched { batch_size } => tracing::debug!("enriched batch of {batch_size}"),
        ProgressEvent::ItemEnriched => tracing::trace!("item enriched"),
        ProgressEvent::Warning(msg) => {
            use colored::Colorize;
            let line = format!("warning: {msg}");
            eprintln!("{}", if use_color { line.yellow().to_string() } else { line });
            tracing::warn!("{msg}");
        }
    }
}
