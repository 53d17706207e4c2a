//! Command-line flags (spec.md §6 / SPEC_FULL.md §6), parsed with `clap`'s
//! derive API the way the teacher's `api` crate layers config structs.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "gh-triage", about = "Triages GitHub notifications, PRs, and issues into a prioritized worklist.")]
pub struct Args {
    /// How far back to look, e.g. "7d", "2w", "1mo". Defaults to the
    /// notification list's own cursor when omitted.
    #[arg(long)]
    pub since: Option<String>,

    /// Fetch all notifications, not just unread ones.
    #[arg(long)]
    pub all: bool,

    /// Only notifications where the user is participating (not just watching).
    #[arg(long)]
    pub participating: bool,

    /// Restrict to one priority band: urgent, important, quick_win, medium, fyi.
    #[arg(long)]
    pub category: Option<String>,

    /// Restrict to one notification reason, e.g. "review_requested".
    #[arg(long)]
    pub reason: Option<String>,

    /// Restrict to one subject type: issue or pr.
    #[arg(long = "type")]
    pub subject_type: Option<String>,

    #[arg(long)]
    pub include_closed: bool,

    #[arg(long)]
    pub include_merged: bool,

    /// Cap the number of items printed.
    #[arg(long)]
    pub limit: Option<usize>,

    /// REST-fallback enrichment concurrency.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Emit the scored result as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    #[arg(long)]
    pub no_color: bool,

    /// Wipe the on-disk cache before running.
    #[arg(long)]
    pub clear_cache: bool,

    /// Print cache category counts and exit without running the pipeline.
    #[arg(long)]
    pub cache_stats: bool,

    /// Repository in "owner/name" form; repeatable. Scopes orphan analysis
    /// and filters the notification list.
    #[arg(long = "repo")]
    pub repos: Vec<String>,

    /// Opt-in: discover write-accessible, non-archived repos via GraphQL
    /// instead of requiring --repo (SPEC_FULL.md §9 Open Question (d)).
    #[arg(long)]
    pub discover_repos: bool,
}
