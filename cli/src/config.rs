//! Environment + TOML configuration loading (SPEC_FULL.md §6's "[ADDED]
//! concrete env/config surface"), read the same way the teacher's service
//! crates pull typed env vars with `must_env`-style helpers before falling
//! back to a config file.

use serde::Deserialize;
use std::path::PathBuf;
use triage_core::{ConfigError, Error, ScoreWeights, TriageResult};

/// Optional `TRIAGE_CONFIG` TOML file contents. Every field is optional —
/// omitted fields keep `ScoreWeights::default()`'s value.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    weights: WeightsFile,
    #[serde(default)]
    defaults: DefaultsFile,
}

#[derive(Debug, Default, Deserialize)]
struct WeightsFile {
    base_review_requested: Option<i32>,
    base_mention: Option<i32>,
    base_team_mention: Option<i32>,
    base_author: Option<i32>,
    base_assign: Option<i32>,
    base_comment: Option<i32>,
    base_state_change: Option<i32>,
    base_subscribed: Option<i32>,
    base_ci_activity: Option<i32>,
    base_default: Option<i32>,
    open_state_bonus: Option<i32>,
    closed_or_merged_penalty: Option<i32>,
    hot_topic_bonus: Option<i32>,
    hot_topic_threshold: Option<u32>,
    low_hanging_fruit_bonus: Option<i32>,
    changes_requested_on_own_pr_bonus: Option<i32>,
    age_bonus_per_day: Option<i32>,
    age_bonus_cap: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct DefaultsFile {
    include_closed: Option<bool>,
    include_merged: Option<bool>,
    limit: Option<usize>,
    repos: Option<Vec<String>>,
}

/// Resolved configuration for a single run.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub cache_dir: PathBuf,
    pub weights: ScoreWeights,
    pub default_include_closed: bool,
    pub default_include_merged: bool,
    pub default_limit: Option<usize>,
    pub default_repos: Vec<String>,
}

impl Config {
    /// Loads `GITHUB_TOKEN` (required), `TRIAGE_CACHE_DIR` (optional), and
    /// `TRIAGE_CONFIG` (optional TOML path) from the environment.
    pub async fn load() -> TriageResult<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .map_err(|_| Error::Config(ConfigError::MissingVar("GITHUB_TOKEN")))?;

        let cache_dir = triage_core::cache::default_cache_root("gh-triage");

        let file_config = match std::env::var("TRIAGE_CONFIG") {
            Ok(path) => load_file_config(&path).await?,
            Err(_) => FileConfig::default(),
        };

        Ok(Self {
            token,
            cache_dir,
            weights: apply_weight_overrides(ScoreWeights::default(), &file_config.weights),
            default_include_closed: file_config.defaults.include_closed.unwrap_or(false),
            default_include_merged: file_config.defaults.include_merged.unwrap_or(false),
            default_limit: file_config.defaults.limit,
            default_repos: file_config.defaults.repos.unwrap_or_default(),
        })
    }
}

async fn load_file_config(path: &str) -> TriageResult<FileConfig> {
    let contents = tokio::fs::read_to_string(path).await?;
    toml::from_str(&contents).map_err(|e| Error::Config(ConfigError::InvalidFormat(e.to_string())))
}

fn apply_weight_overrides(mut weights: ScoreWeights, overrides: &WeightsFile) -> ScoreWeights {
    macro_rules! apply {
        ($field:ident) => {
            if let Some(v) = overrides.$field {
                weights.$field = v;
            }
        };
    }
    apply!(base_review_requested);
    apply!(base_mention);
    apply!(base_team_mention);
    apply!(base_author);
    apply!(base_assign);
    apply!(base_comment);
    apply!(base_state_change);
    apply!(base_subscribed);
    apply!(base_ci_activity);
    apply!(base_default);
    apply!(open_state_bonus);
    apply!(closed_or_merged_penalty);
    apply!(hot_topic_bonus);
    apply!(hot_topic_threshold);
    apply!(low_hanging_fruit_bonus);
    apply!(changes_requested_on_own_pr_bonus);
    apply!(age_bonus_per_day);
    apply!(age_bonus_cap);
    weights
}
