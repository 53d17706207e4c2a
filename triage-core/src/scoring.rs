//! Pure scoring function turning an enriched `Item` into a priority
//! ranking (spec.md §4.7). No I/O, no async — the same shape as the
//! teacher's small deterministic pure functions (cf. its unified-diff
//! parser).

use crate::model::{CiStatus, Item, Reason, ReviewState};
use chrono::Utc;
use serde::Serialize;

/// Tunable weights, exposed so the CLI/config layer can override any of
/// them without touching the scoring logic itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub base_review_requested: i32,
    pub base_mention: i32,
    pub base_team_mention: i32,
    pub base_author: i32,
    pub base_assign: i32,
    pub base_comment: i32,
    pub base_state_change: i32,
    pub base_subscribed: i32,
    pub base_ci_activity: i32,
    pub base_default: i32,

    pub open_state_bonus: i32,
    pub closed_or_merged_penalty: i32,
    pub hot_topic_bonus: i32,
    pub hot_topic_threshold: u32,
    pub low_hanging_fruit_bonus: i32,
    pub changes_requested_on_own_pr_bonus: i32,

    pub age_bonus_per_day: i32,
    pub age_bonus_cap: i32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            base_review_requested: 100,
            base_mention: 90,
            base_team_mention: 85,
            base_author: 70,
            base_assign: 60,
            base_comment: 30,
            base_state_change: 25,
            base_subscribed: 10,
            base_ci_activity: 5,
            base_default: 10,

            open_state_bonus: 10,
            closed_or_merged_penalty: -30,
            hot_topic_bonus: 15,
            hot_topic_threshold: 10,
            low_hanging_fruit_bonus: 20,
            changes_requested_on_own_pr_bonus: 20,

            age_bonus_per_day: 2,
            age_bonus_cap: 30,
        }
    }
}

/// `(reason, reviewState, state)` → fixed action suggestion, last one to
/// match wins among overlapping conditions (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBand {
    Urgent,
    Important,
    QuickWin,
    Medium,
    Fyi,
}

impl PriorityBand {
    /// Sort rank: lower sorts first (spec.md §4.7's sort order, with
    /// `QuickWin` placed ahead of the generic `Medium` band it splits from).
    fn sort_rank(self) -> u8 {
        match self {
            PriorityBand::Urgent => 0,
            PriorityBand::Important => 1,
            PriorityBand::QuickWin => 2,
            PriorityBand::Medium => 3,
            PriorityBand::Fyi => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Urgent,
    Important,
    LowHanging,
    Fyi,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scored {
    pub item: Item,
    pub score: i32,
    pub priority: PriorityBand,
    pub category: Category,
    pub action: &'static str,
}

/// Case-insensitive label substrings that mark an item as approachable for
/// a newcomer or quick to review (spec.md §4.7).
const LOW_HANGING_LABELS: &[&str] = &[
    "good first issue",
    "good-first-issue",
    "help wanted",
    "help-wanted",
    "easy",
    "beginner",
    "trivial",
    "documentation",
    "docs",
    "typo",
];

fn is_low_hanging_fruit(item: &Item) -> bool {
    let Some(details) = &item.details else { return false };
    let label_match = details
        .labels
        .iter()
        .any(|label| LOW_HANGING_LABELS.iter().any(|needle| label.to_lowercase().contains(needle)));
    if label_match {
        return true;
    }
    details.is_pr && details.changed_files <= 3 && details.additions + details.deletions <= 50
}

fn base_score(reason: &Reason, weights: &ScoreWeights) -> i32 {
    match reason {
        Reason::ReviewRequested => weights.base_review_requested,
        Reason::Mention => weights.base_mention,
        Reason::TeamMention => weights.base_team_mention,
        Reason::Author => weights.base_author,
        Reason::Assign => weights.base_assign,
        Reason::Comment => weights.base_comment,
        Reason::StateChange => weights.base_state_change,
        Reason::Subscribed => weights.base_subscribed,
        Reason::CiActivity => weights.base_ci_activity,
        Reason::Manual | Reason::Orphaned | Reason::Other(_) => weights.base_default,
    }
}

/// Scores a single enriched item. `current_user` drives the
/// "author is me and my PR needs changes" modifier.
pub fn score(item: &Item, current_user: &str, weights: &ScoreWeights) -> Scored {
    let mut total = base_score(&item.reason, weights);
    let low_hanging = is_low_hanging_fruit(item);

    if let Some(details) = &item.details {
        use crate::model::ItemState;
        match details.state {
            ItemState::Open => total += weights.open_state_bonus,
            ItemState::Closed | ItemState::Merged => total += weights.closed_or_merged_penalty,
        }

        if details.comment_count > weights.hot_topic_threshold {
            total += weights.hot_topic_bonus;
        }

        if low_hanging {
            total += weights.low_hanging_fruit_bonus;
        }

        let is_own_pr_needing_changes = details.author.as_deref() == Some(current_user)
            && details.review_state == Some(ReviewState::ChangesRequested);
        if is_own_pr_needing_changes {
            total += weights.changes_requested_on_own_pr_bonus;
        }

        let age_days = (Utc::now() - details.updated_at).num_days().max(0) as i32;
        total += (age_days * weights.age_bonus_per_day).min(weights.age_bonus_cap);
    }

    let score = total.max(0);
    let priority = priority_band(score, low_hanging);
    let category = category(&item.reason, score, low_hanging);
    let action = action_suggestion(item);

    Scored {
        item: item.clone(),
        score,
        priority,
        category,
        action,
    }
}

fn priority_band(score: i32, low_hanging: bool) -> PriorityBand {
    if score >= 90 {
        PriorityBand::Urgent
    } else if score >= 60 {
        PriorityBand::Important
    } else if score >= 30 {
        if low_hanging {
            PriorityBand::QuickWin
        } else {
            PriorityBand::Medium
        }
    } else {
        PriorityBand::Fyi
    }
}

fn category(reason: &Reason, score: i32, low_hanging: bool) -> Category {
    if matches!(reason, Reason::ReviewRequested | Reason::Mention) {
        return Category::Urgent;
    }
    if low_hanging {
        return Category::LowHanging;
    }
    if score >= 90 {
        Category::Urgent
    } else if score >= 60 {
        Category::Important
    } else {
        Category::Fyi
    }
}

fn action_suggestion(item: &Item) -> &'static str {
    let Some(details) = &item.details else {
        return "Review notification";
    };
    use crate::model::ItemState;

    match &item.reason {
        Reason::ReviewRequested => "Review PR",
        Reason::Author if details.review_state == Some(ReviewState::ChangesRequested) => "Address review feedback",
        Reason::Author if details.review_state == Some(ReviewState::Approved) => "Merge PR",
        Reason::Assign => "Work on assigned item",
        Reason::StateChange if matches!(details.state, ItemState::Closed | ItemState::Merged) => "Acknowledge closure",
        _ if matches!(details.state, ItemState::Closed | ItemState::Merged) => "Check activity on your item",
        _ if details.ci_status == CiStatus::Failure => "Investigate failing checks",
        _ => "Review notification",
    }
}

/// Sort comparator: priority band ascending (Urgent first), then score
/// descending within a band (spec.md §4.7).
pub fn compare(a: &Scored, b: &Scored) -> std::cmp::Ordering {
    a.priority
        .sort_rank()
        .cmp(&b.priority.sort_rank())
        .then_with(|| b.score.cmp(&a.score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemDetails, ItemState, Repository, Subject, SubjectType};

    fn base_item(reason: Reason) -> Item {
        Item {
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
                api_url: "https://api.github.com/repos/o/r/pulls/1".into(),
                subject_type: SubjectType::PullRequest,
            },
            details: None,
        }
    }

    #[test]
    fn review_requested_dominates_over_author() {
        let weights = ScoreWeights::default();
        let review = score(&base_item(Reason::ReviewRequested), "me", &weights);
        let authored = score(&base_item(Reason::Author), "me", &weights);
        assert!(review.score > authored.score);
        assert_eq!(review.priority, PriorityBand::Urgent);
    }

    #[test]
    fn closed_state_penalizes_score() {
        let weights = ScoreWeights::default();
        let mut item = base_item(Reason::Mention);
        let mut details = ItemDetails::empty(1, true);
        details.state = ItemState::Closed;
        details.updated_at = Utc::now();
        item.details = Some(details);

        let mut open_item = base_item(Reason::Mention);
        let mut open_details = ItemDetails::empty(1, true);
        open_details.state = ItemState::Open;
        open_details.updated_at = Utc::now();
        open_item.details = Some(open_details);

        let closed = score(&item, "me", &weights);
        let open = score(&open_item, "me", &weights);
        assert!(closed.score < open.score);
    }

    #[test]
    fn low_hanging_label_forces_category() {
        let weights = ScoreWeights::default();
        let mut item = base_item(Reason::Comment);
        let mut details = ItemDetails::empty(1, false);
        details.labels = vec!["good first issue".to_string()];
        details.updated_at = Utc::now();
        item.details = Some(details);

        let scored = score(&item, "me", &weights);
        assert_eq!(scored.category, Category::LowHanging);
    }

    #[test]
    fn own_pr_with_changes_requested_gets_action_and_bonus() {
        let weights = ScoreWeights::default();
        let mut item = base_item(Reason::Author);
        let mut details = ItemDetails::empty(1, true);
        details.author = Some("me".to_string());
        details.review_state = Some(ReviewState::ChangesRequested);
        details.updated_at = Utc::now();
        item.details = Some(details);

        let scored = score(&item, "me", &weights);
        assert_eq!(scored.action, "Address review feedback");
    }

    #[test]
    fn sort_orders_urgent_before_important_then_by_score() {
        let weights = ScoreWeights::default();
        let mut a = score(&base_item(Reason::ReviewRequested), "me", &weights);
        let mut b = score(&base_item(Reason::Author), "me", &weights);
        a.score = 95;
        b.score = 70;
        let mut scored = vec![b.clone(), a.clone()];
        scored.sort_by(compare);
        assert_eq!(scored[0].score, 95);
    }
}
