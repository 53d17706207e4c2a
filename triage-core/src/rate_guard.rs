//! Process-wide API quota tracker (spec.md §4.1).
//!
//! A single `RwLock`-guarded state, cheaply cloned (`Arc`) into every
//! collaborator that makes outbound calls. No async needed: probing and
//! updating are both non-blocking in-memory operations.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, Default)]
struct RateState {
    remaining: u32,
    limit: u32,
    reset_at: Option<DateTime<Utc>>,
    limited: bool,
}

/// Readers/writer-locked quota tracker, shared across `Enricher`,
/// `SourceMerger`, and `OrphanAnalyzer`.
#[derive(Debug, Clone)]
pub struct RateGuard {
    state: Arc<RwLock<RateState>>,
}

impl Default for RateGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl RateGuard {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RateState::default())),
        }
    }

    /// `true` only when the tracker is marked limited **and** the reset
    /// time hasn't passed yet. Every collaborator must call this before
    /// issuing an outbound call.
    pub fn is_limited(&self) -> bool {
        let state = self.state.read().expect("rate guard lock poisoned");
        match (state.limited, state.reset_at) {
            (true, Some(reset_at)) => Utc::now() < reset_at,
            (true, None) => true,
            (false, _) => false,
        }
    }

    /// Records the rate-limit headers from the most recent response.
    /// `remaining == 0` marks the guard as limited regardless of the
    /// caller-supplied `reset_at`.
    pub fn update(&self, remaining: u32, limit: u32, reset_at: DateTime<Utc>) {
        let mut state = self.state.write().expect("rate guard lock poisoned");
        state.remaining = remaining;
        state.limit = limit;
        state.reset_at = Some(reset_at);
        if remaining == 0 {
            state.limited = true;
        } else {
            state.limited = false;
        }
    }

    pub fn remaining(&self) -> u32 {
        self.state.read().expect("rate guard lock poisoned").remaining
    }

    pub fn limit(&self) -> u32 {
        self.state.read().expect("rate guard lock poisoned").limit
    }

    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().expect("rate guard lock poisoned").reset_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn starts_unlimited() {
        let guard = RateGuard::new();
        assert!(!guard.is_limited());
    }

    #[test]
    fn zero_remaining_marks_limited_until_reset() {
        let guard = RateGuard::new();
        let reset_at = Utc::now() + Duration::minutes(10);
        guard.update(0, 5000, reset_at);
        assert!(guard.is_limited());
    }

    #[test]
    fn limited_clears_once_reset_time_passes() {
        let guard = RateGuard::new();
        let reset_at = Utc::now() - Duration::seconds(1);
        guard.update(0, 5000, reset_at);
        assert!(!guard.is_limited());
    }

    #[test]
    fn nonzero_remaining_clears_limited_flag() {
        let guard = RateGuard::new();
        guard.update(0, 5000, Utc::now() + Duration::minutes(10));
        assert!(guard.is_limited());
        guard.update(100, 5000, Utc::now() + Duration::minutes(10));
        assert!(!guard.is_limited());
    }
}
