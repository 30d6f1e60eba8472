//! Wall-clock budget for one render request

use crate::config::RenderConfig;
use chrono::{DateTime, Utc};

/// Computes how much of the total generation budget is left
///
/// The tracker holds no per-request state; callers pass the request's start
/// time at every decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineTracker {
    total_timeout_ms: u64,
}

impl DeadlineTracker {
    pub fn new(total_timeout_ms: u64) -> Self {
        Self { total_timeout_ms }
    }

    /// Uses the configured budget, or the constrained default
    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.effective_total_timeout_ms())
    }

    pub fn total_timeout_ms(&self) -> u64 {
        self.total_timeout_ms
    }

    /// Milliseconds left after reserving `reserved_gap_ms` for later work
    ///
    /// Negative once the budget is spent.
    pub fn remaining(&self, started_at: DateTime<Utc>, reserved_gap_ms: u64) -> i64 {
        self.remaining_at(started_at, reserved_gap_ms, Utc::now())
    }

    /// Same as [`remaining`](Self::remaining) with an explicit clock reading
    pub fn remaining_at(
        &self,
        started_at: DateTime<Utc>,
        reserved_gap_ms: u64,
        now: DateTime<Utc>,
    ) -> i64 {
        let elapsed = (now - started_at).num_milliseconds();
        to_i64(self.total_timeout_ms)
            .saturating_sub(to_i64(reserved_gap_ms))
            .saturating_sub(elapsed)
    }
}

fn to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}
