/// Stage definitions for a single orchestration call
///
/// This module defines every stage a render request passes through and which
/// transitions between them are legal.
use std::fmt;

/// Represents the current stage of one render request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStage {
    // ===== Main Path =====
    /// Request received, nothing attempted yet
    Start,

    /// Budget checked against the reserved tail allowance
    BudgetCheck,

    /// External crawl or browser render in flight
    Acquiring,

    /// Remaining budget recorded after acquisition (telemetry only)
    BudgetReport,

    /// Status inspected against the cacheable set
    Classifying,

    /// HTML submitted to the optimizer pool
    Optimizing,

    /// Optimized HTML written to the cache store
    CacheWrite,

    // ===== Terminal States =====
    /// Fresh content produced and cached
    Done,

    /// Budget exhausted or renderer unavailable; stale content (or nothing) served
    ServeStale,

    /// Uncacheable status; cache entry evicted, raw or not-found body returned
    NotFoundOrRaw,

    /// Fatal render error or optimization failure
    Aborted,
}

impl RenderStage {
    /// Returns true if no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::ServeStale | Self::NotFoundOrRaw | Self::Aborted
        )
    }

    /// Returns true if moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: RenderStage) -> bool {
        use RenderStage::*;

        matches!(
            (self, next),
            (Start, BudgetCheck)
                | (BudgetCheck, Acquiring)
                | (BudgetCheck, ServeStale)
                | (Acquiring, BudgetReport)
                | (Acquiring, ServeStale)
                | (Acquiring, Aborted)
                | (BudgetReport, Classifying)
                | (Classifying, Optimizing)
                | (Classifying, CacheWrite)
                | (Classifying, NotFoundOrRaw)
                | (Optimizing, CacheWrite)
                | (Optimizing, Aborted)
                | (CacheWrite, Done)
        )
    }

    /// Short label used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::BudgetCheck => "budget_check",
            Self::Acquiring => "acquiring",
            Self::BudgetReport => "budget_report",
            Self::Classifying => "classifying",
            Self::Optimizing => "optimizing",
            Self::CacheWrite => "cache_write",
            Self::Done => "done",
            Self::ServeStale => "serve_stale",
            Self::NotFoundOrRaw => "not_found_or_raw",
            Self::Aborted => "aborted",
        }
    }

    /// Returns all stages
    pub fn all_stages() -> Vec<Self> {
        vec![
            Self::Start,
            Self::BudgetCheck,
            Self::Acquiring,
            Self::BudgetReport,
            Self::Classifying,
            Self::Optimizing,
            Self::CacheWrite,
            Self::Done,
            Self::ServeStale,
            Self::NotFoundOrRaw,
            Self::Aborted,
        ]
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the stage of one request and logs each transition
#[derive(Debug)]
pub struct StageTracker<'a> {
    url: &'a str,
    current: RenderStage,
}

impl<'a> StageTracker<'a> {
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            current: RenderStage::Start,
        }
    }

    pub fn current(&self) -> RenderStage {
        self.current
    }

    /// Moves to `next`, logging the transition
    ///
    /// Illegal transitions are a programming error; they are logged and
    /// trip a debug assertion.
    pub fn advance(&mut self, next: RenderStage) {
        let legal = self.current.can_transition_to(next);
        if !legal {
            tracing::warn!(
                "Illegal stage transition for {}: {} -> {}",
                self.url,
                self.current,
                next
            );
        }
        debug_assert!(legal, "illegal transition {} -> {}", self.current, next);

        tracing::debug!("{}: {} -> {}", self.url, self.current, next);
        self.current = next;
    }
}
