//! HTML optimization pipeline
//!
//! Rendered documents pass through a declarative rule table ([`rules`]) and
//! an optional whitespace compression step ([`minify`]) before they are
//! cached. The work runs on a bounded worker pool ([`OptimizerPool`]) so a
//! burst of renders cannot monopolize the runtime.

mod minify;
mod pool;
mod rules;

pub use minify::compress_whitespace;
pub use pool::OptimizerPool;
pub use rules::{apply_rules, rules_for, Rule, RuleAction, RULES};

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which rule tier to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimizeMode {
    /// Script, style, prefetch and tracking removal only
    Shallow,
    /// Shallow tier plus forms, media, icon glyphs, presentational
    /// attributes and wrapper collapsing
    Full,
}

impl fmt::Display for OptimizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shallow => write!(f, "shallow"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Errors from the optimization pipeline
///
/// Any of these fails the whole job; callers never receive partially
/// rewritten HTML.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("HTML rewrite failed: {0}")]
    Rewrite(String),

    #[error("Optimization job exceeded {0:?}")]
    Timeout(Duration),

    #[error("Optimizer worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Optimizer pool is closed")]
    PoolClosed,
}

/// Transforms rendered HTML before it is cached
#[async_trait]
pub trait ContentOptimizer: Send + Sync {
    /// Runs one document through the given tier
    async fn optimize(&self, html: String, mode: OptimizeMode) -> Result<String, OptimizeError>;
}
