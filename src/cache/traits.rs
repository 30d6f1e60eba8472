//! Cache store trait and error types
//!
//! This module defines the contract the orchestrator relies on, independent
//! of the storage medium.

use crate::cache::{CacheEntry, ContentState};
use crate::render::RenderResult;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt cache entry for {url}: {reason}")]
    Corrupt { url: String, reason: String },

    #[error("Cache lock poisoned")]
    Poisoned,

    #[error("Cache task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Durable storage for rendered HTML keyed by URL
///
/// # Concurrency
///
/// Implementations must tolerate interleaved writes to different keys and to
/// the same key. A write replaces the whole entry at once (last writer wins),
/// so a reader observes either the previous entry or the new one.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetches the entry for `url`, if any
    async fn get(&self, url: &str) -> CacheResult<Option<CacheEntry>>;

    /// Writes `html` for `url`, replacing any previous entry
    ///
    /// `state` records whether the html already went through the optimizer;
    /// stores trust the tag and never re-process content.
    ///
    /// # Returns
    ///
    /// The result to hand back to the caller for the freshly written entry
    async fn set(&self, url: &str, html: &str, state: ContentState) -> CacheResult<RenderResult>;

    /// Removes the entry for `url`; removing a missing entry is not an error
    async fn remove(&self, url: &str) -> CacheResult<()>;

    /// Serves whatever is cached for `url`, however old
    ///
    /// This is the degraded-mode path. It must never trigger regeneration.
    async fn achieve(&self, url: &str) -> CacheResult<Option<RenderResult>> {
        Ok(self.get(url).await?.map(|entry| entry.to_result()))
    }
}
