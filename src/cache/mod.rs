//! Cache module for persisting rendered HTML
//!
//! This module holds the cache store contract the orchestrator consumes and
//! the stores that implement it:
//! - SQLite-backed durable store
//! - In-memory store for tests and ephemeral hosts
//! - Cache statistics for operators

mod memory;
mod schema;
mod sqlite;
mod stats;
mod traits;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;
pub use stats::{print_cache_stats, CacheStats};
pub use traits::{CacheError, CacheResult, CacheStore};

use crate::render::RenderResult;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Whether cached HTML has been through the optimizer
///
/// The tag travels with the bytes so the store never has to guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentState {
    /// Stored exactly as acquired (optimization disabled)
    Raw,
    /// Produced by the optimizer pool
    Optimized,
}

impl ContentState {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Optimized => "optimized",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(Self::Raw),
            "optimized" => Some(Self::Optimized),
            _ => None,
        }
    }
}

/// One cached page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub url: String,
    pub html: String,
    pub state: ContentState,
    pub last_written_at: DateTime<Utc>,
    /// Hex SHA-256 of `html`, written together with it
    pub digest: String,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time
    pub fn new(url: &str, html: &str, state: ContentState) -> Self {
        Self {
            url: url.to_string(),
            html: html.to_string(),
            state,
            last_written_at: Utc::now(),
            digest: content_digest(html),
        }
    }

    /// Returns true if the stored digest still matches the html
    pub fn is_intact(&self) -> bool {
        content_digest(&self.html) == self.digest
    }

    /// Converts the entry into the result served to callers
    pub fn to_result(&self) -> RenderResult {
        RenderResult::ok(self.html.clone())
    }
}

/// Computes the digest stored alongside cached HTML
pub fn content_digest(html: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(html.as_bytes());
    hex::encode(hasher.finalize())
}
