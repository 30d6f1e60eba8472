//! In-memory cache store
//!
//! Entries live in a `HashMap` behind an `RwLock`; a write swaps the whole
//! entry while holding the write lock, so readers never see a partial entry.

use crate::cache::traits::{CacheError, CacheResult, CacheStore};
use crate::cache::{CacheEntry, ContentState};
use crate::render::RenderResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-local cache store
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached URLs
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, url: &str) -> CacheResult<Option<CacheEntry>> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(url).cloned())
    }

    async fn set(&self, url: &str, html: &str, state: ContentState) -> CacheResult<RenderResult> {
        let entry = CacheEntry::new(url, html, state);
        let result = entry.to_result();

        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.insert(url.to_string(), entry);

        Ok(result)
    }

    async fn remove(&self, url: &str) -> CacheResult<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.remove(url);
        Ok(())
    }
}
