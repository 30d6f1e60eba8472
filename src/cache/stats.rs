//! Statistics over the cache store
//!
//! This module provides the summary operators see from the `stats` command.

use crate::cache::ContentState;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Cache statistics summary
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cached URLs
    pub entries: u64,

    /// Sum of cached HTML sizes in bytes
    pub total_bytes: u64,

    /// Oldest write across all entries
    pub oldest_write: Option<DateTime<Utc>>,

    /// Most recent write across all entries
    pub newest_write: Option<DateTime<Utc>>,

    /// Count of entries by content state
    pub entries_by_state: HashMap<ContentState, u64>,
}

impl CacheStats {
    /// Average entry size in bytes
    pub fn average_bytes(&self) -> u64 {
        if self.entries == 0 {
            0
        } else {
            self.total_bytes / self.entries
        }
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_cache_stats(stats: &CacheStats) {
    println!("=== Cache Statistics ===\n");

    println!("Overview:");
    println!("  Cached pages: {}", stats.entries);
    println!("  Total size: {} bytes", stats.total_bytes);
    println!("  Average size: {} bytes", stats.average_bytes());
    println!();

    println!("Entries by State:");
    for state in [ContentState::Optimized, ContentState::Raw] {
        let count = stats.entries_by_state.get(&state).copied().unwrap_or(0);
        let percentage = if stats.entries > 0 {
            (count as f64 / stats.entries as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state.to_db_string(), count, percentage);
    }
    println!();

    match (stats.oldest_write, stats.newest_write) {
        (Some(oldest), Some(newest)) => {
            println!("Oldest write: {}", oldest.to_rfc3339());
            println!("Newest write: {}", newest.to_rfc3339());
        }
        _ => println!("Cache is empty"),
    }
}
