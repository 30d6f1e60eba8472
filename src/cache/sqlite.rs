//! SQLite cache store implementation
//!
//! This module provides a SQLite-based implementation of the CacheStore trait.
//! Each write is a single upsert statement, so a row is always replaced whole.

use crate::cache::schema::initialize_schema;
use crate::cache::stats::CacheStats;
use crate::cache::traits::{CacheError, CacheResult, CacheStore};
use crate::cache::{CacheEntry, ContentState};
use crate::render::RenderResult;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite cache backend
///
/// The connection sits behind a mutex and every statement runs on the
/// blocking thread pool, so async callers are never stalled on disk I/O.
#[derive(Clone)]
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    /// Opens (or creates) the cache database at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCacheStore)` - Successfully opened/created database
    /// * `Err(CacheError)` - Failed to open database
    pub fn new(path: &Path) -> CacheResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> CacheResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> CacheResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| CacheError::Poisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?
    }

    /// Counts entries, bytes and write times across the whole cache
    pub async fn stats(&self) -> CacheResult<CacheStats> {
        self.with_conn(|conn| {
            let (entries, total_bytes, oldest, newest): (
                i64,
                i64,
                Option<String>,
                Option<String>,
            ) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(bytes), 0), MIN(last_written_at), MAX(last_written_at)
                 FROM cache_entries",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

            let mut entries_by_state = HashMap::new();
            let mut stmt =
                conn.prepare("SELECT state, COUNT(*) FROM cache_entries GROUP BY state")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (state, count) = row?;
                if let Some(state) = ContentState::from_db_string(&state) {
                    entries_by_state.insert(state, count as u64);
                }
            }

            Ok(CacheStats {
                entries: entries as u64,
                total_bytes: total_bytes as u64,
                oldest_write: oldest.as_deref().and_then(parse_timestamp),
                newest_write: newest.as_deref().and_then(parse_timestamp),
                entries_by_state,
            })
        })
        .await
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, url: &str) -> CacheResult<Option<CacheEntry>> {
        let url = url.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT url, html, state, digest, last_written_at
                     FROM cache_entries WHERE url = ?1",
                    params![url],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    },
                )
                .optional()?;

            let Some((url, html, state, digest, written)) = row else {
                return Ok(None);
            };

            let state = ContentState::from_db_string(&state).ok_or_else(|| {
                CacheError::Corrupt {
                    url: url.clone(),
                    reason: format!("unknown content state '{}'", state),
                }
            })?;
            let last_written_at = parse_timestamp(&written).ok_or_else(|| CacheError::Corrupt {
                url: url.clone(),
                reason: format!("invalid timestamp '{}'", written),
            })?;

            let entry = CacheEntry {
                url,
                html,
                state,
                last_written_at,
                digest,
            };
            if !entry.is_intact() {
                return Err(CacheError::Corrupt {
                    url: entry.url,
                    reason: "content digest mismatch".to_string(),
                });
            }

            Ok(Some(entry))
        })
        .await
    }

    async fn set(&self, url: &str, html: &str, state: ContentState) -> CacheResult<RenderResult> {
        let entry = CacheEntry::new(url, html, state);
        let result = entry.to_result();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO cache_entries (url, html, state, digest, bytes, last_written_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(url) DO UPDATE SET
                    html = excluded.html,
                    state = excluded.state,
                    digest = excluded.digest,
                    bytes = excluded.bytes,
                    last_written_at = excluded.last_written_at",
                params![
                    entry.url,
                    entry.html,
                    entry.state.to_db_string(),
                    entry.digest,
                    entry.html.len() as i64,
                    entry.last_written_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(result)
    }

    async fn remove(&self, url: &str) -> CacheResult<()> {
        let url = url.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM cache_entries WHERE url = ?1", params![url])?;
            Ok(())
        })
        .await
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
