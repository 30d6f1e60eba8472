//! Database schema definitions for the cache store

/// SQL schema for the cache database
pub const SCHEMA_SQL: &str = r#"
-- One row per cached URL; rows are replaced whole on every write
CREATE TABLE IF NOT EXISTS cache_entries (
    url TEXT PRIMARY KEY,
    html TEXT NOT NULL,
    state TEXT NOT NULL,
    digest TEXT NOT NULL,
    bytes INTEGER NOT NULL,
    last_written_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_written ON cache_entries(last_written_at);
CREATE INDEX IF NOT EXISTS idx_cache_entries_state ON cache_entries(state);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
