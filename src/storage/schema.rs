//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crawl state database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track fetch cycles
CREATE TABLE IF NOT EXISTS cycles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    depth INTEGER NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    generated INTEGER NOT NULL DEFAULT 0,
    succeeded INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0
);

-- The frontier: one row per dedup key
CREATE TABLE IF NOT EXISTS crawldb (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    http_code INTEGER NOT NULL DEFAULT -1,
    location TEXT,
    execute_count INTEGER NOT NULL DEFAULT 0,
    execute_time TEXT,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_crawldb_status ON crawldb(status);

-- Outcomes of the current cycle, keyed by record key
CREATE TABLE IF NOT EXISTS fetch_segment (
    key TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    http_code INTEGER NOT NULL DEFAULT -1,
    location TEXT,
    execute_count INTEGER NOT NULL DEFAULT 0,
    execute_time TEXT,
    metadata TEXT NOT NULL DEFAULT '{}'
);

-- Candidates discovered during the current cycle
CREATE TABLE IF NOT EXISTS parse_segment (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    http_code INTEGER NOT NULL DEFAULT -1,
    location TEXT,
    execute_count INTEGER NOT NULL DEFAULT 0,
    execute_time TEXT,
    metadata TEXT NOT NULL DEFAULT '{}'
);
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
