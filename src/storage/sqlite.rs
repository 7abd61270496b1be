//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CrawlStore trait.

use crate::model::CrawlDatum;
use crate::state::CrawlStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CrawlStore, StorageError, StorageResult, StoredDatum};
use crate::storage::{CycleCounts, CycleRecord, CycleStatus, MergeStats};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use std::path::Path;

/// Record columns shared by the frontier and both segment tables
const DATUM_COLUMNS: &str =
    "key, url, status, http_code, location, execute_count, execute_time, metadata";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
    segment_open: bool,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            segment_open: false,
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            segment_open: false,
        })
    }

    fn ensure_segment_open(&self) -> StorageResult<()> {
        if self.segment_open {
            Ok(())
        } else {
            Err(StorageError::SegmentWriterClosed)
        }
    }
}

/// Column values of a record, ready for binding
struct DatumRow {
    key: String,
    url: String,
    status: &'static str,
    http_code: i32,
    location: Option<String>,
    execute_count: u32,
    execute_time: Option<String>,
    metadata: String,
}

impl DatumRow {
    fn from_datum(datum: &CrawlDatum) -> StorageResult<Self> {
        Ok(Self {
            key: datum.key().to_string(),
            url: datum.url().to_string(),
            status: datum.status().to_db_string(),
            http_code: datum.code(),
            location: datum.location().map(str::to_string),
            execute_count: datum.execute_count(),
            execute_time: datum.execute_time().map(|t| t.to_rfc3339()),
            metadata: serde_json::to_string(datum.metadata())?,
        })
    }
}

/// Builds a record from columns laid out as [`DATUM_COLUMNS`], starting at `offset`
fn datum_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<CrawlDatum> {
    let key: String = row.get(offset)?;
    let url: String = row.get(offset + 1)?;
    let status: String = row.get(offset + 2)?;
    let execute_time: Option<String> = row.get(offset + 6)?;
    let metadata: String = row.get(offset + 7)?;

    let mut datum = if key == url {
        CrawlDatum::new(url)
    } else {
        CrawlDatum::with_key(url, key)
    };
    datum.set_status(CrawlStatus::from_db_string(&status).unwrap_or_default());
    datum.set_code(row.get(offset + 3)?);
    datum.set_location(row.get(offset + 4)?);
    datum.set_execute_count(row.get(offset + 5)?);

    if let Some(text) = execute_time {
        let parsed = DateTime::parse_from_rfc3339(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(offset + 6, Type::Text, Box::new(e))
        })?;
        datum.set_execute_time(Some(parsed.with_timezone(&Utc)));
    }

    let metadata: Map<String, Value> = serde_json::from_str(&metadata).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(offset + 7, Type::Text, Box::new(e))
    })?;
    datum.set_metadata(metadata);

    Ok(datum)
}

fn cycle_from_row(row: &Row<'_>) -> rusqlite::Result<CycleRecord> {
    Ok(CycleRecord {
        id: row.get(0)?,
        depth: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: CycleStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(CycleStatus::Failed),
        counts: CycleCounts {
            generated: row.get::<_, i64>(6)? as u64,
            succeeded: row.get::<_, i64>(7)? as u64,
            failed: row.get::<_, i64>(8)? as u64,
        },
    })
}

impl CrawlStore for SqliteStore {
    // ===== Frontier =====

    fn inject(&mut self, datums: &[CrawlDatum], force: bool) -> StorageResult<usize> {
        let sql = if force {
            format!(
                "INSERT INTO crawldb ({DATUM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(key) DO UPDATE SET url = excluded.url, status = excluded.status,
                 http_code = excluded.http_code, location = excluded.location,
                 execute_count = excluded.execute_count, execute_time = excluded.execute_time,
                 metadata = excluded.metadata"
            )
        } else {
            format!(
                "INSERT OR IGNORE INTO crawldb ({DATUM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            )
        };

        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for datum in datums {
                let row = DatumRow::from_datum(datum)?;
                written += stmt.execute(params![
                    row.key,
                    row.url,
                    row.status,
                    row.http_code,
                    row.location,
                    row.execute_count,
                    row.execute_time,
                    row.metadata
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn get(&self, key: &str) -> StorageResult<Option<CrawlDatum>> {
        let datum = self
            .conn
            .query_row(
                &format!("SELECT {DATUM_COLUMNS} FROM crawldb WHERE key = ?1"),
                params![key],
                |row| datum_from_row(row, 0),
            )
            .optional()?;
        Ok(datum)
    }

    fn scan_pending(&self, after_id: i64, limit: usize) -> StorageResult<Vec<StoredDatum>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, {DATUM_COLUMNS} FROM crawldb
             WHERE id > ?1 AND status IN (?2, ?3)
             ORDER BY id LIMIT ?4"
        ))?;

        let records = stmt
            .query_map(
                params![
                    after_id,
                    CrawlStatus::Unexecuted.to_db_string(),
                    CrawlStatus::Failed.to_db_string(),
                    limit as i64
                ],
                |row| {
                    Ok(StoredDatum {
                        id: row.get(0)?,
                        datum: datum_from_row(row, 1)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn list(&self, status: Option<CrawlStatus>) -> StorageResult<Vec<CrawlDatum>> {
        let records = match status {
            Some(status) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {DATUM_COLUMNS} FROM crawldb WHERE status = ?1 ORDER BY id"
                ))?;
                let rows = stmt
                    .query_map(params![status.to_db_string()], |row| datum_from_row(row, 0))?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("SELECT {DATUM_COLUMNS} FROM crawldb ORDER BY id"))?;
                let rows = stmt
                    .query_map([], |row| datum_from_row(row, 0))?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(records)
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.conn.execute_batch(
            "
            DELETE FROM crawldb;
            DELETE FROM fetch_segment;
            DELETE FROM parse_segment;
            DELETE FROM cycles;
        ",
        )?;
        self.segment_open = false;
        Ok(())
    }

    // ===== Segments =====

    fn init_segment_writer(&mut self) -> StorageResult<()> {
        self.segment_open = true;
        Ok(())
    }

    fn write_fetch_segment(&mut self, datum: &CrawlDatum) -> StorageResult<()> {
        self.ensure_segment_open()?;
        let row = DatumRow::from_datum(datum)?;
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO fetch_segment ({DATUM_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                row.key,
                row.url,
                row.status,
                row.http_code,
                row.location,
                row.execute_count,
                row.execute_time,
                row.metadata
            ],
        )?;
        Ok(())
    }

    fn write_parse_segment(&mut self, datums: &[CrawlDatum]) -> StorageResult<()> {
        self.ensure_segment_open()?;
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO parse_segment ({DATUM_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ))?;
            for datum in datums {
                let row = DatumRow::from_datum(datum)?;
                stmt.execute(params![
                    row.key,
                    row.url,
                    row.status,
                    row.http_code,
                    row.location,
                    row.execute_count,
                    row.execute_time,
                    row.metadata
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn close_segment_writer(&mut self) -> StorageResult<()> {
        self.segment_open = false;
        Ok(())
    }

    fn merge(&mut self) -> StorageResult<MergeStats> {
        let tx = self.conn.transaction()?;

        // Outcomes replace the frontier view; the row id is kept so the
        // generator cursor order is stable across cycles.
        let updated = tx.execute(
            &format!(
                "INSERT INTO crawldb ({DATUM_COLUMNS})
                 SELECT {DATUM_COLUMNS} FROM fetch_segment WHERE true
                 ON CONFLICT(key) DO UPDATE SET url = excluded.url, status = excluded.status,
                 http_code = excluded.http_code, location = excluded.location,
                 execute_count = excluded.execute_count, execute_time = excluded.execute_time,
                 metadata = excluded.metadata"
            ),
            [],
        )?;

        let discovered = tx.execute(
            &format!(
                "INSERT OR IGNORE INTO crawldb ({DATUM_COLUMNS})
                 SELECT {DATUM_COLUMNS} FROM parse_segment ORDER BY id"
            ),
            [],
        )?;

        tx.execute_batch(
            "
            DELETE FROM fetch_segment;
            DELETE FROM parse_segment;
        ",
        )?;
        tx.commit()?;

        Ok(MergeStats {
            updated,
            discovered,
        })
    }

    // ===== Cycles =====

    fn create_cycle(&mut self, depth: u32, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO cycles (depth, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![depth, now, config_hash, CycleStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_cycle(
        &mut self,
        cycle_id: i64,
        status: CycleStatus,
        counts: &CycleCounts,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE cycles SET status = ?1, finished_at = ?2, generated = ?3, succeeded = ?4,
             failed = ?5 WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                counts.generated as i64,
                counts.succeeded as i64,
                counts.failed as i64,
                cycle_id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::CycleNotFound(cycle_id));
        }
        Ok(())
    }

    fn get_latest_cycle(&self) -> StorageResult<Option<CycleRecord>> {
        let cycle = self
            .conn
            .query_row(
                "SELECT id, depth, started_at, finished_at, config_hash, status, generated,
                 succeeded, failed FROM cycles ORDER BY id DESC LIMIT 1",
                [],
                cycle_from_row,
            )
            .optional()?;
        Ok(cycle)
    }

    // ===== Statistics =====

    fn count_by_status(&self, status: CrawlStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawldb WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM crawldb", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_cycles(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cycles", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::new_in_memory().unwrap()
    }

    fn fetched(url: &str, status: CrawlStatus) -> CrawlDatum {
        let mut datum = CrawlDatum::new(url);
        datum.set_status(status);
        datum.set_code(200);
        datum.incr_execute_count(1);
        datum.set_execute_time(Some(Utc::now()));
        datum
    }

    #[test]
    fn test_inject_and_get() {
        let mut store = store();
        let seed = CrawlDatum::new("https://example.com/").meta("depth", 1);
        assert_eq!(store.inject(&[seed.clone()], false).unwrap(), 1);

        let loaded = store.get("https://example.com/").unwrap().unwrap();
        assert_eq!(loaded.url(), "https://example.com/");
        assert_eq!(loaded.status(), CrawlStatus::Unexecuted);
        assert_eq!(loaded.meta_as_i64("depth"), Some(1));
        assert!(store.get("https://missing.com/").unwrap().is_none());
    }

    #[test]
    fn test_inject_without_force_keeps_existing() {
        let mut store = store();
        store
            .inject(&[CrawlDatum::new("https://a.com/").meta("v", 1)], false)
            .unwrap();
        let written = store
            .inject(&[CrawlDatum::new("https://a.com/").meta("v", 2)], false)
            .unwrap();

        assert_eq!(written, 0);
        let loaded = store.get("https://a.com/").unwrap().unwrap();
        assert_eq!(loaded.meta_as_i64("v"), Some(1));
    }

    #[test]
    fn test_inject_with_force_overwrites() {
        let mut store = store();
        store.inject(&[fetched("https://a.com/", CrawlStatus::Success)], false).unwrap();
        store.inject(&[CrawlDatum::new("https://a.com/")], true).unwrap();

        let loaded = store.get("https://a.com/").unwrap().unwrap();
        assert_eq!(loaded.status(), CrawlStatus::Unexecuted);
        assert_eq!(store.count_total().unwrap(), 1);
    }

    #[test]
    fn test_explicit_key_roundtrip() {
        let mut store = store();
        let datum = CrawlDatum::with_key("https://a.com/", "v2|https://a.com/");
        store.inject(&[datum], false).unwrap();

        let loaded = store.get("v2|https://a.com/").unwrap().unwrap();
        assert_eq!(loaded.raw_key(), Some("v2|https://a.com/"));
        assert_eq!(loaded.url(), "https://a.com/");
    }

    #[test]
    fn test_scan_pending_skips_success_and_pages_by_id() {
        let mut store = store();
        store
            .inject(
                &[
                    CrawlDatum::new("https://a.com/"),
                    fetched("https://b.com/", CrawlStatus::Success),
                    fetched("https://c.com/", CrawlStatus::Failed),
                    CrawlDatum::new("https://d.com/"),
                ],
                false,
            )
            .unwrap();

        let first = store.scan_pending(0, 2).unwrap();
        let urls: Vec<&str> = first.iter().map(|s| s.datum.url()).collect();
        assert_eq!(urls, vec!["https://a.com/", "https://c.com/"]);

        let rest = store.scan_pending(first[1].id, 10).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].datum.url(), "https://d.com/");
    }

    #[test]
    fn test_segment_writes_require_open_writer() {
        let mut store = store();
        let err = store
            .write_fetch_segment(&CrawlDatum::new("https://a.com/"))
            .unwrap_err();
        assert!(matches!(err, StorageError::SegmentWriterClosed));

        store.init_segment_writer().unwrap();
        store.write_fetch_segment(&CrawlDatum::new("https://a.com/")).unwrap();
        store.close_segment_writer().unwrap();

        assert!(store.write_parse_segment(&[CrawlDatum::new("https://b.com/")]).is_err());
    }

    #[test]
    fn test_merge_fetch_overwrites_and_parse_inserts_only_new() {
        let mut store = store();
        store
            .inject(&[CrawlDatum::new("https://a.com/"), CrawlDatum::new("https://b.com/")], false)
            .unwrap();

        store.init_segment_writer().unwrap();
        store
            .write_fetch_segment(&fetched("https://a.com/", CrawlStatus::Success))
            .unwrap();
        store
            .write_parse_segment(&[
                CrawlDatum::new("https://b.com/").meta("from", "a"),
                CrawlDatum::new("https://c.com/"),
                CrawlDatum::new("https://c.com/").meta("dup", true),
            ])
            .unwrap();
        store.close_segment_writer().unwrap();

        let stats = store.merge().unwrap();
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.discovered, 1);

        assert_eq!(store.count_total().unwrap(), 3);
        assert_eq!(store.count_by_status(CrawlStatus::Success).unwrap(), 1);

        // Existing key untouched by the parse segment
        let b = store.get("https://b.com/").unwrap().unwrap();
        assert!(b.get_meta("from").is_none());

        // First write within the parse segment wins
        let c = store.get("https://c.com/").unwrap().unwrap();
        assert!(c.get_meta("dup").is_none());

        let a = store.get("https://a.com/").unwrap().unwrap();
        assert_eq!(a.execute_count(), 1);
        assert!(a.execute_time().is_some());

        // Segments are empty after merge
        assert_eq!(store.merge().unwrap(), MergeStats::default());
    }

    #[test]
    fn test_merge_keeps_cursor_order() {
        let mut store = store();
        store
            .inject(&[CrawlDatum::new("https://a.com/"), CrawlDatum::new("https://b.com/")], false)
            .unwrap();

        store.init_segment_writer().unwrap();
        store
            .write_fetch_segment(&fetched("https://a.com/", CrawlStatus::Failed))
            .unwrap();
        store.merge().unwrap();

        let pending = store.scan_pending(0, 10).unwrap();
        let urls: Vec<&str> = pending.iter().map(|s| s.datum.url()).collect();
        assert_eq!(urls, vec!["https://a.com/", "https://b.com/"]);
    }

    #[test]
    fn test_cycle_lifecycle() {
        let mut store = store();
        assert!(store.get_latest_cycle().unwrap().is_none());

        let id = store.create_cycle(1, "abc").unwrap();
        let running = store.get_latest_cycle().unwrap().unwrap();
        assert_eq!(running.status, CycleStatus::Running);

        let counts = CycleCounts {
            generated: 3,
            succeeded: 2,
            failed: 1,
        };
        store.finish_cycle(id, CycleStatus::Completed, &counts).unwrap();

        let done = store.get_latest_cycle().unwrap().unwrap();
        assert_eq!(done.status, CycleStatus::Completed);
        assert_eq!(done.counts, counts);
        assert!(done.finished_at.is_some());
        assert_eq!(store.count_cycles().unwrap(), 1);

        assert!(matches!(
            store.finish_cycle(99, CycleStatus::Failed, &counts),
            Err(StorageError::CycleNotFound(99))
        ));
    }

    #[test]
    fn test_clear() {
        let mut store = store();
        store.inject(&[CrawlDatum::new("https://a.com/")], false).unwrap();
        store.create_cycle(1, "h").unwrap();
        store.clear().unwrap();
        assert_eq!(store.count_total().unwrap(), 0);
        assert_eq!(store.count_cycles().unwrap(), 0);
    }

    #[test]
    fn test_list_by_status() {
        let mut store = store();
        store
            .inject(
                &[
                    CrawlDatum::new("https://a.com/"),
                    fetched("https://b.com/", CrawlStatus::Success),
                ],
                false,
            )
            .unwrap();
        assert_eq!(store.list(None).unwrap().len(), 2);
        let success = store.list(Some(CrawlStatus::Success)).unwrap();
        assert_eq!(success.len(), 1);
        assert_eq!(success[0].url(), "https://b.com/");
    }
}
