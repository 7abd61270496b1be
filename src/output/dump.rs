//! Plain-text listing of frontier records

use crate::state::CrawlStatus;
use crate::storage::{CrawlStore, StorageResult};
use std::io::{self, Write};

/// Writes one `describe()` line per record, optionally filtered by status
///
/// # Returns
///
/// The number of records written
pub fn write_records<W: Write>(
    store: &dyn CrawlStore,
    status: Option<CrawlStatus>,
    out: &mut W,
) -> StorageResult<usize> {
    let records = store.list(status)?;
    for datum in &records {
        writeln!(out, "{}", datum.describe())?;
    }
    Ok(records.len())
}

/// Prints records to stdout
pub fn print_records(store: &dyn CrawlStore, status: Option<CrawlStatus>) -> StorageResult<usize> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_records(store, status, &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CrawlDatum;
    use crate::storage::MemoryStore;

    #[test]
    fn test_write_records_filters_by_status() {
        let mut store = MemoryStore::new();
        let mut done = CrawlDatum::new("https://e.com/done");
        done.set_status(CrawlStatus::Success);
        store
            .inject(&[done, CrawlDatum::new("https://e.com/todo")], false)
            .unwrap();

        let mut out = Vec::new();
        let written = write_records(&store, Some(CrawlStatus::Success), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(written, 1);
        assert!(text.contains("https://e.com/done"));
        assert!(!text.contains("https://e.com/todo"));

        let mut out = Vec::new();
        assert_eq!(write_records(&store, None, &mut out).unwrap(), 2);
    }
}
