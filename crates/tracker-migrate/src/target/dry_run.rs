//! Destination that accepts every record and persists nothing.
//!
//! Used by `run --dry-run`: the source is read and transformed in full, but
//! nothing reaches the destination. Lookups always miss, so entities that
//! depend on previously migrated rows (peers, comments, threads, posts)
//! report those rows as skipped. Row counts do reflect what was discarded,
//! so a dry run of torrents followed by peers gets past the peers check.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::traits::DestinationWriter;
use crate::core::value::{Record, Row, SqlValue};
use crate::error::Result;

/// No-op destination writer.
pub struct DryRunTarget {
    warned: AtomicBool,
    next_id: AtomicU64,
    discarded: AtomicU64,
    per_table: Mutex<HashMap<&'static str, i64>>,
}

impl DryRunTarget {
    pub fn new() -> Self {
        Self {
            warned: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            discarded: AtomicU64::new(0),
            per_table: Mutex::new(HashMap::new()),
        }
    }

    /// Records accepted and dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    fn warn_once(&self) {
        if !self.warned.swap(true, Ordering::SeqCst) {
            warn!("Dry run: records are transformed but not written to the destination");
        }
    }
}

impl Default for DryRunTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DestinationWriter for DryRunTarget {
    async fn write(&self, record: &Record) -> Result<u64> {
        self.warn_once();
        self.discarded.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut per_table) = self.per_table.lock() {
            *per_table.entry(record.table).or_insert(0) += 1;
        }
        debug!("Dry run: discarded {} record", record.table);
        Ok(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn find_id(&self, _table: &str, _column: &str, _value: &SqlValue) -> Result<Option<i64>> {
        Ok(None)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        Ok(self
            .per_table
            .lock()
            .map(|per_table| per_table.get(table).copied().unwrap_or(0))
            .unwrap_or(0))
    }

    async fn lookup(&self, _table: &str, _columns: &[&str]) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "dry-run"
    }

    async fn close(&self) {}
}
