//! In-memory source and destination doubles for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::traits::{DestinationWriter, SourceQuery};
use crate::core::value::{Record, Row, SqlValue};
use crate::error::{MigrateError, Result};

struct MemoryTable {
    columns: Arc<[String]>,
    rows: Vec<Vec<SqlValue>>,
}

/// Source that answers page queries from in-memory tables.
///
/// Understands exactly the SQL the chunked reader generates: the table is
/// taken from the first ``FROM `name` `` and the page from the trailing
/// `LIMIT c OFFSET o`. Filters, joins and column lists are ignored, so a
/// query without `LIMIT` returns every row with every column.
///
/// Only paged queries count as fetches; lookup queries made while
/// detecting group and category mappings are recorded in `queries` alone.
#[derive(Default)]
pub struct MemorySource {
    tables: HashMap<String, MemoryTable>,
    queries: Mutex<Vec<String>>,
    fetches: AtomicUsize,
    page_sizes: Mutex<Vec<usize>>,
    fail_on_fetch: Option<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        self.tables
            .insert(name.to_string(), MemoryTable { columns, rows });
        self
    }

    /// Make the n-th page fetch (1-based) fail.
    pub fn failing_on_fetch(mut self, n: usize) -> Self {
        self.fail_on_fetch = Some(n);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Rows returned by each successful page fetch.
    pub fn page_sizes(&self) -> Vec<usize> {
        self.page_sizes.lock().unwrap().clone()
    }

    fn table_name(sql: &str) -> Option<&str> {
        let start = sql.find("FROM `")? + "FROM `".len();
        let len = sql[start..].find('`')?;
        Some(&sql[start..start + len])
    }

    fn page_bounds(sql: &str) -> Option<(usize, usize)> {
        let (_, tail) = sql.rsplit_once(" LIMIT ")?;
        let (limit, offset) = tail.split_once(" OFFSET ")?;
        Some((limit.trim().parse().ok()?, offset.trim().parse().ok()?))
    }
}

#[async_trait]
impl SourceQuery for MemorySource {
    async fn query(&self, sql: &str, _params: &[SqlValue]) -> Result<Vec<Row>> {
        self.queries.lock().unwrap().push(sql.to_string());
        let bounds = Self::page_bounds(sql);
        if bounds.is_some() {
            let attempt = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_fetch == Some(attempt) {
                return Err(MigrateError::data_access("memory source", "connection reset"));
            }
        }

        let name = Self::table_name(sql)
            .ok_or_else(|| MigrateError::InvalidQuery(format!("no table in: {}", sql)))?;
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| MigrateError::TableNotFound(vec![name.to_string()]))?;

        let (limit, offset) = bounds.unwrap_or((table.rows.len(), 0));
        let rows: Vec<Row> = table
            .rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|values| Row::new(Arc::clone(&table.columns), values.clone()))
            .collect();

        if bounds.is_some() {
            self.page_sizes.lock().unwrap().push(rows.len());
        }
        Ok(rows)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.tables.contains_key(table))
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.columns.to_vec())
            .unwrap_or_default())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        self.tables
            .get(table)
            .map(|t| t.rows.len() as i64)
            .ok_or_else(|| MigrateError::TableNotFound(vec![table.to_string()]))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

/// Destination that keeps written records in memory.
pub struct MemoryTarget {
    written: Mutex<Vec<(u64, Record)>>,
    seeded: Mutex<Vec<(String, String, String, i64)>>,
    reference: HashMap<String, MemoryTable>,
    attempts: AtomicUsize,
    next_id: AtomicU64,
    fail_on_write: Option<usize>,
}

impl Default for MemoryTarget {
    fn default() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            seeded: Mutex::new(Vec::new()),
            reference: HashMap::new(),
            attempts: AtomicUsize::new(0),
            next_id: AtomicU64::new(10_000),
            fail_on_write: None,
        }
    }
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the n-th write attempt (1-based) fail with a constraint violation.
    pub fn failing_on_write(mut self, n: usize) -> Self {
        self.fail_on_write = Some(n);
        self
    }

    /// First id handed out for records written without one.
    pub fn with_next_id(self, id: u64) -> Self {
        self.next_id.store(id, Ordering::SeqCst);
        self
    }

    /// Pretend a row already exists in the destination.
    pub fn seed(self, table: &str, column: &str, value: &str, id: i64) -> Self {
        self.seeded.lock().unwrap().push((
            table.to_string(),
            column.to_string(),
            value.to_string(),
            id,
        ));
        self
    }

    /// Reference table served by `lookup` (groups, categories, types).
    pub fn with_reference(mut self, name: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        self.reference
            .insert(name.to_string(), MemoryTable { columns, rows });
        self
    }

    pub fn written(&self) -> Vec<Record> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn written_to(&self, table: &str) -> Vec<Record> {
        self.written()
            .into_iter()
            .filter(|r| r.table == table)
            .collect()
    }
}

#[async_trait]
impl DestinationWriter for MemoryTarget {
    async fn write(&self, record: &Record) -> Result<u64> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_write == Some(attempt) {
            return Err(MigrateError::write(
                record.table,
                format!("Duplicate entry '{}' for key 'PRIMARY'", attempt),
            ));
        }

        let id = record
            .get("id")
            .and_then(SqlValue::as_i64)
            .map(|id| id as u64)
            .unwrap_or_else(|| self.next_id.fetch_add(1, Ordering::SeqCst));
        self.written.lock().unwrap().push((id, record.clone()));
        Ok(id)
    }

    async fn find_id(&self, table: &str, column: &str, value: &SqlValue) -> Result<Option<i64>> {
        let needle = value.as_text().map(|t| t.into_owned());
        let Some(needle) = needle else {
            return Ok(None);
        };

        let seeded = self
            .seeded
            .lock()
            .unwrap()
            .iter()
            .find(|(t, c, v, _)| t == table && c == column && *v == needle)
            .map(|(_, _, _, id)| *id);
        if seeded.is_some() {
            return Ok(seeded);
        }

        Ok(self
            .written
            .lock()
            .unwrap()
            .iter()
            .find(|(_, r)| {
                r.table == table
                    && r.get(column).and_then(|v| v.as_text()).as_deref() == Some(needle.as_str())
            })
            .map(|(id, _)| *id as i64))
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let seeded = self
            .seeded
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, c, _, _)| t == table && c == "id")
            .count();
        Ok((self.written_to(table).len() + seeded) as i64)
    }

    async fn lookup(&self, table: &str, _columns: &[&str]) -> Result<Vec<Row>> {
        Ok(self
            .reference
            .get(table)
            .map(|t| {
                t.rows
                    .iter()
                    .map(|values| Row::new(Arc::clone(&t.columns), values.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}
