//! Page-offset pagination over an arbitrary `SELECT`.
//!
//! A [`ChunkedReader`] issues `<base> ORDER BY <keys> LIMIT c OFFSET o` one
//! page at a time and hands out the rows one by one. A page shorter than the
//! chunk size ends the sequence, so a table whose size is an exact multiple
//! of the chunk size costs one extra (empty) fetch.
//!
//! The reader is one-shot: once exhausted, or after a failed fetch, it yields
//! nothing more. Build a new reader to start again at offset 0.

use std::collections::VecDeque;

use futures::stream::{self, Stream};
use tracing::debug;

use crate::core::identifier::quote_qualified;
use crate::core::traits::SourceQuery;
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// A base query plus the ordering that makes its pages deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedQuery {
    base: String,
    order_by: String,
}

impl ChunkedQuery {
    /// `base` must not carry its own ORDER BY or LIMIT clause. `order_by`
    /// lists the key columns (optionally alias-qualified, e.g. `c.id`).
    pub fn new(base: impl Into<String>, order_by: &[&str]) -> Result<Self> {
        if order_by.is_empty() {
            return Err(MigrateError::InvalidQuery(
                "chunked query requires at least one ordering column".into(),
            ));
        }
        let keys = order_by
            .iter()
            .map(|k| quote_qualified(k))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            base: base.into().trim().to_string(),
            order_by: keys.join(", "),
        })
    }

    /// SQL for one page.
    pub fn page_sql(&self, limit: usize, offset: usize) -> String {
        format!(
            "{} ORDER BY {} LIMIT {} OFFSET {}",
            self.base, self.order_by, limit, offset
        )
    }
}

/// Lazy, bounded-memory row cursor over a [`ChunkedQuery`].
pub struct ChunkedReader<'a> {
    source: &'a dyn SourceQuery,
    query: ChunkedQuery,
    params: Vec<SqlValue>,
    chunk_size: usize,
    offset: usize,
    buffer: VecDeque<Row>,
    exhausted: bool,
    pages_fetched: usize,
    rows_yielded: u64,
}

impl<'a> ChunkedReader<'a> {
    pub fn new(
        source: &'a dyn SourceQuery,
        query: ChunkedQuery,
        params: Vec<SqlValue>,
        chunk_size: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(MigrateError::InvalidQuery(
                "chunk size must be at least 1".into(),
            ));
        }

        Ok(Self {
            source,
            query,
            params,
            chunk_size,
            offset: 0,
            buffer: VecDeque::with_capacity(chunk_size),
            exhausted: false,
            pages_fetched: 0,
            rows_yielded: 0,
        })
    }

    /// Next row, fetching a new page when the buffer is drained.
    ///
    /// Returns `Ok(None)` once the source is exhausted. A fetch error is
    /// returned once; later calls return `Ok(None)`.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }

        let row = self.buffer.pop_front();
        if row.is_some() {
            self.rows_yielded += 1;
        }
        Ok(row)
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let sql = self.query.page_sql(self.chunk_size, self.offset);
        debug!("Fetching page at offset {}: {}", self.offset, sql);

        let rows = match self.source.query(&sql, &self.params).await {
            Ok(rows) => rows,
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };
        self.pages_fetched += 1;

        if rows.len() > self.chunk_size {
            self.exhausted = true;
            return Err(MigrateError::data_access(
                format!("page at offset {}", self.offset),
                format!(
                    "source returned {} rows for a page of {}",
                    rows.len(),
                    self.chunk_size
                ),
            ));
        }

        if rows.len() < self.chunk_size {
            self.exhausted = true;
        } else {
            self.offset += self.chunk_size;
        }
        self.buffer.extend(rows);
        Ok(())
    }

    /// Number of page queries issued so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Number of rows handed out so far.
    pub fn rows_yielded(&self) -> u64 {
        self.rows_yielded
    }

    /// Rows currently held in memory.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Adapt the cursor into a `futures::Stream`.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>> + 'a {
        stream::try_unfold(self, |mut reader| async move {
            let next = reader.next_row().await?;
            Ok::<_, MigrateError>(next.map(|row| (row, reader)))
        })
    }
}
