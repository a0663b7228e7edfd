//! Seams between the migration procedures and the databases.
//!
//! - [`SourceQuery`]: read access to the legacy database, one page per call
//! - [`DestinationWriter`]: insert-only access to the new schema
//!
//! Both are object safe and used as `Arc<dyn ...>` so that the procedures can
//! run against the real MySQL drivers, the dry-run target or in-memory test
//! doubles without change.

use async_trait::async_trait;

use crate::core::value::{Record, Row, SqlValue};
use crate::error::Result;

/// Read access to the source database.
#[async_trait]
pub trait SourceQuery: Send + Sync {
    /// Run a query with positional `?` parameters and return every row.
    ///
    /// Callers are expected to bound the result themselves (see
    /// [`crate::source::ChunkedReader`]).
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Check whether a table exists in the source database.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Column names of a table in ordinal order.
    async fn columns(&self, table: &str) -> Result<Vec<String>>;

    /// Exact row count of a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Round-trip a trivial statement.
    async fn ping(&self) -> Result<()>;

    /// Get the database type identifier.
    fn db_type(&self) -> &str;

    /// Close all connections.
    async fn close(&self);
}

/// Insert-only access to the destination database.
#[async_trait]
pub trait DestinationWriter: Send + Sync {
    /// Insert one record and return the id the database assigned (or the
    /// explicit id the record carried).
    async fn write(&self, record: &Record) -> Result<u64>;

    /// Look up the `id` of the first row whose `column` equals `value`.
    async fn find_id(&self, table: &str, column: &str, value: &SqlValue) -> Result<Option<i64>>;

    /// Exact row count of a table.
    async fn row_count(&self, table: &str) -> Result<i64>;

    /// Every row of a small reference table (groups, categories, types),
    /// restricted to `columns` and ordered by `id`.
    async fn lookup(&self, table: &str, columns: &[&str]) -> Result<Vec<Row>>;

    /// Round-trip a trivial statement.
    async fn ping(&self) -> Result<()>;

    /// Get the database type identifier.
    fn db_type(&self) -> &str;

    /// Close all connections.
    async fn close(&self);
}
