//! Scalar values, source rows and destination records.
//!
//! Rows read from the legacy database are loosely typed: the same logical
//! field may arrive as an integer, a numeric string or raw bytes depending on
//! how the column was declared. The coercion helpers on [`SqlValue`] absorb
//! those differences so transforms can stay declarative.

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer of any width.
    I64(i64),

    /// Unsigned integer (BIGINT UNSIGNED and friends).
    U64(u64),

    /// Floating point.
    F64(f64),

    /// Exact numeric (DECIMAL/NUMERIC).
    Decimal(Decimal),

    /// Character data.
    Text(String),

    /// Binary data (BINARY/VARBINARY/BLOB).
    Bytes(Vec<u8>),

    /// DATE.
    Date(NaiveDate),

    /// DATETIME/TIMESTAMP.
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view of the value. Numeric strings are parsed, floats truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::I64(v) => Some(*v),
            SqlValue::U64(v) => i64::try_from(*v).ok(),
            SqlValue::F64(v) if v.is_finite() => Some(*v as i64),
            SqlValue::Decimal(d) => d.trunc().to_i64(),
            SqlValue::Text(s) => parse_int(s),
            SqlValue::Bytes(b) => std::str::from_utf8(b).ok().and_then(parse_int),
            _ => None,
        }
    }

    /// Floating point view of the value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            SqlValue::I64(v) => Some(*v as f64),
            SqlValue::U64(v) => Some(*v as f64),
            SqlValue::F64(v) => Some(*v),
            SqlValue::Decimal(d) => d.to_f64(),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text view of the value. Bytes are decoded lossily.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            SqlValue::Null => None,
            SqlValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            SqlValue::Bytes(b) => Some(String::from_utf8_lossy(b)),
            SqlValue::Bool(b) => Some(Cow::Owned(b.to_string())),
            SqlValue::I64(v) => Some(Cow::Owned(v.to_string())),
            SqlValue::U64(v) => Some(Cow::Owned(v.to_string())),
            SqlValue::F64(v) => Some(Cow::Owned(v.to_string())),
            SqlValue::Decimal(d) => Some(Cow::Owned(d.to_string())),
            SqlValue::Date(d) => Some(Cow::Owned(d.format("%Y-%m-%d").to_string())),
            SqlValue::DateTime(dt) => {
                Some(Cow::Owned(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
            }
        }
    }

    /// Raw byte view, used for binary info hashes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Bytes(b) => Some(b),
            SqlValue::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Truthiness the way the legacy schema stores flags: 1/0, 'yes'/'no', booleans.
    pub fn is_truthy(&self) -> bool {
        match self {
            SqlValue::Null => false,
            SqlValue::Bool(b) => *b,
            SqlValue::Text(s) => {
                let s = s.trim();
                !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("no"))
            }
            other => other.as_i64().map(|v| v != 0).unwrap_or(false),
        }
    }
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One source row: column names (shared by the page) plus values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in select order.
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Value of a column, `None` when the column is not part of the row.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|idx| &self.values[idx])
    }

    /// First non-NULL value among alternative column names.
    pub fn first_of(&self, names: &[&str]) -> Option<&SqlValue> {
        names
            .iter()
            .filter_map(|name| self.get(name))
            .find(|v| !v.is_null())
    }
}

/// A destination record produced by a transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Destination table.
    pub table: &'static str,

    /// Primary key of the source row, kept for log messages and id remapping.
    pub source_id: Option<i64>,

    /// Column/value pairs in insert order.
    pub values: Vec<(&'static str, SqlValue)>,
}

impl Record {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            source_id: None,
            values: Vec::new(),
        }
    }

    pub fn with_source_id(mut self, id: i64) -> Self {
        self.source_id = Some(id);
        self
    }

    /// Append a column.
    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.values.push((column, value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    /// Drop a column, e.g. to let the destination assign the id.
    pub fn without(mut self, column: &str) -> Self {
        self.values.retain(|(c, _)| *c != column);
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(c, _)| *c)
    }
}
