//! MySQL/MariaDB destination writer implementation.
//!
//! Implements the `DestinationWriter` trait using mysql_async. Records are
//! inserted one statement at a time so that a failing row is reported with
//! its own error and the success count stays exact.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use mysql_async::prelude::*;
use mysql_async::{Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, SslOpts};
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::identifier::quote_mysql;
use crate::core::traits::DestinationWriter;
use crate::core::value::{Record, Row, SqlValue};
use crate::error::{MigrateError, Result};

/// MySQL/MariaDB destination writer implementation.
pub struct MysqlWriter {
    pool: Pool,
}

impl MysqlWriter {
    /// Create a new MySQL writer from configuration.
    pub async fn new(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "verify-ca" | "verify_ca" | "verify-full" | "verify_identity" => {
                Some(SslOpts::default())
            }
            _ => {
                warn!(
                    "Unknown ssl_mode '{}', defaulting to Preferred",
                    config.ssl_mode
                );
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let constraints = PoolConstraints::new(1, max_conns.max(1)).ok_or_else(|| {
            MigrateError::Config(format!("invalid MySQL pool size: {}", max_conns))
        })?;
        let opts: Opts = builder
            .pool_opts(PoolOpts::new().with_constraints(constraints))
            .into();
        let pool = Pool::new(opts);

        // Test connection
        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::pool(e, "creating MySQL target pool"))?;

        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL target connection"))?;

        drop(conn);

        info!(
            "Connected to MySQL target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<mysql_async::Conn> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::pool(e, "getting MySQL connection"))
    }

    /// Build `INSERT INTO t (a, b) VALUES (?, ?)` for a record.
    fn insert_sql(record: &Record) -> Result<String> {
        let columns = record
            .columns()
            .map(quote_mysql)
            .collect::<Result<Vec<_>>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_mysql(record.table)?,
            columns.join(", "),
            placeholders
        ))
    }
}

#[async_trait]
impl DestinationWriter for MysqlWriter {
    async fn write(&self, record: &Record) -> Result<u64> {
        let sql = Self::insert_sql(record)?;
        let params: Vec<mysql_async::Value> =
            record.values.iter().map(|(_, v)| sql_value_to_mysql(v)).collect();

        let mut conn = self.conn().await?;
        conn.exec_drop(&sql, Params::Positional(params))
            .await
            .map_err(|e| MigrateError::write(record.table, e))?;

        let explicit_id = record
            .get("id")
            .and_then(SqlValue::as_i64)
            .and_then(|id| u64::try_from(id).ok());
        let id = conn.last_insert_id().filter(|id| *id > 0).or(explicit_id).unwrap_or(0);

        debug!("MySQL: inserted {} row id={}", record.table, id);
        Ok(id)
    }

    async fn find_id(&self, table: &str, column: &str, value: &SqlValue) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT `id` FROM {} WHERE {} = ? LIMIT 1",
            quote_mysql(table)?,
            quote_mysql(column)?
        );
        let mut conn = self.conn().await?;
        let id: Option<i64> = conn
            .exec_first(&sql, Params::Positional(vec![sql_value_to_mysql(value)]))
            .await?;
        Ok(id)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_mysql(table)?);
        let mut conn = self.conn().await?;
        let count: Option<i64> = conn.query_first(&sql).await?;
        Ok(count.unwrap_or(0))
    }

    async fn lookup(&self, table: &str, columns: &[&str]) -> Result<Vec<Row>> {
        let select = columns
            .iter()
            .map(|c| quote_mysql(c))
            .collect::<Result<Vec<_>>>()?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY `id`",
            select.join(", "),
            quote_mysql(table)?
        );

        let mut conn = self.conn().await?;
        let rows: Vec<mysql_async::Row> = conn.query(&sql).await?;

        let names: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        Ok(rows
            .into_iter()
            .map(|mut row| {
                let values = (0..names.len())
                    .map(|i| {
                        row.take::<mysql_async::Value, usize>(i)
                            .map(mysql_to_sql_value)
                            .unwrap_or(SqlValue::Null)
                    })
                    .collect();
                Row::new(Arc::clone(&names), values)
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL connection"))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.clone().disconnect().await.ok();
    }
}

/// Convert SqlValue to mysql_async::Value.
fn sql_value_to_mysql(value: &SqlValue) -> mysql_async::Value {
    match value {
        SqlValue::Null => mysql_async::Value::NULL,
        SqlValue::Bool(b) => mysql_async::Value::from(*b),
        SqlValue::I64(i) => mysql_async::Value::Int(*i),
        SqlValue::U64(u) => mysql_async::Value::UInt(*u),
        SqlValue::F64(f) => mysql_async::Value::Double(*f),
        SqlValue::Decimal(d) => mysql_async::Value::Bytes(d.to_string().into_bytes()),
        SqlValue::Text(s) => mysql_async::Value::Bytes(s.as_bytes().to_vec()),
        SqlValue::Bytes(b) => mysql_async::Value::Bytes(b.clone()),
        SqlValue::Date(d) => date_value(d),
        SqlValue::DateTime(dt) => datetime_value(dt),
    }
}

/// Convert a mysql_async::Value read back from the destination.
fn mysql_to_sql_value(value: mysql_async::Value) -> SqlValue {
    use mysql_async::Value;

    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::I64(i),
        Value::UInt(u) => SqlValue::U64(u),
        Value::Float(f) => SqlValue::F64(f64::from(f)),
        Value::Double(d) => SqlValue::F64(d),
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        },
        Value::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .and_then(|d| {
                    d.and_hms_micro_opt(
                        u32::from(hour),
                        u32::from(minute),
                        u32::from(second),
                        micros,
                    )
                })
                .map(SqlValue::DateTime)
                .unwrap_or(SqlValue::Null)
        }
        Value::Time(negative, days, hours, minutes, seconds, _) => SqlValue::Text(format!(
            "{}{:02}:{:02}:{:02}",
            if negative { "-" } else { "" },
            days * 24 + u32::from(hours),
            minutes,
            seconds
        )),
    }
}

fn date_value(d: &NaiveDate) -> mysql_async::Value {
    mysql_async::Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
}

fn datetime_value(dt: &NaiveDateTime) -> mysql_async::Value {
    mysql_async::Value::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.nanosecond() / 1_000,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql() {
        let record = Record::new("history")
            .set("user_id", 4i64)
            .set("info_hash", "ab".repeat(20));
        assert_eq!(
            MysqlWriter::insert_sql(&record).unwrap(),
            "INSERT INTO `history` (`user_id`, `info_hash`) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_datetime_conversion() {
        let dt = NaiveDate::from_ymd_opt(2009, 3, 14)
            .unwrap()
            .and_hms_opt(15, 9, 26)
            .unwrap();
        assert_eq!(
            sql_value_to_mysql(&SqlValue::DateTime(dt)),
            mysql_async::Value::Date(2009, 3, 14, 15, 9, 26, 0)
        );
        assert_eq!(sql_value_to_mysql(&SqlValue::Null), mysql_async::Value::NULL);
    }

    #[test]
    fn test_lookup_value_conversion() {
        assert_eq!(
            mysql_to_sql_value(mysql_async::Value::Bytes(b"power-user".to_vec())),
            SqlValue::from("power-user")
        );
        assert_eq!(mysql_to_sql_value(mysql_async::Value::Int(7)), SqlValue::I64(7));
        assert_eq!(
            mysql_to_sql_value(mysql_async::Value::Date(2009, 3, 14, 15, 9, 26, 0)),
            SqlValue::DateTime(
                NaiveDate::from_ymd_opt(2009, 3, 14)
                    .unwrap()
                    .and_hms_opt(15, 9, 26)
                    .unwrap()
            )
        );
        assert_eq!(
            mysql_to_sql_value(mysql_async::Value::Date(0, 0, 0, 0, 0, 0, 0)),
            SqlValue::Null
        );
    }
}
