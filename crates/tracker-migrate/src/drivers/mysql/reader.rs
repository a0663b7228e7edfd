//! MySQL/MariaDB source reader implementation.
//!
//! Implements the `SourceQuery` trait for reading the legacy tracker database.
//! Uses SQLx for connection pooling and async query execution.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{
    MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow,
    MySqlSslMode,
};
use sqlx::query::Query;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::core::identifier::quote_mysql;
use crate::core::traits::SourceQuery;
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// MySQL/MariaDB source reader implementation.
pub struct MysqlReader {
    pool: MySqlPool,
    database: String,
}

impl MysqlReader {
    /// Create a new MySQL reader from configuration.
    pub async fn new(config: &SourceConfig, max_conns: usize) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(Self::ssl_mode(&config.ssl_mode));

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "creating MySQL source pool"))?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL source connection"))?;

        info!(
            "Connected to MySQL source: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    fn ssl_mode(mode: &str) -> MySqlSslMode {
        match mode.to_lowercase().as_str() {
            "disable" | "disabled" => MySqlSslMode::Disabled,
            "prefer" | "preferred" => MySqlSslMode::Preferred,
            "require" | "required" => MySqlSslMode::Required,
            "verify-ca" | "verify_ca" => MySqlSslMode::VerifyCa,
            "verify-full" | "verify_identity" => MySqlSslMode::VerifyIdentity,
            other => {
                warn!("Unknown ssl_mode '{}', defaulting to Preferred", other);
                MySqlSslMode::Preferred
            }
        }
    }

    /// Bind one positional parameter.
    fn bind_value<'q>(
        query: Query<'q, MySql, MySqlArguments>,
        value: &SqlValue,
    ) -> Query<'q, MySql, MySqlArguments> {
        match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::U64(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Decimal(d) => query.bind(*d),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Bytes(b) => query.bind(b.clone()),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::DateTime(dt) => query.bind(*dt),
        }
    }

    /// Convert a MySQL row to SqlValue vector, dispatching on the reported column type.
    fn row_to_values(row: &MySqlRow) -> Vec<SqlValue> {
        row.columns()
            .iter()
            .enumerate()
            .map(|(i, col)| {
                // Handle NULL values
                let is_null: bool = row.try_get_raw(i).map(|r| r.is_null()).unwrap_or(true);
                if is_null {
                    return SqlValue::Null;
                }

                let type_name = col.type_info().name().to_ascii_uppercase();
                let unsigned = type_name.contains("UNSIGNED");
                let base = type_name.split_whitespace().next().unwrap_or_default();

                match base {
                    // Integer types
                    "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT"
                        if unsigned =>
                    {
                        row.try_get::<u64, _>(i)
                            .map(SqlValue::U64)
                            .unwrap_or(SqlValue::Null)
                    }
                    "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" => row
                        .try_get::<i64, _>(i)
                        .map(SqlValue::I64)
                        .unwrap_or(SqlValue::Null),

                    // Boolean (TINYINT(1))
                    "BOOLEAN" | "BOOL" => row
                        .try_get::<bool, _>(i)
                        .map(SqlValue::Bool)
                        .unwrap_or(SqlValue::Null),

                    // Floating point
                    "FLOAT" => row
                        .try_get::<f32, _>(i)
                        .map(|v| SqlValue::F64(f64::from(v)))
                        .unwrap_or(SqlValue::Null),
                    "DOUBLE" | "REAL" => row
                        .try_get::<f64, _>(i)
                        .map(SqlValue::F64)
                        .unwrap_or(SqlValue::Null),

                    // Decimal
                    "DECIMAL" | "NUMERIC" => row
                        .try_get::<rust_decimal::Decimal, _>(i)
                        .map(SqlValue::Decimal)
                        .unwrap_or(SqlValue::Null),

                    // Binary types (info hashes are BINARY(20))
                    "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB"
                    | "BIT" => row
                        .try_get::<Vec<u8>, _>(i)
                        .map(SqlValue::Bytes)
                        .unwrap_or(SqlValue::Null),

                    // Date/Time types; zero dates fail to decode and become NULL
                    "DATE" => row
                        .try_get::<chrono::NaiveDate, _>(i)
                        .map(SqlValue::Date)
                        .unwrap_or(SqlValue::Null),
                    "DATETIME" | "TIMESTAMP" => row
                        .try_get::<chrono::NaiveDateTime, _>(i)
                        .map(SqlValue::DateTime)
                        .unwrap_or(SqlValue::Null),

                    // Strings, enums, sets, json, year: text first, raw bytes second
                    _ => row
                        .try_get::<String, _>(i)
                        .map(SqlValue::Text)
                        .or_else(|_| row.try_get::<Vec<u8>, _>(i).map(SqlValue::Bytes))
                        .unwrap_or(SqlValue::Null),
                }
            })
            .collect()
    }
}

#[async_trait]
impl SourceQuery for MysqlReader {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = Self::bind_value(query, param);
        }

        let rows: Vec<MySqlRow> = query.fetch_all(&self.pool).await?;
        debug!("MySQL source returned {} rows", rows.len());

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Arc<[String]> = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        Ok(rows
            .iter()
            .map(|row| Row::new(Arc::clone(&columns), Self::row_to_values(row)))
            .collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let sql = r#"
            SELECT COUNT(*)
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        "#;
        let count: i64 = sqlx::query_scalar(sql)
            .bind(&self.database)
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>> {
        // CAST to CHAR to handle collation differences
        let sql = r#"
            SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;
        let names: Vec<String> = sqlx::query_scalar(sql)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_mysql(table)?);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing MySQL source connection"))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
