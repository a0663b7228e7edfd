//! Database driver implementations.
//!
//! - [`mysql`]: MySQL/MariaDB source reader (SQLx) and destination writer
//!   (mysql_async)

pub mod mysql;

pub use mysql::{MysqlReader, MysqlWriter};
