//! MySQL/MariaDB database driver.
//!
//! - [`MysqlReader`]: legacy source, implements [`crate::core::SourceQuery`]
//! - [`MysqlWriter`]: destination, implements [`crate::core::DestinationWriter`]
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod reader;
mod writer;

pub use reader::MysqlReader;
pub use writer::MysqlWriter;
