//! Core abstractions shared by the drivers and the migration procedures.
//!
//! - [`value`]: scalar values, source rows and destination records
//! - [`traits`]: the source and destination seams
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod traits;
pub mod value;

pub use traits::{DestinationWriter, SourceQuery};
pub use value::{Record, Row, SqlValue};
