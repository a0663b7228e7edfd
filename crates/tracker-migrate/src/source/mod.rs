//! Reading the legacy database in bounded pages.

mod chunked;

pub use chunked::{ChunkedQuery, ChunkedReader};
