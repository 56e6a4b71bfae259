//! Read-only CQL query engine over Apache Cassandra SSTable files.
//!
//! Opens Data components straight from disk, no running cluster involved,
//! and runs SELECT statements against them:
//!
//! ```no_run
//! use sstq::Sstable;
//!
//! # fn main() -> sstq::Result<()> {
//! let sstable = Sstable::open("users-1-oa-Data.db", None)?;
//! let rows = sstable.query("SELECT name, age FROM users WHERE age > 25")?;
//! # Ok(())
//! # }
//! ```
//!
//! Results come back as ordered column-to-value maps. Besides full
//! materialization, [`Sstable::query_rows`] streams single rows and
//! [`Sstable::query_chunks`] yields fixed-size batches; both are lazy.
//! ORDER BY is the exception: it buffers the matched row set before
//! returning anything.

pub mod codec;
pub mod cql;
pub mod error;
mod parse;
pub mod query;
pub mod schema;
pub mod sstable;

pub use codec::header::{detect_format, FormatInfo};
pub use cql::{convert_value, CqlType, CqlValue, Literal, NativeType};
pub use error::{Error, ErrorCode, Result};
pub use query::{Chunks, ParsedQuery, QueryIterator};
pub use schema::{ClusteringOrder, ColumnDef, ColumnKind, Schema};
pub use sstable::{
    discover_sstables, validate_sstable, DiscoveredSstable, Row, ScanSummary, Sstable,
    SstableName, SstableStats, ValidationReport,
};
