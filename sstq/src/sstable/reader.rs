//! The read handle over one sstable: open and validate, expose schema and
//! stats, run queries.

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use bytes::Bytes;
use memmap2::Mmap;
use tracing::instrument;

use crate::{
    codec::header::FormatInfo,
    error::{Error, ErrorCode, Result},
    query::{
        iter::{Chunks, QueryIterator},
        parser::parse,
    },
    schema::Schema,
    sstable::{
        component::{Component, SstableName},
        data::{parse_header, Row, Scan},
        statistics::{parse_statistics, SstableStats},
    },
};

/// Immutable after open: safe to share across threads and to run any number
/// of concurrent queries against.
///
/// The Data file is memory-mapped, so resident memory is bounded by the
/// pages a scan actually touches plus whatever rows the caller retains, not
/// by the file size.
#[derive(Debug)]
pub struct Sstable {
    path: PathBuf,
    name: SstableName,
    data: Bytes,
    format: FormatInfo,
    schema: Schema,
    body_offset: usize,
    warnings: Vec<String>,
    stats: OnceLock<SstableStats>,
}

impl Sstable {
    /// Open a Data component. The embedded header supplies the schema;
    /// passing one explicitly overrides the embedded column types but must
    /// agree with it on column names and order.
    pub fn open(path: impl AsRef<Path>, schema: Option<Schema>) -> Result<Self> {
        let path = path.as_ref();
        let name = SstableName::parse(path)?;
        if name.component != Component::Data {
            return Err(Error::new(
                ErrorCode::InvalidExtension,
                format!("expected a Data component, found {}", name.component),
            ));
        }

        let file = std::fs::File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::corrupt(format!(
                "empty sstable file: {}",
                path.display()
            )));
        }
        // Safety: the mapping is read-only and sstables are never rewritten
        // in place.
        let mmap = unsafe { Mmap::map(&file)? };
        let data = Bytes::from_owner(mmap);
        let header = parse_header(&data)?;

        let mut warnings = Vec::new();
        if !header.format.recognized {
            warnings.push("unrecognized sstable format magic".to_string());
        }
        for component in Component::COMPANIONS {
            if !name.sibling(path, component).exists() {
                tracing::warn!(%component, path = %path.display(), "missing companion file");
                warnings.push(format!("missing companion file: {component}"));
            }
        }

        let schema = match schema {
            Some(explicit) => {
                let embedded: Vec<_> = header.schema.column_names().collect();
                let given: Vec<_> = explicit.column_names().collect();
                if embedded != given {
                    return Err(Error::new(
                        ErrorCode::SchemaInvalid,
                        format!(
                            "schema columns {given:?} do not match the file's {embedded:?}"
                        ),
                    ));
                }
                explicit
            }
            None => header.schema,
        };

        Ok(Self {
            path: path.to_path_buf(),
            name,
            data,
            format: header.format,
            schema,
            body_offset: header.body_offset,
            warnings,
            stats: OnceLock::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table_name(&self) -> &str {
        &self.schema.table
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn format(&self) -> &FormatInfo {
        &self.format
    }

    /// Conditions observed at open time, e.g. missing companion files.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Statistics companion, parsed once on first use. An absent or
    /// unparseable companion degrades to size-only stats with a warning.
    pub fn stats(&self) -> &SstableStats {
        self.stats.get_or_init(|| {
            let data_size = self.data.len() as u64;
            let stats_path = self.name.sibling(&self.path, Component::Statistics);
            match std::fs::read(&stats_path) {
                Ok(bytes) => match parse_statistics(&bytes, data_size) {
                    Ok(stats) => stats,
                    Err(err) => {
                        tracing::warn!(error = %err, "unparseable Statistics companion");
                        SstableStats::size_only(data_size)
                    }
                },
                Err(_) => SstableStats::size_only(data_size),
            }
        })
    }

    /// Execute and materialize the full result set.
    #[instrument(skip(self), fields(table = %self.schema.table))]
    pub fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.run(sql)?.collect()
    }

    /// Execute, yielding rows in fixed-size chunks.
    pub fn query_chunks(&self, sql: &str, chunk_size: usize) -> Result<Chunks> {
        Ok(Chunks::new(self.run(sql)?, chunk_size))
    }

    /// Execute, yielding one row at a time.
    pub fn query_rows(&self, sql: &str) -> Result<QueryIterator> {
        self.run(sql)
    }

    fn run(&self, sql: &str) -> Result<QueryIterator> {
        let query = parse(sql)?;
        if query.table != self.schema.table {
            return Err(Error::new(
                ErrorCode::UnknownTable,
                format!(
                    "query targets `{}`, this sstable holds `{}`",
                    query.table, self.schema.table
                ),
            ));
        }
        tracing::trace!(?query, "executing");
        let scan = Scan::new(self.data.clone(), self.schema.clone(), self.body_offset);
        crate::query::exec::execute(query, &self.schema, scan)
    }
}
