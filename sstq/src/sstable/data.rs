//! Data component layout: embedded schema header followed by partitions of
//! length-framed rows.

use bytes::Bytes;
use indexmap::IndexMap;
use nom::{bytes::complete::take, multi::length_count, IResult};
use serde::Serialize;

use crate::{
    codec::{
        header::{detect_format, magic, FormatInfo},
        vint::{cell_bytes, unsigned_vint, vint_str},
    },
    cql::{
        types::parse_type_string,
        value::{deserialize_value, CqlValue},
    },
    error::{Error, ErrorCode, Result},
    schema::{ColumnDef, ColumnKind, Schema},
};

pub type Row = IndexMap<String, CqlValue>;

pub const KIND_REGULAR: u8 = 0;
pub const KIND_PARTITION_KEY: u8 = 1;
pub const KIND_CLUSTERING: u8 = 2;

#[derive(Debug, Clone)]
pub struct DataHeader {
    pub format: FormatInfo,
    pub schema: Schema,
    /// Offset of the first partition.
    pub body_offset: usize,
}

/// Counters accumulated while scanning. Malformed rows are skipped and
/// counted here instead of failing the scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub partitions: u64,
    pub rows_scanned: u64,
    pub skipped_rows: u64,
}

/// Raw header fields before schema validation.
fn raw_header(input: &[u8]) -> IResult<&[u8], (u32, &str, &str, Vec<(&str, &str, u8)>)> {
    let (input, magic_word) = magic(input)?;
    let (input, keyspace) = vint_str(input)?;
    let (input, table) = vint_str(input)?;
    let (input, columns) = length_count(unsigned_vint, |input| {
        let (input, name) = vint_str(input)?;
        let (input, type_string) = vint_str(input)?;
        let (input, kind) = take(1usize)(input)?;
        Ok((input, (name, type_string, kind[0])))
    })(input)?;
    Ok((input, (magic_word, keyspace, table, columns)))
}

/// Parse the embedded schema header at the start of a Data component.
pub fn parse_header(data: &[u8]) -> Result<DataHeader> {
    let format = detect_format(data)?;
    if !format.recognized {
        tracing::warn!(format = %format.format_name, "proceeding with unrecognized format");
    }

    let (rest, (_, keyspace, table, raw_columns)) = raw_header(data)
        .map_err(|_| Error::corrupt("truncated or malformed sstable header"))?;

    let mut columns = Vec::with_capacity(raw_columns.len());
    for (name, type_string, kind) in raw_columns {
        let kind = match kind {
            KIND_REGULAR => ColumnKind::Regular,
            KIND_PARTITION_KEY => ColumnKind::PartitionKey,
            KIND_CLUSTERING => ColumnKind::Clustering,
            other => {
                return Err(Error::corrupt(format!(
                    "unknown column kind tag {other} for column `{name}`"
                )))
            }
        };
        columns.push(ColumnDef::new(name, parse_type_string(type_string)?, kind));
    }

    Ok(DataHeader {
        format,
        schema: Schema::new(keyspace, table, columns)?,
        body_offset: data.len() - rest.len(),
    })
}

/// Streaming scan over the partitions of a Data component. Owns its buffer,
/// so iterators built on top of it carry no borrow.
pub struct Scan {
    data: Bytes,
    pos: usize,
    schema: Schema,
    current_key: Vec<(String, CqlValue)>,
    rows_left: u64,
    finished: bool,
    summary: ScanSummary,
}

impl Scan {
    pub fn new(data: Bytes, schema: Schema, body_offset: usize) -> Self {
        Self {
            data,
            pos: body_offset,
            schema,
            current_key: vec![],
            rows_left: 0,
            finished: false,
            summary: ScanSummary::default(),
        }
    }

    pub fn summary(&self) -> ScanSummary {
        self.summary
    }

    /// Next decodable row, in storage order. Rows whose cells fail to decode
    /// are skipped and counted; broken partition framing is fatal.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            if self.rows_left == 0 {
                if self.pos >= self.data.len() {
                    self.finished = true;
                    return Ok(None);
                }
                self.read_partition_header()?;
                continue;
            }
            self.rows_left -= 1;

            let body = self.read_row_frame()?;
            match self.decode_row(&body) {
                Ok(row) => {
                    self.summary.rows_scanned += 1;
                    return Ok(Some(row));
                }
                Err(err) => {
                    self.summary.skipped_rows += 1;
                    tracing::warn!(error = %err, "skipping undecodable row");
                }
            }
        }
    }

    fn read_partition_header(&mut self) -> Result<()> {
        let input = &self.data[self.pos..];
        let parsed: IResult<&[u8], (Vec<Option<&[u8]>>, u64)> = (|input| {
            let mut cells = Vec::new();
            let mut rest = input;
            for _ in self.schema.partition_keys() {
                let (r, cell) = cell_bytes(rest)?;
                cells.push(cell);
                rest = r;
            }
            let (rest, row_count) = unsigned_vint(rest)?;
            Ok((rest, (cells, row_count)))
        })(input);

        let (rest, (cells, row_count)) =
            parsed.map_err(|_| Error::corrupt("malformed partition header"))?;

        let mut key = Vec::with_capacity(cells.len());
        for (column, cell) in self.schema.partition_keys().zip(cells) {
            let value = match cell {
                Some(bytes) => deserialize_value(bytes, &column.cql_type).map_err(|err| {
                    Error::new(
                        ErrorCode::Corrupt,
                        format!("partition key `{}`: {}", column.name, err.reason),
                    )
                })?,
                None => CqlValue::Null,
            };
            key.push((column.name.clone(), value));
        }

        self.pos += input.len() - rest.len();
        self.current_key = key;
        self.rows_left = row_count;
        self.summary.partitions += 1;
        Ok(())
    }

    /// The row's byte-length frame is the resynchronization point: it must
    /// be intact even when the cells inside are not.
    fn read_row_frame(&mut self) -> Result<Bytes> {
        let input = &self.data[self.pos..];
        let (rest, len) =
            unsigned_vint(input).map_err(|_| Error::corrupt("malformed row length"))?;
        let header_len = input.len() - rest.len();
        let len = len as usize;
        if rest.len() < len {
            return Err(Error::corrupt(format!(
                "row body of {len} bytes exceeds remaining {}",
                rest.len()
            )));
        }
        let start = self.pos + header_len;
        self.pos = start + len;
        Ok(self.data.slice(start..start + len))
    }

    fn decode_row(&self, body: &[u8]) -> Result<Row> {
        let mut row = Row::new();
        for (name, value) in &self.current_key {
            row.insert(name.clone(), value.clone());
        }

        let mut rest = body;
        for column in self.schema.row_columns() {
            let (r, cell) = cell_bytes(rest).map_err(Error::from)?;
            let value = match cell {
                Some(bytes) => deserialize_value(bytes, &column.cql_type)?,
                None => CqlValue::Null,
            };
            row.insert(column.name.clone(), value);
            rest = r;
        }
        if !rest.is_empty() {
            return Err(Error::corrupt(format!(
                "{} trailing bytes after the last cell",
                rest.len()
            )));
        }
        Ok(row)
    }
}
