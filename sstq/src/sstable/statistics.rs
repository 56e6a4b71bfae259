//! Best-effort parsing of the Statistics companion.

use nom::combinator::all_consuming;
use serde::Serialize;

use crate::{
    codec::{
        header::magic,
        vint::{unsigned_vint, vint_str},
    },
    error::Result,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SstableStats {
    pub data_size: u64,
    pub estimated_rows: Option<u64>,
    pub partition_count: Option<u64>,
    pub compression: Option<String>,
}

impl SstableStats {
    /// Stats with nothing but the Data file size, used when the Statistics
    /// companion is absent or unparseable.
    pub fn size_only(data_size: u64) -> Self {
        Self {
            data_size,
            estimated_rows: None,
            partition_count: None,
            compression: None,
        }
    }
}

/// Layout: magic word, estimated row count (vint), partition count (vint),
/// compression algorithm name (vint string, empty = uncompressed).
pub fn parse_statistics(input: &[u8], data_size: u64) -> Result<SstableStats> {
    let (_, (rows, partitions, compression)) = all_consuming(|input| {
        let (input, _) = magic(input)?;
        let (input, rows) = unsigned_vint(input)?;
        let (input, partitions) = unsigned_vint(input)?;
        let (input, compression) = vint_str(input)?;
        Ok((input, (rows, partitions, compression.to_string())))
    })(input)?;

    Ok(SstableStats {
        data_size,
        estimated_rows: Some(rows),
        partition_count: Some(partitions),
        compression: (!compression.is_empty()).then_some(compression),
    })
}

pub fn encode_statistics(
    magic_word: u32,
    rows: u64,
    partitions: u64,
    compression: &str,
) -> Vec<u8> {
    use crate::codec::vint::encode_unsigned_vint;

    let mut out = magic_word.to_be_bytes().to_vec();
    out.extend_from_slice(&encode_unsigned_vint(rows));
    out.extend_from_slice(&encode_unsigned_vint(partitions));
    out.extend_from_slice(&encode_unsigned_vint(compression.len() as u64));
    out.extend_from_slice(compression.as_bytes());
    out
}
