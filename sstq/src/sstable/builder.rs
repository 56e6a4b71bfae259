//! Fixture writer producing the on-disk layout the reader consumes. Test
//! only; the crate has no write path.

use std::path::{Path, PathBuf};

use crate::{
    codec::{header::compose_magic, vint::encode_unsigned_vint},
    cql::{
        value::{serialize_value, CqlValue},
        NativeType,
    },
    schema::{ColumnDef, ColumnKind, Schema},
    sstable::{component::Component, statistics::encode_statistics},
};

pub struct SstableBuilder {
    schema: Schema,
    generation: u64,
    format: String,
    version: u16,
    partitions: Vec<(Vec<CqlValue>, Vec<Vec<CqlValue>>)>,
    companions: bool,
}

impl SstableBuilder {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            generation: 1,
            format: "oa".to_string(),
            version: 1,
            partitions: vec![],
            companions: true,
        }
    }

    /// uuid/text/int table used across the test suite.
    pub fn users() -> Self {
        let schema = Schema::new(
            "app",
            "users",
            vec![
                ColumnDef::new(
                    "id",
                    crate::cql::types::CqlType::Native(NativeType::Uuid),
                    ColumnKind::PartitionKey,
                ),
                ColumnDef::new(
                    "name",
                    crate::cql::types::CqlType::Native(NativeType::Text),
                    ColumnKind::Regular,
                ),
                ColumnDef::new(
                    "age",
                    crate::cql::types::CqlType::Native(NativeType::Int),
                    ColumnKind::Regular,
                ),
            ],
        )
        .unwrap();
        Self::new(schema)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn without_companions(mut self) -> Self {
        self.companions = false;
        self
    }

    /// Row cells are given in `row_columns` order (clustering then regular).
    pub fn partition(&mut self, key: Vec<CqlValue>, rows: Vec<Vec<CqlValue>>) -> &mut Self {
        assert_eq!(key.len(), self.schema.partition_keys().count());
        for row in &rows {
            assert_eq!(row.len(), self.schema.row_columns().count());
        }
        self.partitions.push((key, rows));
        self
    }

    fn magic_word(&self) -> u32 {
        compose_magic(&self.format, self.version).unwrap_or(0xDEAD_0000)
    }

    pub fn data_bytes(&self) -> Vec<u8> {
        let mut out = self.magic_word().to_be_bytes().to_vec();

        push_str(&mut out, &self.schema.keyspace);
        push_str(&mut out, &self.schema.table);
        out.extend_from_slice(&encode_unsigned_vint(self.schema.columns.len() as u64));
        for column in &self.schema.columns {
            push_str(&mut out, &column.name);
            push_str(&mut out, &column.cql_type.to_string());
            out.push(match column.kind {
                ColumnKind::Regular => super::data::KIND_REGULAR,
                ColumnKind::PartitionKey => super::data::KIND_PARTITION_KEY,
                ColumnKind::Clustering => super::data::KIND_CLUSTERING,
            });
        }

        for (key, rows) in &self.partitions {
            for cell in key {
                push_cell(&mut out, cell);
            }
            out.extend_from_slice(&encode_unsigned_vint(rows.len() as u64));
            for row in rows {
                let mut body = Vec::new();
                for cell in row {
                    push_cell(&mut body, cell);
                }
                out.extend_from_slice(&encode_unsigned_vint(body.len() as u64));
                out.extend_from_slice(&body);
            }
        }
        out
    }

    /// Write the Data file and companions into `dir`, returning the Data
    /// path.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let base = format!("{}-{}-{}", self.schema.table, self.generation, self.format);
        let data_path = dir.join(format!("{base}-Data.db"));
        std::fs::write(&data_path, self.data_bytes())?;

        if self.companions {
            let rows: u64 = self.partitions.iter().map(|(_, r)| r.len() as u64).sum();
            let stats = encode_statistics(
                self.magic_word(),
                rows,
                self.partitions.len() as u64,
                "LZ4Compressor",
            );
            std::fs::write(dir.join(format!("{base}-Statistics.db")), stats)?;

            for component in [
                Component::Index,
                Component::Filter,
                Component::Summary,
                Component::CompressionInfo,
            ] {
                std::fs::write(
                    dir.join(format!("{base}-{component}.db")),
                    self.magic_word().to_be_bytes(),
                )?;
            }
        }
        Ok(data_path)
    }
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&encode_unsigned_vint(s.len() as u64));
    out.extend_from_slice(s.as_bytes());
}

/// Null-aware cell: prefix 0 for null, content length + 1 otherwise.
fn push_cell(out: &mut Vec<u8>, value: &CqlValue) {
    if value.is_null() {
        out.push(0);
        return;
    }
    let mut content = Vec::new();
    serialize_value(value, &mut content);
    out.extend_from_slice(&encode_unsigned_vint(content.len() as u64 + 1));
    out.extend_from_slice(&content);
}
