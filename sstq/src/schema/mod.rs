//! Table schema model: column definitions, primary-key layout, JSON
//! descriptors and user defined type resolution.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{
    cql::types::{parse_type_string, CqlType},
    error::{Error, ErrorCode, Result},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    #[display(fmt = "partition_key")]
    PartitionKey,
    #[display(fmt = "clustering")]
    Clustering,
    #[display(fmt = "regular")]
    Regular,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringOrder {
    #[default]
    #[display(fmt = "asc")]
    Asc,
    #[display(fmt = "desc")]
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub cql_type: CqlType,
    pub kind: ColumnKind,
    pub clustering_order: ClusteringOrder,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, cql_type: CqlType, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            cql_type,
            kind,
            clustering_order: ClusteringOrder::Asc,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub keyspace: String,
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

/// JSON descriptor shape accepted by [`Schema::from_json`]. Column types are
/// CQL type strings, key membership is given by name lists.
#[derive(Debug, Deserialize)]
struct SchemaDescriptor {
    keyspace: String,
    table: String,
    columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    partition_keys: Vec<String>,
    #[serde(default)]
    clustering_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ColumnDescriptor {
    name: String,
    #[serde(rename = "type")]
    type_string: String,
}

impl Schema {
    /// Validates on construction: at least one partition key, unique column
    /// names, and the columns ordered partition keys, then clustering keys,
    /// then regular columns.
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<ColumnDef>,
    ) -> Result<Self> {
        let schema = Self {
            keyspace: keyspace.into(),
            table: table.into(),
            columns,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json(descriptor: &str) -> Result<Self> {
        let descriptor: SchemaDescriptor = serde_json::from_str(descriptor)
            .map_err(|err| Error::new(ErrorCode::SchemaInvalid, err))?;

        let mut columns = Vec::with_capacity(descriptor.columns.len());
        for column in descriptor.columns {
            let kind = if descriptor.partition_keys.contains(&column.name) {
                ColumnKind::PartitionKey
            } else if descriptor.clustering_keys.contains(&column.name) {
                ColumnKind::Clustering
            } else {
                ColumnKind::Regular
            };
            columns.push(ColumnDef::new(
                column.name,
                parse_type_string(&column.type_string)?,
                kind,
            ));
        }
        // Keys take the order of the descriptor's key lists, regular columns
        // follow in declaration order.
        columns.sort_by_key(|c| match c.kind {
            ColumnKind::PartitionKey => {
                (0, descriptor.partition_keys.iter().position(|k| *k == c.name))
            }
            ColumnKind::Clustering => {
                (1, descriptor.clustering_keys.iter().position(|k| *k == c.name))
            }
            ColumnKind::Regular => (2, None),
        });

        Self::new(descriptor.keyspace, descriptor.table, columns)
    }

    fn validate(&self) -> Result<()> {
        if self.partition_keys().next().is_none() {
            return Err(Error::new(
                ErrorCode::SchemaInvalid,
                format!("table `{}` has no partition key", self.table),
            ));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(Error::new(
                    ErrorCode::SchemaInvalid,
                    format!("duplicate column `{}`", column.name),
                ));
            }
        }
        // Partition keys form a strict prefix, clustering keys follow them.
        let mut rank = 0;
        for column in &self.columns {
            let next = match column.kind {
                ColumnKind::PartitionKey => 0,
                ColumnKind::Clustering => 1,
                ColumnKind::Regular => 2,
            };
            if next < rank {
                return Err(Error::new(
                    ErrorCode::SchemaInvalid,
                    format!(
                        "column `{}` ({}) appears after non-key columns",
                        column.name, column.kind
                    ),
                ));
            }
            rank = next;
        }
        Ok(())
    }

    /// Resolve a user defined type by name everywhere it appears in the
    /// column types.
    pub fn register_udt(&mut self, name: &str, fields: Vec<(String, CqlType)>) {
        for column in &mut self.columns {
            resolve_udt(&mut column.cql_type, name, &fields);
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn partition_keys(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::PartitionKey)
    }

    pub fn clustering_keys(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Clustering)
    }

    /// Clustering and regular columns, the ones stored inside row bodies.
    pub fn row_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns
            .iter()
            .filter(|c| c.kind != ColumnKind::PartitionKey)
    }
}

fn resolve_udt(ty: &mut CqlType, name: &str, fields: &[(String, CqlType)]) {
    match ty {
        CqlType::Udt {
            name: ty_name,
            fields: ty_fields,
        } if ty_name == name && ty_fields.is_empty() => {
            *ty_fields = fields.to_vec();
        }
        CqlType::List(item) | CqlType::Set(item) => resolve_udt(item, name, fields),
        CqlType::Map(key, value) => {
            resolve_udt(key, name, fields);
            resolve_udt(value, name, fields);
        }
        CqlType::Tuple(items) => {
            for item in items {
                resolve_udt(item, name, fields);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql::NativeType;

    fn native(t: NativeType) -> CqlType {
        CqlType::Native(t)
    }

    #[test]
    fn requires_a_partition_key() {
        let err = Schema::new(
            "ks",
            "t",
            vec![ColumnDef::new(
                "a",
                native(NativeType::Int),
                ColumnKind::Regular,
            )],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaInvalid);
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = Schema::new(
            "ks",
            "t",
            vec![
                ColumnDef::new("a", native(NativeType::Int), ColumnKind::PartitionKey),
                ColumnDef::new("a", native(NativeType::Text), ColumnKind::Regular),
            ],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaInvalid);
    }

    #[test]
    fn rejects_keys_after_regular_columns() {
        let err = Schema::new(
            "ks",
            "t",
            vec![
                ColumnDef::new("pk", native(NativeType::Uuid), ColumnKind::PartitionKey),
                ColumnDef::new("v", native(NativeType::Int), ColumnKind::Regular),
                ColumnDef::new("ck", native(NativeType::Int), ColumnKind::Clustering),
            ],
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaInvalid);
    }

    #[test]
    fn loads_from_json_descriptor() {
        let schema = Schema::from_json(
            r#"{
                "keyspace": "shop",
                "table": "orders",
                "columns": [
                    {"name": "total", "type": "decimal"},
                    {"name": "id", "type": "uuid"},
                    {"name": "created", "type": "timestamp"},
                    {"name": "items", "type": "list<text>"}
                ],
                "partition_keys": ["id"],
                "clustering_keys": ["created"]
            }"#,
        )
        .unwrap();

        assert_eq!(schema.keyspace, "shop");
        assert_eq!(schema.columns[0].name, "id");
        assert_eq!(schema.columns[0].kind, ColumnKind::PartitionKey);
        assert_eq!(schema.columns[1].name, "created");
        assert_eq!(schema.columns[1].kind, ColumnKind::Clustering);
        assert_eq!(
            schema.column("items").unwrap().cql_type,
            CqlType::List(Box::new(native(NativeType::Text)))
        );
    }

    #[test]
    fn bad_descriptor_type_string_fails() {
        let err = Schema::from_json(
            r#"{
                "keyspace": "ks", "table": "t",
                "columns": [{"name": "id", "type": "list<"}],
                "partition_keys": ["id"]
            }"#,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaInvalid);
    }

    #[test]
    fn registers_udt_definitions_recursively() {
        let mut schema = Schema::new(
            "ks",
            "t",
            vec![
                ColumnDef::new("id", native(NativeType::Uuid), ColumnKind::PartitionKey),
                ColumnDef::new(
                    "addresses",
                    CqlType::List(Box::new(CqlType::Udt {
                        name: "address".into(),
                        fields: vec![],
                    })),
                    ColumnKind::Regular,
                ),
            ],
        )
        .unwrap();

        schema.register_udt(
            "address",
            vec![("street".into(), native(NativeType::Text))],
        );

        let CqlType::List(inner) = &schema.column("addresses").unwrap().cql_type else {
            panic!("expected a list");
        };
        let CqlType::Udt { fields, .. } = inner.as_ref() else {
            panic!("expected a udt");
        };
        assert_eq!(fields.len(), 1);
    }
}
