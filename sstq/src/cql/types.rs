use std::str::FromStr;

use nom::{
    bytes::complete::{tag, take_while},
    character::is_alphanumeric,
    error::ErrorKind,
    multi::separated_list1,
    sequence::terminated,
    IResult,
};
use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::{
    error::{Error, ErrorCode, Result},
    parse::{identifier, ws},
};

type ParseResult<'a, T> = IResult<&'a str, T, nom::error::Error<&'a str>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NativeType {
    Ascii,
    Boolean,
    Blob,
    Counter,
    Date,
    Decimal,
    Double,
    Float,
    Int,
    BigInt,
    Text,
    Varchar,
    Timestamp,
    Inet,
    SmallInt,
    TinyInt,
    Time,
    Timeuuid,
    Uuid,
    Varint,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CqlType {
    Native(NativeType),
    List(Box<CqlType>),
    Set(Box<CqlType>),
    Map(Box<CqlType>, Box<CqlType>),
    Tuple(Vec<CqlType>),
    /// Fields are empty until the schema registry resolves the definition.
    Udt {
        name: String,
        fields: Vec<(String, CqlType)>,
    },
}

impl CqlType {
    pub fn is_collection(&self) -> bool {
        matches!(self, CqlType::List(_) | CqlType::Set(_) | CqlType::Map(..))
    }
}

impl std::fmt::Display for CqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CqlType::Native(n) => {
                let tag: &'static str = n.into();
                write!(f, "{tag}")
            }
            CqlType::List(item) => write!(f, "list<{item}>"),
            CqlType::Set(item) => write!(f, "set<{item}>"),
            CqlType::Map(key, value) => write!(f, "map<{key}, {value}>"),
            CqlType::Tuple(items) => {
                write!(f, "tuple<")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ">")
            }
            CqlType::Udt { name, .. } => write!(f, "{name}"),
        }
    }
}

impl From<&NativeType> for &'static str {
    fn from(value: &NativeType) -> Self {
        match value {
            NativeType::Ascii => "ascii",
            NativeType::Boolean => "boolean",
            NativeType::Blob => "blob",
            NativeType::Counter => "counter",
            NativeType::Date => "date",
            NativeType::Decimal => "decimal",
            NativeType::Double => "double",
            NativeType::Float => "float",
            NativeType::Int => "int",
            NativeType::BigInt => "bigint",
            NativeType::Text => "text",
            NativeType::Varchar => "varchar",
            NativeType::Timestamp => "timestamp",
            NativeType::Inet => "inet",
            NativeType::SmallInt => "smallint",
            NativeType::TinyInt => "tinyint",
            NativeType::Time => "time",
            NativeType::Timeuuid => "timeuuid",
            NativeType::Uuid => "uuid",
            NativeType::Varint => "varint",
        }
    }
}

/// Parse a full CQL type string, e.g. `map<text, frozen<list<int>>>`.
/// Trailing garbage and malformed nesting fail with `SchemaInvalid`.
pub fn parse_type_string(input: &str) -> Result<CqlType> {
    let trimmed = input.trim();
    let (rest, typ) = parse_cql_type(trimmed).map_err(|_| invalid(input))?;
    if !rest.trim().is_empty() {
        return Err(invalid(input));
    }
    Ok(typ)
}

fn invalid(input: &str) -> Error {
    Error::new(ErrorCode::SchemaInvalid, format!("invalid cql type `{input}`"))
}

pub fn parse_cql_type(p: &str) -> ParseResult<CqlType> {
    if let Ok((p, _)) = tag::<_, _, nom::error::Error<_>>("frozen<")(p) {
        // Frozen-ness does not change how cells decode, unwrap it.
        let (p, inner) = parse_cql_type(p)?;
        let (p, _) = tag(">")(p)?;
        Ok((p, inner))
    } else if let Ok((p, _)) = tag::<_, _, nom::error::Error<_>>("map<")(p) {
        let (p, key) = terminated(parse_cql_type, ws(tag(",")))(p)?;
        let (p, value) = parse_cql_type(p)?;
        let (p, _) = tag(">")(p)?;
        Ok((p, CqlType::Map(Box::new(key), Box::new(value))))
    } else if let Ok((p, _)) = tag::<_, _, nom::error::Error<_>>("list<")(p) {
        let (p, item) = parse_cql_type(p)?;
        let (p, _) = tag(">")(p)?;
        Ok((p, CqlType::List(Box::new(item))))
    } else if let Ok((p, _)) = tag::<_, _, nom::error::Error<_>>("set<")(p) {
        let (p, item) = parse_cql_type(p)?;
        let (p, _) = tag(">")(p)?;
        Ok((p, CqlType::Set(Box::new(item))))
    } else if let Ok((p, _)) = tag::<_, _, nom::error::Error<_>>("tuple<")(p) {
        let (p, items) = separated_list1(ws(tag(",")), parse_cql_type)(p)?;
        let (p, _) = tag(">")(p)?;
        Ok((p, CqlType::Tuple(items)))
    } else if let Ok((p, typ)) = parse_native_type(p) {
        Ok((p, CqlType::Native(typ)))
    } else {
        let (p, name) = parse_user_defined_type(p)?;
        Ok((
            p,
            CqlType::Udt {
                name: name.to_string(),
                fields: vec![],
            },
        ))
    }
}

fn parse_native_type(p: &str) -> ParseResult<NativeType> {
    let (p, tok) = identifier(p)?;
    let typ = NativeType::from_str(&tok)
        .map_err(|_| nom::Err::Error(nom::error::make_error(p, ErrorKind::Tag)))?;
    Ok((p, typ))
}

fn parse_user_defined_type(p: &str) -> ParseResult<&str> {
    // Java identifiers allow letters, underscores and dollar signs at any
    // position and digits in non-first position. Dots appear in fully
    // qualified names.
    let (p, tok) = take_while(|c| is_alphanumeric(c as u8) || c == '.' || c == '_' || c == '$')(p)?;

    if tok.is_empty() {
        return Err(nom::Err::Error(nom::error::make_error(p, ErrorKind::Tag)));
    }
    Ok((p, tok))
}
