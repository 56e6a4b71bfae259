use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate};
use derive_more::From;
use nom::{
    bytes::complete::take,
    number::complete::{be_f32, be_f64, be_i16, be_i32, be_i64, be_u128, be_u32},
    IResult,
};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    cql::{literal::Literal, types::CqlType, NativeType},
    error::{Error, ErrorCode, Result},
};

/// Raw date value 0 corresponds to 2^31 days before the unix epoch.
const DATE_EPOCH_OFFSET: i64 = 1 << 31;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, From)]
pub enum CqlValue {
    #[from(ignore)]
    Ascii(String),
    Boolean(bool),
    Blob(Vec<u8>),
    #[from(ignore)]
    Counter(i64),
    Decimal(BigDecimal),
    Date(NaiveDate),
    /// IEEE-754 bit pattern, kept as raw bits so the type stays `Eq` and
    /// `Hash`. Use [`CqlValue::compare`] for numeric ordering.
    #[from(ignore)]
    Double(u64),
    #[from(ignore)]
    Float(u32),
    Int(i32),
    BigInt(i64),
    SmallInt(i16),
    TinyInt(i8),
    Text(String),
    /// Milliseconds since unix epoch.
    #[from(ignore)]
    Timestamp(i64),
    /// Nanoseconds since midnight.
    #[from(ignore)]
    Time(i64),
    Inet(IpAddr),
    List(Vec<CqlValue>),
    Map(Vec<(CqlValue, CqlValue)>),
    #[from(ignore)]
    Set(Vec<CqlValue>),
    #[from(ignore)]
    Tuple(Vec<CqlValue>),
    Udt {
        name: String,
        fields: Vec<(String, CqlValue)>,
    },
    #[from(ignore)]
    Timeuuid(Uuid),
    Uuid(Uuid),
    Varint(BigInt),
    #[default]
    #[from(types(()))]
    Null,
}

impl CqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CqlValue::Null)
    }

    /// Ordering aware of the IEEE bit-pattern storage of Float/Double.
    /// Everything else falls back to the derived `Ord`.
    pub fn compare(&self, other: &CqlValue) -> std::cmp::Ordering {
        match (self, other) {
            (CqlValue::Float(a), CqlValue::Float(b)) => {
                f32::from_bits(*a).total_cmp(&f32::from_bits(*b))
            }
            (CqlValue::Double(a), CqlValue::Double(b)) => {
                f64::from_bits(*a).total_cmp(&f64::from_bits(*b))
            }
            _ => self.cmp(other),
        }
    }

    /// Loosely typed rendition, the inverse of
    /// [`convert_value`](crate::cql::convert::convert_value).
    pub fn to_literal(&self) -> Literal {
        match self {
            CqlValue::Null => Literal::Null,
            CqlValue::Boolean(v) => Literal::Bool(*v),
            CqlValue::Int(v) => Literal::Number(*v as i64),
            CqlValue::SmallInt(v) => Literal::Number(*v as i64),
            CqlValue::TinyInt(v) => Literal::Number(*v as i64),
            CqlValue::BigInt(v) | CqlValue::Counter(v) => Literal::Number(*v),
            CqlValue::Varint(v) => Literal::String(v.to_string()),
            CqlValue::Decimal(v) => Literal::String(v.to_string()),
            CqlValue::Float(bits) => Literal::Float(f32::from_bits(*bits) as f64),
            CqlValue::Double(bits) => Literal::Float(f64::from_bits(*bits)),
            CqlValue::Ascii(v) | CqlValue::Text(v) => Literal::String(v.clone()),
            CqlValue::Blob(v) => Literal::Bytes(v.clone()),
            CqlValue::Timestamp(ms) => Literal::Float(*ms as f64 / 1000.0),
            CqlValue::Date(d) => Literal::String(d.format("%Y-%m-%d").to_string()),
            CqlValue::Time(ns) => {
                let seconds = ns / 1_000_000_000;
                Literal::String(format!(
                    "{:02}:{:02}:{:02}",
                    seconds / 3600,
                    seconds / 60 % 60,
                    seconds % 60
                ))
            }
            CqlValue::Inet(addr) => Literal::String(addr.to_string()),
            CqlValue::Uuid(v) | CqlValue::Timeuuid(v) => Literal::Uuid(*v),
            CqlValue::List(items) | CqlValue::Set(items) | CqlValue::Tuple(items) => {
                Literal::List(items.iter().map(CqlValue::to_literal).collect())
            }
            CqlValue::Map(pairs) => Literal::Map(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_literal(), v.to_literal()))
                    .collect(),
            ),
            CqlValue::Udt { fields, .. } => Literal::Map(
                fields
                    .iter()
                    .map(|(name, v)| (Literal::String(name.clone()), v.to_literal()))
                    .collect(),
            ),
        }
    }
}

/// Length-framed optional value inside collections and tuples: a negative
/// 4-byte length marks null.
fn bytes_opt(input: &[u8]) -> IResult<&[u8], Option<&[u8]>> {
    let (rest, len) = be_i32(input)?;
    if len < 0 {
        return Ok((rest, None));
    }
    let (rest, bytes) = take(len as usize)(rest)?;
    Ok((rest, Some(bytes)))
}

fn opt_deserialize_value<'a>(
    data: &'a [u8],
    ty: &CqlType,
) -> Result<(Option<CqlValue>, &'a [u8])> {
    let (rest, bytes) = bytes_opt(data)?;
    let value = bytes.map(|it| deserialize_value(it, ty)).transpose()?;
    Ok((value, rest))
}

/// Decode one cell's content bytes according to its column type.
pub fn deserialize_value(data: &[u8], ty: &CqlType) -> Result<CqlValue> {
    match ty {
        CqlType::Native(native) => deserialize_native(data, *native),
        CqlType::List(item) => {
            let (mut data, count) = be_u32::<_, nom::error::Error<_>>(data)?;
            let mut list = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (value, rest) = opt_deserialize_value(data, item)?;
                if let Some(it) = value {
                    list.push(it);
                }
                data = rest;
            }
            Ok(CqlValue::List(list))
        }
        CqlType::Set(item) => {
            let (mut data, count) = be_u32::<_, nom::error::Error<_>>(data)?;
            let mut set = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (value, rest) = opt_deserialize_value(data, item)?;
                if let Some(it) = value {
                    set.push(it);
                }
                data = rest;
            }
            Ok(CqlValue::Set(set))
        }
        CqlType::Map(key_ty, value_ty) => {
            let (mut data, count) = be_u32::<_, nom::error::Error<_>>(data)?;
            let mut map = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (key, rest) = opt_deserialize_value(data, key_ty)?;
                let (value, rest) = opt_deserialize_value(rest, value_ty)?;
                data = rest;
                if let Some((key, value)) = Option::zip(key, value) {
                    map.push((key, value));
                }
            }
            Ok(CqlValue::Map(map))
        }
        CqlType::Tuple(types) => {
            let mut result = Vec::with_capacity(types.len());
            let mut rest = data;
            for item_ty in types {
                let (value, r) = opt_deserialize_value(rest, item_ty)?;
                result.push(value.unwrap_or_default());
                rest = r;
            }
            Ok(CqlValue::Tuple(result))
        }
        CqlType::Udt { name, fields } => {
            if fields.is_empty() {
                return Err(Error::new(
                    ErrorCode::SchemaMissing,
                    format!("user defined type `{name}` has no registered definition"),
                ));
            }
            let mut result = Vec::with_capacity(fields.len());
            let mut rest = data;
            for (field_name, field_ty) in fields {
                let (value, r) = opt_deserialize_value(rest, field_ty)?;
                result.push((field_name.clone(), value.unwrap_or_default()));
                rest = r;
            }
            Ok(CqlValue::Udt {
                name: name.clone(),
                fields: result,
            })
        }
    }
}

fn deserialize_native(data: &[u8], native: NativeType) -> Result<CqlValue> {
    match native {
        NativeType::Ascii => {
            let s = std::str::from_utf8(data)
                .map_err(|_| Error::corrupt("ascii cell is not valid utf-8"))?;
            Ok(CqlValue::Ascii(s.to_string()))
        }
        NativeType::Text | NativeType::Varchar => {
            Ok(CqlValue::Text(String::from_utf8_lossy(data).into()))
        }
        NativeType::Boolean => {
            let (_, byte) = take::<_, _, nom::error::Error<_>>(1usize)(data)?;
            Ok(CqlValue::Boolean(byte[0] != 0))
        }
        NativeType::Blob => Ok(CqlValue::Blob(data.to_vec())),
        NativeType::Int => {
            let (_, v) = be_i32::<_, nom::error::Error<_>>(data)?;
            Ok(CqlValue::Int(v))
        }
        NativeType::BigInt => {
            let (_, v) = be_i64::<_, nom::error::Error<_>>(data)?;
            Ok(CqlValue::BigInt(v))
        }
        NativeType::Counter => {
            let (_, v) = be_i64::<_, nom::error::Error<_>>(data)?;
            Ok(CqlValue::Counter(v))
        }
        NativeType::SmallInt => {
            let (_, v) = be_i16::<_, nom::error::Error<_>>(data)?;
            Ok(CqlValue::SmallInt(v))
        }
        NativeType::TinyInt => {
            let (_, byte) = take::<_, _, nom::error::Error<_>>(1usize)(data)?;
            Ok(CqlValue::TinyInt(byte[0] as i8))
        }
        NativeType::Float => {
            let (_, v) = be_f32::<_, nom::error::Error<_>>(data)?;
            Ok(CqlValue::Float(v.to_bits()))
        }
        NativeType::Double => {
            let (_, v) = be_f64::<_, nom::error::Error<_>>(data)?;
            Ok(CqlValue::Double(v.to_bits()))
        }
        NativeType::Timestamp => {
            let (_, v) = be_i64::<_, nom::error::Error<_>>(data)?;
            Ok(CqlValue::Timestamp(v))
        }
        NativeType::Date => {
            let (_, raw) = be_u32::<_, nom::error::Error<_>>(data)?;
            let days = raw as i64 - DATE_EPOCH_OFFSET;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .ok_or_else(|| Error::corrupt("invalid epoch"))?;
            let date = epoch
                .checked_add_signed(Duration::days(days))
                .ok_or_else(|| Error::corrupt(format!("date cell out of range: {raw}")))?;
            Ok(CqlValue::Date(date))
        }
        NativeType::Time => {
            let (_, v) = be_i64::<_, nom::error::Error<_>>(data)?;
            Ok(CqlValue::Time(v))
        }
        NativeType::Uuid => {
            let (_, v) = be_u128::<_, nom::error::Error<_>>(data)?;
            Ok(CqlValue::Uuid(Uuid::from_u128(v)))
        }
        NativeType::Timeuuid => {
            let (_, v) = be_u128::<_, nom::error::Error<_>>(data)?;
            Ok(CqlValue::Timeuuid(Uuid::from_u128(v)))
        }
        NativeType::Inet => match data.len() {
            4 => {
                let (_, a) = be_u32::<_, nom::error::Error<_>>(data)?;
                Ok(CqlValue::Inet(IpAddr::V4(Ipv4Addr::from(a))))
            }
            16 => {
                let (_, a) = be_u128::<_, nom::error::Error<_>>(data)?;
                Ok(CqlValue::Inet(IpAddr::V6(Ipv6Addr::from(a))))
            }
            n => Err(Error::corrupt(format!(
                "inet cell must be 4 or 16 bytes, got {n}"
            ))),
        },
        NativeType::Varint => Ok(CqlValue::Varint(BigInt::from_signed_bytes_be(data))),
        NativeType::Decimal => {
            let (rest, scale) = be_i32::<_, nom::error::Error<_>>(data)?;
            let unscaled = BigInt::from_signed_bytes_be(rest);
            Ok(CqlValue::Decimal(BigDecimal::new(unscaled, scale as i64)))
        }
    }
}

/// Encode a value back into cell content bytes, the inverse of
/// [`deserialize_value`]. Used by the fixture writer and kept total over
/// every variant so round-trip tests can cover the whole type system.
pub fn serialize_value(value: &CqlValue, out: &mut Vec<u8>) {
    match value {
        CqlValue::Null => {}
        CqlValue::Ascii(s) | CqlValue::Text(s) => out.extend_from_slice(s.as_bytes()),
        CqlValue::Boolean(v) => out.push(*v as u8),
        CqlValue::Blob(v) => out.extend_from_slice(v),
        CqlValue::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
        CqlValue::BigInt(v) | CqlValue::Counter(v) => out.extend_from_slice(&v.to_be_bytes()),
        CqlValue::SmallInt(v) => out.extend_from_slice(&v.to_be_bytes()),
        CqlValue::TinyInt(v) => out.push(*v as u8),
        CqlValue::Float(bits) => out.extend_from_slice(&bits.to_be_bytes()),
        CqlValue::Double(bits) => out.extend_from_slice(&bits.to_be_bytes()),
        CqlValue::Timestamp(v) | CqlValue::Time(v) => out.extend_from_slice(&v.to_be_bytes()),
        CqlValue::Date(d) => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
            let days = d.signed_duration_since(epoch).num_days();
            out.extend_from_slice(&((days + DATE_EPOCH_OFFSET) as u32).to_be_bytes());
        }
        CqlValue::Uuid(v) | CqlValue::Timeuuid(v) => {
            out.extend_from_slice(&v.as_u128().to_be_bytes())
        }
        CqlValue::Inet(IpAddr::V4(a)) => out.extend_from_slice(&a.octets()),
        CqlValue::Inet(IpAddr::V6(a)) => out.extend_from_slice(&a.octets()),
        CqlValue::Varint(v) => out.extend_from_slice(&v.to_signed_bytes_be()),
        CqlValue::Decimal(v) => {
            let (unscaled, scale) = v.as_bigint_and_exponent();
            out.extend_from_slice(&(scale as i32).to_be_bytes());
            out.extend_from_slice(&unscaled.to_signed_bytes_be());
        }
        CqlValue::List(items) | CqlValue::Set(items) => {
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                serialize_framed(item, out);
            }
        }
        CqlValue::Map(pairs) => {
            out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
            for (k, v) in pairs {
                serialize_framed(k, out);
                serialize_framed(v, out);
            }
        }
        CqlValue::Tuple(items) => {
            for item in items {
                serialize_framed(item, out);
            }
        }
        CqlValue::Udt { fields, .. } => {
            for (_, v) in fields {
                serialize_framed(v, out);
            }
        }
    }
}

fn serialize_framed(value: &CqlValue, out: &mut Vec<u8>) {
    if value.is_null() {
        out.extend_from_slice(&(-1i32).to_be_bytes());
        return;
    }
    let mut content = Vec::new();
    serialize_value(value, &mut content);
    out.extend_from_slice(&(content.len() as i32).to_be_bytes());
    out.extend_from_slice(&content);
}
