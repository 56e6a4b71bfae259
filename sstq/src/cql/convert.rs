//! Coercion of loosely typed input into typed values.
//!
//! Rules mirror what the CQL shell tolerates: booleans accept a handful of
//! textual spellings, temporal types accept ISO-8601 text or numeric epochs,
//! blobs accept hex strings. Null input collapses to `Null` for scalars and
//! to the *empty* collection for list/set/map.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use num_bigint::BigInt;
use uuid::Uuid;

use crate::{
    cql::{literal::Literal, types::CqlType, value::CqlValue, NativeType},
    error::{Error, ErrorCode, Result},
};

pub fn convert_value(literal: Literal, ty: &CqlType) -> Result<CqlValue> {
    if literal.is_null() {
        return Ok(match ty {
            CqlType::List(_) => CqlValue::List(vec![]),
            CqlType::Set(_) => CqlValue::Set(vec![]),
            CqlType::Map(..) => CqlValue::Map(vec![]),
            _ => CqlValue::Null,
        });
    }

    match ty {
        CqlType::Native(native) => convert_native(literal, *native),
        CqlType::List(item) => match literal {
            Literal::List(items) => Ok(CqlValue::List(convert_elements(items, item)?)),
            other => Err(Error::type_mismatch(other, ty)),
        },
        CqlType::Set(item) => match literal {
            Literal::List(items) => {
                let mut set: Vec<CqlValue> = Vec::new();
                for value in convert_elements(items, item)? {
                    if !set.contains(&value) {
                        set.push(value);
                    }
                }
                Ok(CqlValue::Set(set))
            }
            other => Err(Error::type_mismatch(other, ty)),
        },
        CqlType::Map(key_ty, value_ty) => match literal {
            Literal::Map(pairs) => {
                let mut map = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    map.push((convert_value(k, key_ty)?, convert_value(v, value_ty)?));
                }
                Ok(CqlValue::Map(map))
            }
            other => Err(Error::type_mismatch(other, ty)),
        },
        CqlType::Tuple(types) => match literal {
            Literal::List(items) => {
                let mut result = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    // Positions beyond the declared arity coerce as text.
                    let item_ty = types
                        .get(i)
                        .cloned()
                        .unwrap_or(CqlType::Native(NativeType::Text));
                    result.push(convert_value(item, &item_ty)?);
                }
                for _ in result.len()..types.len() {
                    result.push(CqlValue::Null);
                }
                Ok(CqlValue::Tuple(result))
            }
            other => Err(Error::type_mismatch(other, ty)),
        },
        CqlType::Udt { name, fields } => match literal {
            Literal::Map(pairs) => {
                let mut given: Vec<(String, Literal)> = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    match k {
                        Literal::String(k) => given.push((k, v)),
                        other => return Err(Error::type_mismatch(other, "udt field name")),
                    }
                }
                let mut result = Vec::with_capacity(fields.len());
                for (field_name, field_ty) in fields {
                    let value = match given.iter().position(|(k, _)| k == field_name) {
                        Some(at) => convert_value(given.swap_remove(at).1, field_ty)?,
                        None => CqlValue::Null,
                    };
                    result.push((field_name.clone(), value));
                }
                if let Some((unknown, _)) = given.first() {
                    return Err(Error::new(
                        ErrorCode::UnknownColumn,
                        format!("field `{unknown}` does not exist in type `{name}`"),
                    ));
                }
                Ok(CqlValue::Udt {
                    name: name.clone(),
                    fields: result,
                })
            }
            other => Err(Error::type_mismatch(other, ty)),
        },
    }
}

fn convert_elements(items: Vec<Literal>, item_ty: &CqlType) -> Result<Vec<CqlValue>> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let value = convert_value(item, item_ty)?;
        if !value.is_null() {
            result.push(value);
        }
    }
    Ok(result)
}

fn convert_native(literal: Literal, native: NativeType) -> Result<CqlValue> {
    match native {
        NativeType::Text | NativeType::Varchar => Ok(CqlValue::Text(into_text(literal)?)),
        NativeType::Ascii => {
            let s = into_text(literal)?;
            if !s.is_ascii() {
                return Err(Error::type_mismatch(s, native));
            }
            Ok(CqlValue::Ascii(s))
        }
        NativeType::Boolean => match literal {
            Literal::Bool(v) => Ok(CqlValue::Boolean(v)),
            Literal::Number(0) => Ok(CqlValue::Boolean(false)),
            Literal::Number(1) => Ok(CqlValue::Boolean(true)),
            Literal::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(CqlValue::Boolean(true)),
                "false" | "0" | "no" | "off" => Ok(CqlValue::Boolean(false)),
                _ => Err(Error::type_mismatch(s, native)),
            },
            other => Err(Error::type_mismatch(other, native)),
        },
        NativeType::Int => Ok(CqlValue::Int(into_int(literal, native)?)),
        NativeType::SmallInt => Ok(CqlValue::SmallInt(into_int(literal, native)?)),
        NativeType::TinyInt => Ok(CqlValue::TinyInt(into_int(literal, native)?)),
        NativeType::BigInt => Ok(CqlValue::BigInt(into_int(literal, native)?)),
        NativeType::Counter => Ok(CqlValue::Counter(into_int(literal, native)?)),
        NativeType::Float => match literal {
            Literal::Number(n) => Ok(CqlValue::Float((n as f32).to_bits())),
            Literal::Float(f) => Ok(CqlValue::Float((f as f32).to_bits())),
            other => Err(Error::type_mismatch(other, native)),
        },
        NativeType::Double => match literal {
            Literal::Number(n) => Ok(CqlValue::Double((n as f64).to_bits())),
            Literal::Float(f) => Ok(CqlValue::Double(f.to_bits())),
            other => Err(Error::type_mismatch(other, native)),
        },
        NativeType::Varint => match literal {
            Literal::Number(n) => Ok(CqlValue::Varint(BigInt::from(n))),
            Literal::String(s) => BigInt::from_str(s.trim())
                .map(CqlValue::Varint)
                .map_err(|_| Error::type_mismatch(s, native)),
            other => Err(Error::type_mismatch(other, native)),
        },
        NativeType::Decimal => match literal {
            Literal::Number(n) => Ok(CqlValue::Decimal(BigDecimal::from(n))),
            Literal::Float(f) => BigDecimal::try_from(f)
                .map(CqlValue::Decimal)
                .map_err(|_| Error::type_mismatch(f, native)),
            Literal::String(s) => BigDecimal::from_str(s.trim())
                .map(CqlValue::Decimal)
                .map_err(|_| Error::type_mismatch(s, native)),
            other => Err(Error::type_mismatch(other, native)),
        },
        NativeType::Blob => match literal {
            Literal::Bytes(v) => Ok(CqlValue::Blob(v)),
            Literal::String(s) => decode_hex(&s)
                .map(CqlValue::Blob)
                .ok_or_else(|| Error::type_mismatch(s, native)),
            other => Err(Error::type_mismatch(other, native)),
        },
        NativeType::Uuid => Ok(CqlValue::Uuid(into_uuid(literal, native)?)),
        NativeType::Timeuuid => Ok(CqlValue::Timeuuid(into_uuid(literal, native)?)),
        NativeType::Inet => match literal {
            Literal::String(s) => s
                .parse()
                .map(CqlValue::Inet)
                .map_err(|_| Error::type_mismatch(s, native)),
            other => Err(Error::type_mismatch(other, native)),
        },
        NativeType::Timestamp => convert_timestamp(literal),
        NativeType::Date => match literal {
            Literal::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(CqlValue::Date)
                .map_err(|_| temporal(&s, "expected YYYY-MM-DD")),
            other => Err(temporal(&other, "expected YYYY-MM-DD")),
        },
        NativeType::Time => match literal {
            Literal::String(s) => {
                let time = NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
                    .map_err(|_| temporal(&s, "expected HH:MM:SS"))?;
                Ok(CqlValue::Time(
                    time.num_seconds_from_midnight() as i64 * 1_000_000_000,
                ))
            }
            other => Err(temporal(&other, "expected HH:MM:SS")),
        },
    }
}

fn convert_timestamp(literal: Literal) -> Result<CqlValue> {
    match literal {
        Literal::Number(seconds) => seconds
            .checked_mul(1000)
            .map(CqlValue::Timestamp)
            .ok_or_else(|| temporal(&seconds, "epoch seconds out of range")),
        Literal::Float(seconds) => Ok(CqlValue::Timestamp((seconds * 1000.0).round() as i64)),
        Literal::String(s) => {
            let trimmed = s.trim();
            // RFC 3339 with a trailing Z normalized to an explicit offset.
            let normalized = match trimmed
                .strip_suffix('Z')
                .or_else(|| trimmed.strip_suffix('z'))
            {
                Some(stripped) => format!("{stripped}+00:00"),
                None => trimmed.to_string(),
            };
            if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
                return Ok(CqlValue::Timestamp(dt.timestamp_millis()));
            }
            for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                    return Ok(CqlValue::Timestamp(dt.and_utc().timestamp_millis()));
                }
            }
            Err(temporal(&s, "expected ISO-8601 or epoch seconds"))
        }
        other => Err(temporal(&other, "expected ISO-8601 or epoch seconds")),
    }
}

fn into_text(literal: Literal) -> Result<String> {
    match literal {
        Literal::String(s) => Ok(s),
        Literal::Number(n) => Ok(n.to_string()),
        Literal::Float(f) => Ok(f.to_string()),
        Literal::Bool(b) => Ok(b.to_string()),
        Literal::Uuid(u) => Ok(u.to_string()),
        other => Err(Error::type_mismatch(other, NativeType::Text)),
    }
}

fn into_int<T: TryFrom<i64>>(literal: Literal, native: NativeType) -> Result<T> {
    let n = match literal {
        Literal::Number(n) => n,
        Literal::String(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::type_mismatch(s, native))?,
        other => return Err(Error::type_mismatch(other, native)),
    };
    T::try_from(n).map_err(|_| Error::type_mismatch(n, native))
}

fn into_uuid(literal: Literal, native: NativeType) -> Result<Uuid> {
    match literal {
        Literal::Uuid(u) => Ok(u),
        Literal::String(s) => Uuid::from_str(s.trim()).map_err(|_| Error::type_mismatch(s, native)),
        other => Err(Error::type_mismatch(other, native)),
    }
}

fn temporal(value: &impl std::fmt::Debug, hint: &str) -> Error {
    Error::new(
        ErrorCode::InvalidTemporalValue,
        format!("invalid temporal value {value:?}, {hint}"),
    )
}

pub(crate) fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let s = s.trim().strip_prefix("0x").unwrap_or_else(|| s.trim());
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(s: &str) -> CqlType {
        crate::cql::types::parse_type_string(s).unwrap()
    }

    #[test]
    fn null_becomes_null_for_scalars() {
        for t in ["int", "text", "uuid", "timestamp", "decimal", "boolean"] {
            assert_eq!(convert_value(Literal::Null, &ty(t)).unwrap(), CqlValue::Null);
        }
    }

    #[test]
    fn null_becomes_empty_collection() {
        assert_eq!(
            convert_value(Literal::Null, &ty("list<text>")).unwrap(),
            CqlValue::List(vec![])
        );
        assert_eq!(
            convert_value(Literal::Null, &ty("set<int>")).unwrap(),
            CqlValue::Set(vec![])
        );
        assert_eq!(
            convert_value(Literal::Null, &ty("map<text, int>")).unwrap(),
            CqlValue::Map(vec![])
        );
    }

    #[test]
    fn boolean_spellings() {
        for s in ["true", "TRUE", "1", "yes", "On"] {
            assert_eq!(
                convert_value(Literal::String(s.into()), &ty("boolean")).unwrap(),
                CqlValue::Boolean(true),
                "{s}"
            );
        }
        for s in ["false", "0", "No", "off"] {
            assert_eq!(
                convert_value(Literal::String(s.into()), &ty("boolean")).unwrap(),
                CqlValue::Boolean(false),
                "{s}"
            );
        }
        let err = convert_value(Literal::String("maybe".into()), &ty("boolean")).unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);
    }

    #[test]
    fn blob_accepts_hex_strings() {
        assert_eq!(
            convert_value(Literal::String("0xDEADbeef".into()), &ty("blob")).unwrap(),
            CqlValue::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF])
        );
        assert_eq!(
            convert_value(Literal::String("cafe".into()), &ty("blob")).unwrap(),
            CqlValue::Blob(vec![0xCA, 0xFE])
        );
        assert!(convert_value(Literal::String("xyz".into()), &ty("blob")).is_err());
    }

    #[test]
    fn timestamp_accepts_iso_and_epoch() {
        let iso = convert_value(
            Literal::String("2023-11-14T22:13:20Z".into()),
            &ty("timestamp"),
        )
        .unwrap();
        assert_eq!(iso, CqlValue::Timestamp(1_700_000_000_000));

        let epoch = convert_value(Literal::Number(1_700_000_000), &ty("timestamp")).unwrap();
        assert_eq!(epoch, iso);

        let fractional =
            convert_value(Literal::Float(1_700_000_000.5), &ty("timestamp")).unwrap();
        assert_eq!(fractional, CqlValue::Timestamp(1_700_000_000_500));

        let err =
            convert_value(Literal::String("not a date".into()), &ty("timestamp")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTemporalValue);
    }

    #[test]
    fn epoch_seconds_out_of_range_are_rejected() {
        for n in [i64::MAX, i64::MIN, i64::MAX / 1000 + 1] {
            let err = convert_value(Literal::Number(n), &ty("timestamp")).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidTemporalValue, "{n}");
        }
        assert_eq!(
            convert_value(Literal::Number(i64::MAX / 1000), &ty("timestamp")).unwrap(),
            CqlValue::Timestamp(i64::MAX / 1000 * 1000)
        );
    }

    #[test]
    fn date_and_time_are_strict() {
        assert_eq!(
            convert_value(Literal::String("2024-02-29".into()), &ty("date")).unwrap(),
            CqlValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(convert_value(Literal::String("02/29/2024".into()), &ty("date")).is_err());

        assert_eq!(
            convert_value(Literal::String("01:02:03".into()), &ty("time")).unwrap(),
            CqlValue::Time(3_723 * 1_000_000_000)
        );
        assert!(convert_value(Literal::String("25:00:00".into()), &ty("time")).is_err());
    }

    #[test]
    fn integers_check_range() {
        assert_eq!(
            convert_value(Literal::Number(127), &ty("tinyint")).unwrap(),
            CqlValue::TinyInt(127)
        );
        let err = convert_value(Literal::Number(128), &ty("tinyint")).unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);
    }

    #[test]
    fn sets_deduplicate() {
        let literal = Literal::List(vec![
            Literal::Number(1),
            Literal::Number(2),
            Literal::Number(1),
        ]);
        assert_eq!(
            convert_value(literal, &ty("set<int>")).unwrap(),
            CqlValue::Set(vec![CqlValue::Int(1), CqlValue::Int(2)])
        );
    }

    #[test]
    fn tuple_extra_positions_default_to_text() {
        let literal = Literal::List(vec![
            Literal::Number(1),
            Literal::String("a".into()),
            Literal::Number(99),
        ]);
        assert_eq!(
            convert_value(literal, &ty("tuple<int, text>")).unwrap(),
            CqlValue::Tuple(vec![
                CqlValue::Int(1),
                CqlValue::Text("a".into()),
                CqlValue::Text("99".into()),
            ])
        );
    }

    #[test]
    fn conversion_is_idempotent_via_literal() {
        let cases = [
            ("int", CqlValue::Int(-7)),
            ("bigint", CqlValue::BigInt(1 << 40)),
            ("text", CqlValue::Text("abc".into())),
            ("boolean", CqlValue::Boolean(true)),
            ("double", CqlValue::Double(2.5f64.to_bits())),
            ("float", CqlValue::Float((-1.25f32).to_bits())),
            ("timestamp", CqlValue::Timestamp(1_700_000_000_250)),
            ("date", CqlValue::Date(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap())),
            ("time", CqlValue::Time(43_200 * 1_000_000_000)),
            ("uuid", CqlValue::Uuid(Uuid::from_u128(42))),
            ("blob", CqlValue::Blob(vec![1, 2, 3])),
            ("inet", CqlValue::Inet("192.168.0.1".parse().unwrap())),
            (
                "varint",
                CqlValue::Varint(BigInt::from_str("98765432109876543210").unwrap()),
            ),
            ("decimal", CqlValue::Decimal("3.14159".parse().unwrap())),
            (
                "list<int>",
                CqlValue::List(vec![CqlValue::Int(1), CqlValue::Int(2)]),
            ),
            (
                "map<text, int>",
                CqlValue::Map(vec![(CqlValue::Text("k".into()), CqlValue::Int(1))]),
            ),
        ];
        for (t, value) in cases {
            let converted = convert_value(value.to_literal(), &ty(t)).unwrap();
            assert_eq!(converted, value, "type {t}");
        }
    }
}
