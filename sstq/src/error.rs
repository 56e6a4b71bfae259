use serde::Serialize;
use thiserror::Error as ThisError;

/// Machine readable error codes, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    NotFound,
    InvalidExtension,
    Corrupt,
    MissingCompanion,
    MalformedVInt,
    SyntaxError,
    ReadOnlyViolation,
    UnknownColumn,
    UnknownTable,
    InvalidCondition,
    SchemaMissing,
    SchemaInvalid,
    InvalidTemporalValue,
    TypeMismatch,
    Timeout,
    Internal,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::NotFound => 0x0100,
            ErrorCode::InvalidExtension => 0x0101,
            ErrorCode::Corrupt => 0x0102,
            ErrorCode::MissingCompanion => 0x0103,
            ErrorCode::MalformedVInt => 0x0104,
            ErrorCode::SyntaxError => 0x0200,
            ErrorCode::ReadOnlyViolation => 0x0201,
            ErrorCode::UnknownColumn => 0x0202,
            ErrorCode::UnknownTable => 0x0203,
            ErrorCode::InvalidCondition => 0x0204,
            ErrorCode::SchemaMissing => 0x0300,
            ErrorCode::SchemaInvalid => 0x0301,
            ErrorCode::InvalidTemporalValue => 0x0400,
            ErrorCode::TypeMismatch => 0x0401,
            ErrorCode::Timeout => 0x0500,
            ErrorCode::Internal => 0x0000,
        }
    }
}

#[derive(ThisError, Debug, Clone)]
#[error("[{code:?}] {reason}")]
pub struct Error {
    pub code: ErrorCode,
    pub reason: String,
}

impl Error {
    pub fn new(code: ErrorCode, reason: impl ToString) -> Self {
        Self {
            code,
            reason: reason.to_string(),
        }
    }

    /// Query errors carry the offending statement and, where determinable,
    /// a character position.
    pub fn query(reason: impl AsRef<str>, sql: &str, position: Option<usize>) -> Self {
        let reason = match position {
            Some(at) => format!("{} at position {at} in query `{sql}`", reason.as_ref()),
            None => format!("{} in query `{sql}`", reason.as_ref()),
        };
        Self::new(ErrorCode::SyntaxError, reason)
    }

    pub fn corrupt(reason: impl ToString) -> Self {
        Self::new(ErrorCode::Corrupt, reason)
    }

    pub fn type_mismatch(value: impl std::fmt::Debug, ty: impl std::fmt::Debug) -> Self {
        Self::new(
            ErrorCode::TypeMismatch,
            format!("value {value:?} is not valid for type {ty:?}"),
        )
    }

    pub fn is_query_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::SyntaxError
                | ErrorCode::ReadOnlyViolation
                | ErrorCode::UnknownColumn
                | ErrorCode::UnknownTable
                | ErrorCode::InvalidCondition
        )
    }
}

impl From<nom::Err<nom::error::Error<&str>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&str>>) -> Self {
        tracing::debug!(error = ?value, "query parsing error");
        Error::new(ErrorCode::SyntaxError, value.to_string())
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        tracing::debug!(error = ?value, "binary decoding error");
        Error::new(ErrorCode::Corrupt, format!("{value:?}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        let code = match value.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::NotFound,
            _ => ErrorCode::Internal,
        };
        Error::new(code, value)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
