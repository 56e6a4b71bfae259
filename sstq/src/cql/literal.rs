use derive_more::From;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Loosely typed value as it appears in query text or raw user input,
/// before coercion against a column type.
#[derive(Clone, Debug, Default, PartialEq, From, Serialize, Deserialize)]
pub enum Literal {
    #[default]
    Null,
    Bool(bool),
    Number(i64),
    Float(f64),
    String(String),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    #[from(ignore)]
    List(Vec<Literal>),
    #[from(ignore)]
    Map(Vec<(Literal, Literal)>),
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Number(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "'{v}'"),
            Literal::Uuid(v) => write!(f, "{v}"),
            Literal::Bytes(v) => {
                write!(f, "0x")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Literal::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Literal::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
