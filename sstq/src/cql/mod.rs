//! CQL type system: type strings, runtime values and coercions.

pub mod convert;
pub mod literal;
pub mod types;
pub mod value;

pub use convert::convert_value;
pub use literal::Literal;
pub use types::{parse_type_string, CqlType, NativeType};
pub use value::CqlValue;
