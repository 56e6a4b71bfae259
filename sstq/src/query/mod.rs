//! SELECT-only query engine: text to AST, AST to a lazy row source.

pub mod ast;
pub mod exec;
pub mod iter;
pub mod parser;

pub use ast::{Condition, Operator, OrderBy, OrderDirection, ParsedQuery, Projection, WhereClause};
pub use exec::execute;
pub use iter::{Chunks, QueryIterator};
pub use parser::parse;
