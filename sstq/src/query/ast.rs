use derive_more::Display;
use serde::Serialize;

use crate::cql::literal::Literal;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Projection {
    All,
    /// Aliases are resolved at parse time, only source column names remain.
    Columns(Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Display)]
pub enum Operator {
    #[display(fmt = "=")]
    Eq,
    #[display(fmt = "!=")]
    Ne,
    #[display(fmt = "<")]
    Lt,
    #[display(fmt = "<=")]
    Le,
    #[display(fmt = ">")]
    Gt,
    #[display(fmt = ">=")]
    Ge,
    #[display(fmt = "IN")]
    In,
    #[display(fmt = "NOT IN")]
    NotIn,
    #[display(fmt = "LIKE")]
    Like,
    #[display(fmt = "CONTAINS")]
    Contains,
    #[display(fmt = "CONTAINS KEY")]
    ContainsKey,
}

/// One comparison. `values` holds a single literal except for IN / NOT IN,
/// which carry the whole candidate list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub values: Vec<Literal>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum WhereClause {
    Condition(Condition),
    And(Box<WhereClause>, Box<WhereClause>),
    Or(Box<WhereClause>, Box<WhereClause>),
}

impl WhereClause {
    /// Every column referenced anywhere in the tree.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            WhereClause::Condition(c) => vec![c.column.as_str()],
            WhereClause::And(a, b) | WhereClause::Or(a, b) => {
                let mut columns = a.columns();
                columns.extend(b.columns());
                columns
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Display)]
pub enum OrderDirection {
    #[default]
    #[display(fmt = "ASC")]
    Asc,
    #[display(fmt = "DESC")]
    Desc,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: OrderDirection,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedQuery {
    pub projection: Projection,
    pub table: String,
    pub where_clause: Option<WhereClause>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ParsedQuery {
    /// Override pagination without re-parsing the statement.
    pub fn with_limit_offset(mut self, limit: Option<usize>, offset: Option<usize>) -> Self {
        if limit.is_some() {
            self.limit = limit;
        }
        if offset.is_some() {
            self.offset = offset;
        }
        self
    }
}
