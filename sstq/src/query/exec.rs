//! Query compilation and per-row evaluation.
//!
//! Conditions are type-checked and their literals coerced against the schema
//! *before* any row is read, so an unknown column or a mistyped literal fails
//! the query up front instead of halfway through a scan.

use crate::{
    cql::{convert::convert_value, literal::Literal, types::CqlType, value::CqlValue},
    error::{Error, ErrorCode, Result},
    query::ast::{Condition, Operator, OrderBy, ParsedQuery, Projection, WhereClause},
    query::iter::QueryIterator,
    schema::Schema,
    sstable::data::{Row, Scan},
};

#[derive(Debug, Clone)]
pub(crate) enum CompiledClause {
    Condition(CompiledCondition),
    And(Box<CompiledClause>, Box<CompiledClause>),
    Or(Box<CompiledClause>, Box<CompiledClause>),
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledCondition {
    pub column: String,
    pub operator: Operator,
    /// Literals coerced to the type they are compared against.
    pub values: Vec<CqlValue>,
    /// LIKE keeps its raw pattern instead of a coerced value.
    pub pattern: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct QueryPlan {
    pub filter: Option<CompiledClause>,
    pub projection: Projection,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Turn a parsed query into a lazy row source over one scan.
pub fn execute(query: ParsedQuery, schema: &Schema, scan: Scan) -> Result<QueryIterator> {
    if let Projection::Columns(columns) = &query.projection {
        for column in columns {
            require_column(schema, column)?;
        }
    }
    for order in &query.order_by {
        require_column(schema, &order.column)?;
    }
    let filter = query
        .where_clause
        .as_ref()
        .map(|clause| compile_clause(clause, schema))
        .transpose()?;

    let plan = QueryPlan {
        filter,
        projection: query.projection,
        order_by: query.order_by,
        limit: query.limit,
        offset: query.offset.unwrap_or(0),
    };
    Ok(QueryIterator::new(scan, plan))
}

fn require_column<'a>(schema: &'a Schema, name: &str) -> Result<&'a crate::schema::ColumnDef> {
    schema.column(name).ok_or_else(|| {
        Error::new(
            ErrorCode::UnknownColumn,
            format!("column `{name}` does not exist in table `{}`", schema.table),
        )
    })
}

fn compile_clause(clause: &WhereClause, schema: &Schema) -> Result<CompiledClause> {
    Ok(match clause {
        WhereClause::Condition(c) => CompiledClause::Condition(compile_condition(c, schema)?),
        WhereClause::And(a, b) => CompiledClause::And(
            Box::new(compile_clause(a, schema)?),
            Box::new(compile_clause(b, schema)?),
        ),
        WhereClause::Or(a, b) => CompiledClause::Or(
            Box::new(compile_clause(a, schema)?),
            Box::new(compile_clause(b, schema)?),
        ),
    })
}

fn compile_condition(condition: &Condition, schema: &Schema) -> Result<CompiledCondition> {
    let column = require_column(schema, &condition.column)?;
    let ty = &column.cql_type;

    let mut compiled = CompiledCondition {
        column: condition.column.clone(),
        operator: condition.operator,
        values: vec![],
        pattern: None,
    };

    match condition.operator {
        Operator::Like => match condition.values.first() {
            Some(Literal::String(pattern)) => compiled.pattern = Some(pattern.clone()),
            other => {
                return Err(Error::new(
                    ErrorCode::InvalidCondition,
                    format!("LIKE needs a string pattern, got {other:?}"),
                ))
            }
        },
        Operator::Contains => {
            let element_ty = match ty {
                CqlType::List(item) | CqlType::Set(item) => item.as_ref(),
                CqlType::Map(_, value) => value.as_ref(),
                other => return Err(not_a_collection(&condition.column, other)),
            };
            compiled.values = convert_all(&condition.values, element_ty)?;
        }
        Operator::ContainsKey => {
            let key_ty = match ty {
                CqlType::Map(key, _) => key.as_ref(),
                other => return Err(not_a_collection(&condition.column, other)),
            };
            compiled.values = convert_all(&condition.values, key_ty)?;
        }
        _ => compiled.values = convert_all(&condition.values, ty)?,
    }
    Ok(compiled)
}

fn convert_all(literals: &[Literal], ty: &CqlType) -> Result<Vec<CqlValue>> {
    literals
        .iter()
        .map(|lit| convert_value(lit.clone(), ty))
        .collect()
}

fn not_a_collection(column: &str, ty: &CqlType) -> Error {
    Error::new(
        ErrorCode::InvalidCondition,
        format!("CONTAINS requires a collection column, `{column}` is {ty}"),
    )
}

/// Short-circuiting AND/OR evaluation. A null cell matches no condition.
pub(crate) fn eval_clause(clause: &CompiledClause, row: &Row) -> bool {
    match clause {
        CompiledClause::Condition(c) => eval_condition(c, row),
        CompiledClause::And(a, b) => eval_clause(a, row) && eval_clause(b, row),
        CompiledClause::Or(a, b) => eval_clause(a, row) || eval_clause(b, row),
    }
}

fn eval_condition(condition: &CompiledCondition, row: &Row) -> bool {
    let Some(value) = row.get(&condition.column) else {
        return false;
    };
    if value.is_null() {
        return false;
    }
    let expected = condition.values.first();

    match condition.operator {
        Operator::Eq => expected == Some(value),
        Operator::Ne => expected.is_some() && expected != Some(value),
        Operator::Lt => ordering_matches(value, expected, |o| o.is_lt()),
        Operator::Le => ordering_matches(value, expected, |o| o.is_le()),
        Operator::Gt => ordering_matches(value, expected, |o| o.is_gt()),
        Operator::Ge => ordering_matches(value, expected, |o| o.is_ge()),
        Operator::In => condition.values.contains(value),
        Operator::NotIn => !condition.values.contains(value),
        Operator::Like => match (value, condition.pattern.as_deref()) {
            (CqlValue::Text(s) | CqlValue::Ascii(s), Some(pattern)) => like_match(pattern, s),
            _ => false,
        },
        Operator::Contains => match value {
            CqlValue::List(items) | CqlValue::Set(items) => {
                expected.is_some_and(|e| items.contains(e))
            }
            CqlValue::Map(pairs) => expected.is_some_and(|e| pairs.iter().any(|(_, v)| v == e)),
            _ => false,
        },
        Operator::ContainsKey => match value {
            CqlValue::Map(pairs) => expected.is_some_and(|e| pairs.iter().any(|(k, _)| k == e)),
            _ => false,
        },
    }
}

fn ordering_matches(
    value: &CqlValue,
    expected: Option<&CqlValue>,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    expected.is_some_and(|e| accept(value.compare(e)))
}

/// Anchored `%`/`_` wildcard match over characters. No escape syntax: a
/// literal percent sign cannot be matched.
pub(crate) fn like_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if let Some((star, mark)) = backtrack {
            // Let the last wildcard absorb one more character.
            backtrack = Some((star, mark + 1));
            pi = star + 1;
            ti = mark + 1;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}

pub(crate) fn project(row: &Row, projection: &Projection) -> Row {
    match projection {
        Projection::All => row.clone(),
        Projection::Columns(columns) => columns
            .iter()
            .map(|c| (c.clone(), row.get(c).cloned().unwrap_or_default()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards() {
        assert!(like_match("a%", "abc"));
        assert!(like_match("%c", "abc"));
        assert!(like_match("a_c", "abc"));
        assert!(like_match("%b%", "abc"));
        assert!(like_match("abc", "abc"));
        assert!(like_match("%", ""));
        assert!(!like_match("a_", "abc"));
        assert!(!like_match("b%", "abc"));
        assert!(!like_match("", "abc"));
        assert!(like_match("a%z%c", "azzc"));
    }

    #[test]
    fn null_cells_match_nothing() {
        let condition = CompiledCondition {
            column: "a".into(),
            operator: Operator::Ne,
            values: vec![CqlValue::Int(1)],
            pattern: None,
        };
        let mut row = Row::new();
        row.insert("a".into(), CqlValue::Null);
        assert!(!eval_condition(&condition, &row));
    }

    #[test]
    fn contains_checks_map_values_and_keys() {
        let mut row = Row::new();
        row.insert(
            "attrs".into(),
            CqlValue::Map(vec![(
                CqlValue::Text("color".into()),
                CqlValue::Text("red".into()),
            )]),
        );

        let contains = CompiledCondition {
            column: "attrs".into(),
            operator: Operator::Contains,
            values: vec![CqlValue::Text("red".into())],
            pattern: None,
        };
        let contains_key = CompiledCondition {
            column: "attrs".into(),
            operator: Operator::ContainsKey,
            values: vec![CqlValue::Text("color".into())],
            pattern: None,
        };
        assert!(eval_condition(&contains, &row));
        assert!(eval_condition(&contains_key, &row));
    }
}
