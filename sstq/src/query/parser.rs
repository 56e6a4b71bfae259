//! nom parser for the SELECT dialect.

use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{alphanumeric1, char, digit1},
    combinator::{all_consuming, map, map_res, not, opt, peek, recognize, value},
    error::ErrorKind,
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};
use uuid::Uuid;

use crate::{
    cql::{convert::decode_hex, literal::Literal},
    error::{Error, ErrorCode, Result},
    parse::{identifier, ws},
    query::ast::{
        Condition, Operator, OrderBy, OrderDirection, ParsedQuery, Projection, WhereClause,
    },
};

const MUTATIONS: [&str; 11] = [
    "insert", "update", "delete", "create", "drop", "alter", "truncate", "grant", "revoke", "use",
    "batch",
];

/// Parse one SELECT statement. Anything else fails: mutating statements with
/// `ReadOnlyViolation`, malformed ones with `SyntaxError` carrying a
/// best-effort character position.
pub fn parse(sql: &str) -> Result<ParsedQuery> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(Error::query("empty query", sql, None));
    }

    if let Ok((_, head)) = identifier(trimmed) {
        if MUTATIONS.contains(&head.as_str()) {
            return Err(Error::new(
                ErrorCode::ReadOnlyViolation,
                format!("statement `{}` modifies data, only SELECT is supported", head),
            ));
        }
    }

    match all_consuming(select_statement)(trimmed) {
        Ok((_, query)) => Ok(query),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let leading = sql.len() - sql.trim_start().len();
            let position = leading + (trimmed.len() - e.input.len());
            Err(Error::query("syntax error", sql, Some(position)))
        }
        Err(nom::Err::Incomplete(_)) => Err(Error::query("incomplete query", sql, None)),
    }
}

fn select_statement(input: &str) -> IResult<&str, ParsedQuery> {
    let (input, _) = keyword("select")(input)?;
    let (input, projection) = projection(input)?;
    let (input, _) = keyword("from")(input)?;
    let (input, table) = ws(identifier)(input)?;
    let (input, where_clause) = opt(preceded(keyword("where"), or_expr))(input)?;
    let (input, order_by) = opt(order_by)(input)?;
    let (input, limit) = opt(preceded(keyword("limit"), number_usize))(input)?;
    let (input, offset) = opt(preceded(keyword("offset"), number_usize))(input)?;

    Ok((
        input,
        ParsedQuery {
            projection,
            table,
            where_clause,
            order_by: order_by.unwrap_or_default(),
            limit,
            offset,
        },
    ))
}

/// Case-insensitive keyword with a word boundary, so `or` never eats the
/// head of `order`.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    map(
        ws(terminated(
            tag_no_case(kw),
            peek(not(alt((alphanumeric1, tag("_"))))),
        )),
        |_| (),
    )
}

fn projection(input: &str) -> IResult<&str, Projection> {
    alt((
        value(Projection::All, ws(tag("*"))),
        map(
            separated_list1(ws(char(',')), projected_column),
            Projection::Columns,
        ),
    ))(input)
}

fn projected_column(input: &str) -> IResult<&str, String> {
    terminated(
        ws(identifier),
        opt(preceded(keyword("as"), ws(identifier))),
    )(input)
}

fn or_expr(input: &str) -> IResult<&str, WhereClause> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(keyword("or"), and_expr))(input)?;
    Ok((input, fold_tree(first, rest, false)))
}

fn and_expr(input: &str) -> IResult<&str, WhereClause> {
    let (input, first) = primary(input)?;
    let (input, rest) = many0(preceded(keyword("and"), primary))(input)?;
    Ok((input, fold_tree(first, rest, true)))
}

fn fold_tree(first: WhereClause, rest: Vec<WhereClause>, and: bool) -> WhereClause {
    rest.into_iter().fold(first, |acc, clause| {
        if and {
            WhereClause::And(Box::new(acc), Box::new(clause))
        } else {
            WhereClause::Or(Box::new(acc), Box::new(clause))
        }
    })
}

fn primary(input: &str) -> IResult<&str, WhereClause> {
    alt((
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        condition,
    ))(input)
}

fn condition(input: &str) -> IResult<&str, WhereClause> {
    let (input, column) = ws(identifier)(input)?;
    let (input, operator) = operator(input)?;
    let (input, values) = match operator {
        Operator::In | Operator::NotIn => alt((
            delimited(
                ws(char('(')),
                separated_list1(ws(char(',')), literal),
                ws(char(')')),
            ),
            map(literal, |lit| match lit {
                Literal::List(items) => items,
                other => vec![other],
            }),
        ))(input)?,
        _ => map(literal, |lit| vec![lit])(input)?,
    };

    Ok((
        input,
        WhereClause::Condition(Condition {
            column,
            operator,
            values,
        }),
    ))
}

fn operator(input: &str) -> IResult<&str, Operator> {
    alt((
        value(Operator::Le, ws(tag("<="))),
        value(Operator::Ge, ws(tag(">="))),
        value(Operator::Ne, ws(tag("!="))),
        value(Operator::Eq, ws(tag("="))),
        value(Operator::Lt, ws(tag("<"))),
        value(Operator::Gt, ws(tag(">"))),
        value(Operator::NotIn, pair(keyword("not"), keyword("in"))),
        value(Operator::In, keyword("in")),
        value(Operator::Like, keyword("like")),
        value(Operator::ContainsKey, pair(keyword("contains"), keyword("key"))),
        value(Operator::Contains, keyword("contains")),
    ))(input)
}

fn order_by(input: &str) -> IResult<&str, Vec<OrderBy>> {
    preceded(
        pair(keyword("order"), keyword("by")),
        separated_list1(
            ws(char(',')),
            map(
                pair(
                    ws(identifier),
                    opt(alt((
                        value(OrderDirection::Asc, keyword("asc")),
                        value(OrderDirection::Desc, keyword("desc")),
                    ))),
                ),
                |(column, direction)| OrderBy {
                    column,
                    direction: direction.unwrap_or_default(),
                },
            ),
        ),
    )(input)
}

fn number_usize(input: &str) -> IResult<&str, usize> {
    map_res(ws(digit1), str::parse)(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    ws(alt((
        value(Literal::Null, keyword("null")),
        value(Literal::Bool(true), keyword("true")),
        value(Literal::Bool(false), keyword("false")),
        hex_literal,
        uuid_literal,
        number_literal,
        string_literal,
        list_literal,
        map_literal,
    )))(input)
}

fn hex_literal(input: &str) -> IResult<&str, Literal> {
    let (rest, digits) = preceded(
        tag_no_case("0x"),
        take_while1(|c: char| c.is_ascii_hexdigit()),
    )(input)?;
    match decode_hex(digits) {
        Some(bytes) => Ok((rest, Literal::Bytes(bytes))),
        None => Err(nom::Err::Error(nom::error::make_error(
            input,
            ErrorKind::HexDigit,
        ))),
    }
}

fn uuid_literal(input: &str) -> IResult<&str, Literal> {
    let (rest, token) =
        take_while1(|c: char| c.is_ascii_hexdigit() || c == '-')(input)?;
    if token.len() == 36 {
        if let Ok(uuid) = Uuid::from_str(token) {
            return Ok((rest, Literal::Uuid(uuid)));
        }
    }
    Err(nom::Err::Error(nom::error::make_error(input, ErrorKind::Tag)))
}

fn number_literal(input: &str) -> IResult<&str, Literal> {
    let (rest, token) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)?;

    let literal = if token.contains('.') {
        token.parse().map(Literal::Float).ok()
    } else {
        token.parse().map(Literal::Number).ok()
    };
    match literal {
        Some(literal) => Ok((rest, literal)),
        None => Err(nom::Err::Error(nom::error::make_error(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Single-quoted string, `''` escapes a quote.
fn string_literal(input: &str) -> IResult<&str, Literal> {
    let (body, _) = char('\'')(input)?;
    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '\'' {
            out.push(c);
            continue;
        }
        if body[i + 1..].starts_with('\'') {
            out.push('\'');
            chars.next();
        } else {
            return Ok((&body[i + 1..], Literal::String(out)));
        }
    }
    Err(nom::Err::Error(nom::error::make_error(input, ErrorKind::Char)))
}

fn list_literal(input: &str) -> IResult<&str, Literal> {
    map(
        delimited(
            ws(char('[')),
            separated_list0(ws(char(',')), literal),
            ws(char(']')),
        ),
        Literal::List,
    )(input)
}

fn map_literal(input: &str) -> IResult<&str, Literal> {
    map(
        delimited(
            ws(char('{')),
            separated_list0(
                ws(char(',')),
                separated_pair(literal, ws(char(':')), literal),
            ),
            ws(char('}')),
        ),
        Literal::Map,
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        let lower = parse("select * from users").unwrap();
        let upper = parse("SELECT * FROM USERS").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.projection, Projection::All);
        assert_eq!(lower.table, "users");
    }

    #[test]
    fn rejects_mutations() {
        for sql in [
            "INSERT INTO users (id) VALUES (1)",
            "update users set a = 1",
            "DELETE FROM users",
            "create table t (id int primary key)",
            "drop table users",
        ] {
            let err = parse(sql).unwrap_err();
            assert_eq!(err.code, ErrorCode::ReadOnlyViolation, "{sql}");
        }
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!(parse("").unwrap_err().code, ErrorCode::SyntaxError);
        assert_eq!(parse("   ").unwrap_err().code, ErrorCode::SyntaxError);
        assert_eq!(parse("explain select 1").unwrap_err().code, ErrorCode::SyntaxError);

        let err = parse("select * from users where").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);
        assert!(err.reason.contains("position"), "{}", err.reason);
    }

    #[test]
    fn whitespace_variants_parse_alike() {
        let canonical = parse("select * from users where age > 1 limit 2").unwrap();
        let mangled = parse("select\t*\nfrom   users\r\nwhere\tage >\n1  limit\t2").unwrap();
        assert_eq!(canonical, mangled);
    }

    #[test]
    fn numeric_literals_parse_into_int_and_float() {
        let query = parse("select * from t where a = -42 and b = 0.5").unwrap();
        let Some(WhereClause::And(left, right)) = query.where_clause else {
            panic!("expected an AND");
        };
        let WhereClause::Condition(a) = *left else { panic!() };
        let WhereClause::Condition(b) = *right else { panic!() };
        assert_eq!(a.values, vec![Literal::Number(-42)]);
        assert_eq!(b.values, vec![Literal::Float(0.5)]);

        // Out-of-range integers fail the literal, not the process.
        let err = parse("select * from t where a = 99999999999999999999").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);
    }

    #[test]
    fn aliases_are_stripped() {
        let query = parse("SELECT name AS n, age FROM users").unwrap();
        assert_eq!(
            query.projection,
            Projection::Columns(vec!["name".into(), "age".into()])
        );
    }

    #[test]
    fn parses_conditions_and_precedence() {
        let query =
            parse("select * from t where a = 1 and b > 2 or c != 'x'").unwrap();
        // AND binds tighter than OR.
        let Some(WhereClause::Or(left, right)) = query.where_clause else {
            panic!("expected an OR at the root");
        };
        assert!(matches!(*left, WhereClause::And(..)));
        let WhereClause::Condition(c) = *right else {
            panic!("expected a condition");
        };
        assert_eq!(c.operator, Operator::Ne);
        assert_eq!(c.values, vec![Literal::String("x".into())]);
    }

    #[test]
    fn parses_in_and_not_in_lists() {
        let query = parse("select * from t where a in (1, 2, 3) and b not in ('x')").unwrap();
        let columns = query.where_clause.unwrap().columns().len();
        assert_eq!(columns, 2);

        let query = parse("select * from t where a IN (1)").unwrap();
        let Some(WhereClause::Condition(c)) = query.where_clause else {
            panic!();
        };
        assert_eq!(c.operator, Operator::In);
        assert_eq!(c.values, vec![Literal::Number(1)]);
    }

    #[test]
    fn parses_like_contains_and_contains_key() {
        let query = parse(
            "select * from t where name like 'a%' and tags contains 'x' and attrs contains key 'k'",
        )
        .unwrap();
        let clause = query.where_clause.unwrap();
        assert_eq!(clause.columns(), vec!["name", "tags", "attrs"]);
    }

    #[test]
    fn parses_order_limit_offset() {
        let query =
            parse("select name from users order by age desc, name limit 5 offset 10").unwrap();
        assert_eq!(query.order_by.len(), 2);
        assert_eq!(query.order_by[0].direction, OrderDirection::Desc);
        assert_eq!(query.order_by[1].direction, OrderDirection::Asc);
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, Some(10));
    }

    #[test]
    fn or_keyword_does_not_eat_order_by() {
        let query = parse("select * from t where a = 1 order by a").unwrap();
        assert!(matches!(query.where_clause, Some(WhereClause::Condition(_))));
        assert_eq!(query.order_by.len(), 1);
    }

    #[test]
    fn parses_typed_literals() {
        let query = parse(
            "select * from t where id = 123e4567-e89b-12d3-a456-426614174000 \
             and raw = 0xCAFE and score = -1.5 and note = 'it''s fine' and flag = true \
             and missing = null",
        )
        .unwrap();
        let Some(clause) = query.where_clause else { panic!() };
        let columns = clause.columns();
        assert_eq!(columns.len(), 6);
    }

    #[test]
    fn parenthesized_clauses_override_precedence() {
        let query = parse("select * from t where (a = 1 or b = 2) and c = 3").unwrap();
        assert!(matches!(query.where_clause, Some(WhereClause::And(..))));
    }

    #[test]
    fn limit_offset_can_be_applied_post_hoc() {
        let query = parse("select * from t limit 100").unwrap();
        let query = query.with_limit_offset(Some(5), Some(10));
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, Some(10));
    }
}
