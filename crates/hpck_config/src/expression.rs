//! Expressions embedded in string values as `$(...)`.
//!
//! A string is split into literal text and expression segments. Each
//! expression is parsed into an [`Expr`] tree; dotted names in the tree are
//! the references the rest of the crate resolves.
//!
//! ```text
//! "$(vars.region)"                    -> one expression, typed result
//! "$(vars.name)-login"                -> interpolated string
//! "$(join(\",\", vars.zones))"         -> function call
//! "\$(literal)"                       -> escaped, no expression
//! ```

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{all_consuming, map, map_res, recognize, value},
    error::{Error as NomError, ErrorKind as NomErrorKind},
    multi::{fold_many0, many0, many0_count, separated_list0},
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded},
    IResult,
};

use crate::error::{ConfigError, ConfigResult};
use crate::value::Value;

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Dotted name such as `vars.region` or `network.network_name`.
    Traversal(Vec<String>),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    List(Vec<Expr>),
    Index {
        target: Box<Expr>,
        key: Box<Expr>,
    },
    GetAttr {
        target: Box<Expr>,
        name: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Expr {
    /// All dotted names in the tree, in source order.
    pub fn traversals(&self) -> Vec<&[String]> {
        let mut out = Vec::new();
        self.collect_traversals(&mut out);
        out
    }

    fn collect_traversals<'a>(&'a self, out: &mut Vec<&'a [String]>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Traversal(parts) => out.push(parts),
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_traversals(out)),
            Expr::List(items) => items.iter().for_each(|a| a.collect_traversals(out)),
            Expr::Index { target, key } => {
                target.collect_traversals(out);
                key.collect_traversals(out);
            }
            Expr::GetAttr { target, .. } => target.collect_traversals(out),
            Expr::Unary { operand, .. } => operand.collect_traversals(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_traversals(out);
                rhs.collect_traversals(out);
            }
        }
    }
}

/// A piece of a string value.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Expression { source: String, expr: Expr },
}

/// True if `s` contains an unescaped `$(`.
pub fn has_expression(s: &str) -> bool {
    let bytes = s.as_bytes();
    (0..bytes.len()).any(|i| bytes[i..].starts_with(b"$(") && (i == 0 || bytes[i - 1] != b'\\'))
}

/// Escape every `$(` in literal text so that it is not read back as an
/// expression.
pub fn escape_literal(text: &str) -> String {
    text.replace("$(", "\\$(")
}

/// Split a string into literal and expression segments.
///
/// Adjacent literal text is merged; `\$(` becomes a literal `$(`.
pub fn parse_template(s: &str) -> ConfigResult<Vec<Segment>> {
    let bytes = s.as_bytes();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut lit_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes[i + 1..].starts_with(b"$(") {
            literal.push_str(&s[lit_start..i]);
            literal.push_str("$(");
            i += 3;
            lit_start = i;
            continue;
        }
        if bytes[i..].starts_with(b"$(") {
            literal.push_str(&s[lit_start..i]);
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            let body = i + 2;
            let end = find_closing(bytes, body).ok_or_else(|| ConfigError::InvalidReference {
                token: s[i..].to_string(),
                message: "unterminated expression".to_string(),
            })?;
            let source = &s[body..end];
            segments.push(Segment::Expression {
                source: source.to_string(),
                expr: parse_expression(source)?,
            });
            i = end + 1;
            lit_start = i;
            continue;
        }
        i += 1;
    }

    literal.push_str(&s[lit_start..]);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Index of the `)` closing an expression whose body starts at `start`.
fn find_closing(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 1;
    let mut in_string = false;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Parse the body of a `$(...)` token.
pub fn parse_expression(src: &str) -> ConfigResult<Expr> {
    match all_consuming(expression)(src) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let message = if e.input.is_empty() {
                "unexpected end of expression".to_string()
            } else {
                format!("could not parse expression near {:?}", e.input)
            };
            Err(ConfigError::InvalidReference {
                token: format!("$({})", src),
                message,
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(ConfigError::InvalidReference {
            token: format!("$({})", src),
            message: "incomplete expression".to_string(),
        }),
    }
}

// =============================================================================
// PARSERS
// =============================================================================

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn expression(input: &str) -> IResult<&str, Expr> {
    binary_level(input, and_expr, or_op)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    binary_level(input, comparison, and_op)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    binary_level(input, additive, cmp_op)
}

fn additive(input: &str) -> IResult<&str, Expr> {
    binary_level(input, multiplicative, add_op)
}

fn multiplicative(input: &str) -> IResult<&str, Expr> {
    binary_level(input, unary, mul_op)
}

/// Left-associative chain of `operand (operator operand)*`.
fn binary_level<'a>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, Expr>,
    operator: fn(&'a str) -> IResult<&'a str, BinaryOp>,
) -> IResult<&'a str, Expr> {
    let (input, first) = operand(input)?;
    fold_many0(
        pair(ws(operator), operand),
        move || first.clone(),
        |lhs, (op, rhs)| Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    )(input)
}

fn or_op(input: &str) -> IResult<&str, BinaryOp> {
    value(BinaryOp::Or, tag("||"))(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOp> {
    value(BinaryOp::And, tag("&&"))(input)
}

fn cmp_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
    ))(input)
}

fn add_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((value(BinaryOp::Add, char('+')), value(BinaryOp::Sub, char('-'))))(input)
}

fn mul_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::Div, char('/')),
        value(BinaryOp::Mod, char('%')),
    ))(input)
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('!')), unary), |e| Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(e),
        }),
        map(preceded(ws(char('-')), unary), |e| Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(e),
        }),
        postfix,
    ))(input)
}

enum Suffix {
    Index(Expr),
    Attr(String),
}

fn postfix(input: &str) -> IResult<&str, Expr> {
    let (input, base) = primary(input)?;
    fold_many0(
        alt((
            map(delimited(ws(char('[')), expression, ws(char(']'))), Suffix::Index),
            map(preceded(char('.'), identifier), |s: &str| Suffix::Attr(s.to_string())),
        )),
        move || base.clone(),
        |acc, suffix| match suffix {
            Suffix::Index(key) => Expr::Index {
                target: Box::new(acc),
                key: Box::new(key),
            },
            Suffix::Attr(name) => Expr::GetAttr {
                target: Box::new(acc),
                name,
            },
        },
    )(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(char('('), expression, char(')')),
        map(
            delimited(
                char('['),
                separated_list0(char(','), expression),
                preceded(multispace0, char(']')),
            ),
            Expr::List,
        ),
        map(number, Expr::Literal),
        map(string_literal, |s| Expr::Literal(Value::String(s))),
        named,
    )))(input)
}

/// Identifier, function call, keyword literal or dotted traversal.
fn named(input: &str) -> IResult<&str, Expr> {
    let (rest, first) = identifier(input)?;
    if let Ok((rest, args)) = call_args(rest) {
        return Ok((
            rest,
            Expr::Call {
                name: first.to_string(),
                args,
            },
        ));
    }

    let (rest, more) = many0(preceded(char('.'), identifier))(rest)?;
    if more.is_empty() {
        let literal = match first {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            "null" => Some(Value::Null),
            _ => None,
        };
        if let Some(v) = literal {
            return Ok((rest, Expr::Literal(v)));
        }
    }

    let mut parts = Vec::with_capacity(more.len() + 1);
    parts.push(first.to_string());
    parts.extend(more.into_iter().map(str::to_string));
    Ok((rest, Expr::Traversal(parts)))
}

fn call_args(input: &str) -> IResult<&str, Vec<Expr>> {
    delimited(
        preceded(multispace0, char('(')),
        separated_list0(char(','), expression),
        preceded(multispace0, char(')')),
    )(input)
}

/// `[A-Za-z_][A-Za-z0-9_-]*`
pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_"), tag("-")))),
    ))(input)
}

fn number(input: &str) -> IResult<&str, Value> {
    map_res(recognize_float, |s: &str| match s.parse::<i64>() {
        Ok(i) => Ok(Value::int(i)),
        Err(_) => s.parse::<f64>().map(Value::number),
    })(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('"')(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => return Err(nom::Err::Error(NomError::new(rest, NomErrorKind::Char))),
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c) => out.push(c),
                None => return Err(nom::Err::Error(NomError::new(rest, NomErrorKind::Char))),
            },
            Some(c) => out.push(c),
        }
        rest = chars.as_str();
    }
}
