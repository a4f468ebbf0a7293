//! A `nom`-based parser for rewritten expression source.

use crate::ast::*;
use crate::error::ExprError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1, one_of},
    combinator::{cut, map, not, opt, peek, recognize, value, verify},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
};
use std::sync::Arc;

const RESERVED: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "lambda", "True", "False", "None", "true",
    "false", "null",
];

// --- Main Public Parser ---

pub fn parse_expression(input: &str) -> Result<Expr, ExprError> {
    match terminated(expression, multispace0).parse(input.trim_start()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(ExprError::parse(
            input,
            format!("Parser did not consume all input. Remainder: '{}'", rem),
        )),
        Err(e) => Err(ExprError::parse(input, e.to_string())),
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// A keyword that is not the prefix of a longer identifier.
fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(peek(take_while1(is_ident_char))))
}

fn identifier(input: &str) -> IResult<&str, String> {
    map(
        verify(
            recognize(pair(
                take_while1(|c: char| c.is_alphabetic() || c == '_' || c == '$'),
                take_while(is_ident_char),
            )),
            |s: &str| !RESERVED.contains(&s),
        ),
        str::to_string,
    )
    .parse(input)
}

fn build_binary_expr_parser<'a, F, G>(
    sub_expr_parser: F,
    op_parser: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expr>
where
    F: Parser<&'a str, Output = Expr, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinaryOp, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, mut left) = sub_expr_parser.clone().parse(input)?;
        let (input, remainder) =
            many0(pair(ws(op_parser.clone()), sub_expr_parser.clone())).parse(input)?;

        for (op, right) in remainder {
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok((input, left))
    }
}

// --- Expression Parsers (in order of precedence) ---

/// Lambdas first, then a conditional optionally followed by `= value`.
/// Assignment targets are checked later, during safety lowering.
fn expression(input: &str) -> IResult<&str, Expr> {
    if let Ok(parsed) = lambda_expr(input) {
        return Ok(parsed);
    }
    let (rest, left) = conditional_expr(input)?;
    match preceded(ws(assign_op), expression).parse(rest) {
        Ok((rest, value)) => Ok((
            rest,
            Expr::Assign {
                target: Box::new(left),
                value: Box::new(value),
            },
        )),
        Err(nom::Err::Error(_)) => Ok((rest, left)),
        Err(e) => Err(e),
    }
}

fn assign_op(input: &str) -> IResult<&str, char> {
    terminated(char('='), not(peek(one_of("=>")))).parse(input)
}

fn arrow_params(input: &str) -> IResult<&str, Vec<String>> {
    alt((
        map(identifier, |p| vec![p]),
        delimited(
            ws(char('(')),
            separated_list0(ws(char(',')), identifier),
            ws(char(')')),
        ),
    ))
    .parse(input)
}

fn lambda_expr(input: &str) -> IResult<&str, Expr> {
    let python_lambda = preceded(
        pair(keyword("lambda"), multispace0),
        separated_pair(
            separated_list0(ws(char(',')), identifier),
            ws(char(':')),
            expression,
        ),
    );
    let arrow = separated_pair(arrow_params, ws(tag("=>")), expression);
    map(alt((python_lambda, arrow)), |(params, body)| Expr::Lambda {
        params,
        body: Arc::new(body),
    })
    .parse(input)
}

fn conditional_expr(input: &str) -> IResult<&str, Expr> {
    let (input, test) = or_expr(input)?;
    let ternary = map(
        pair(
            preceded(ws(char('?')), expression),
            preceded(ws(char(':')), expression),
        ),
        |(then, otherwise)| (None, then, otherwise),
    );
    let python = map(
        pair(
            preceded(ws(keyword("if")), or_expr),
            preceded(ws(keyword("else")), expression),
        ),
        |(cond, otherwise)| (Some(cond), Expr::Literal(Literal::Null), otherwise),
    );
    let (input, tail) = opt(alt((ternary, python))).parse(input)?;
    let expr = match tail {
        None => test,
        // `then if cond else otherwise`
        Some((Some(cond), _, otherwise)) => Expr::Conditional {
            test: Box::new(cond),
            then: Box::new(test),
            otherwise: Box::new(otherwise),
        },
        Some((None, then, otherwise)) => Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        },
    };
    Ok((input, expr))
}

fn or_op(input: &str) -> IResult<&str, BinaryOp> {
    value(BinaryOp::Or, alt((keyword("or"), tag("||")))).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOp> {
    value(BinaryOp::And, alt((keyword("and"), tag("&&")))).parse(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    build_binary_expr_parser(and_expr, or_op)(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    build_binary_expr_parser(not_expr, and_op)(input)
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    let not_op = alt((
        keyword("not"),
        terminated(tag("!"), not(peek(char('=')))),
    ));
    alt((
        map(preceded(ws(not_op), not_expr), |expr| Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }),
        comparison_expr,
    ))
    .parse(input)
}

fn comparison_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::NotEq, tag("!=")),
        value(BinaryOp::LtEq, tag("<=")),
        value(BinaryOp::GtEq, tag(">=")),
        value(BinaryOp::Lt, char('<')),
        value(BinaryOp::Gt, char('>')),
        value(
            BinaryOp::NotIn,
            (keyword("not"), multispace1, keyword("in")),
        ),
        value(BinaryOp::In, keyword("in")),
        value(
            BinaryOp::IsNot,
            (keyword("is"), multispace1, keyword("not")),
        ),
        value(BinaryOp::Is, keyword("is")),
    ))
    .parse(input)
}

fn comparison_expr(input: &str) -> IResult<&str, Expr> {
    build_binary_expr_parser(additive_expr, comparison_op)(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Add, char('+')),
        value(BinaryOp::Sub, char('-')),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::FloorDiv, tag("//")),
        value(BinaryOp::Div, char('/')),
        value(BinaryOp::Mod, char('%')),
    ))
    .parse(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expr> {
    build_binary_expr_parser(multiplicative_expr, additive_op)(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expr> {
    build_binary_expr_parser(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary_expr), |expr| Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(expr),
        }),
        map(preceded(ws(char('+')), unary_expr), |expr| Expr::Unary {
            op: UnaryOp::Plus,
            expr: Box::new(expr),
        }),
        postfix_expr,
    ))
    .parse(input)
}

enum Postfix {
    Attribute(String),
    Index(Expr),
    Call(Vec<Expr>, Vec<(String, Expr)>),
}

fn call_arg(input: &str) -> IResult<&str, Result<Expr, (String, Expr)>> {
    alt((
        map(
            separated_pair(identifier, ws(assign_op), expression),
            Err,
        ),
        map(expression, Ok),
    ))
    .parse(input)
}

fn postfix_op(input: &str) -> IResult<&str, Postfix> {
    alt((
        map(preceded(ws(char('.')), cut(identifier_or_keyword)), Postfix::Attribute),
        map(
            delimited(ws(char('[')), expression, ws(char(']'))),
            Postfix::Index,
        ),
        map(
            delimited(
                ws(char('(')),
                terminated(separated_list0(ws(char(',')), call_arg), opt(ws(char(',')))),
                ws(char(')')),
            ),
            |args| {
                let mut positional = Vec::new();
                let mut keywords = Vec::new();
                for arg in args {
                    match arg {
                        Ok(expr) => positional.push(expr),
                        Err(kw) => keywords.push(kw),
                    }
                }
                Postfix::Call(positional, keywords)
            },
        ),
    ))
    .parse(input)
}

/// Member names may collide with keywords (`record.is_company`, `x.if`).
fn identifier_or_keyword(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_' || c == '$'),
            take_while(is_ident_char),
        )),
        str::to_string,
    )
    .parse(input)
}

fn postfix_expr(input: &str) -> IResult<&str, Expr> {
    let (input, base) = primary_expr(input)?;
    let (input, ops) = many0(postfix_op).parse(input)?;
    let expr = ops.into_iter().fold(base, |target, op| match op {
        Postfix::Attribute(name) => Expr::Attribute {
            target: Box::new(target),
            name,
        },
        Postfix::Index(index) => Expr::Index {
            target: Box::new(target),
            index: Box::new(index),
        },
        Postfix::Call(args, kwargs) => Expr::Call {
            func: Box::new(target),
            args,
            kwargs,
        },
    });
    Ok((input, expr))
}

fn primary_expr(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        map(number_literal, Expr::Literal),
        map(string_literal, |s| Expr::Literal(Literal::Str(s))),
        constant,
        list_literal,
        dict_literal,
        paren_expr,
        map(identifier, Expr::Name),
    )))
    .parse(input)
}

fn constant(input: &str) -> IResult<&str, Expr> {
    alt((
        value(
            Expr::Literal(Literal::Bool(true)),
            alt((keyword("True"), keyword("true"))),
        ),
        value(
            Expr::Literal(Literal::Bool(false)),
            alt((keyword("False"), keyword("false"))),
        ),
        value(
            Expr::Literal(Literal::Null),
            alt((keyword("None"), keyword("null"))),
        ),
    ))
    .parse(input)
}

fn number_literal(input: &str) -> IResult<&str, Literal> {
    let (rest, text) = recognize(pair(
        digit1,
        opt(pair(
            preceded(char('.'), opt(digit1)),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
    ))
    .parse(input)?;
    let literal = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().map(Literal::Float).ok()
    } else {
        text.parse::<i64>()
            .map(Literal::Int)
            .ok()
            .or_else(|| text.parse::<f64>().map(Literal::Float).ok())
    };
    match literal {
        Some(lit) => Ok((rest, lit)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

fn quoted_body(quote: char) -> impl FnMut(&str) -> IResult<&str, String> {
    move |input: &str| {
        let (input, _) = char::<&str, nom::error::Error<&str>>(quote).parse(input)?;
        let mut out = String::new();
        let mut chars = input.char_indices();
        while let Some((pos, c)) = chars.next() {
            if c == quote {
                return Ok((&input[pos + c.len_utf8()..], out));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '0')) => out.push('\0'),
                Some((_, other)) => out.push(other),
                None => break,
            }
        }
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )))
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    alt((quoted_body('"'), quoted_body('\''))).parse(input)
}

fn list_literal(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(
            char('['),
            terminated(
                separated_list0(ws(char(',')), ws(expression)),
                opt(ws(char(','))),
            ),
            ws(char(']')),
        ),
        Expr::List,
    )
    .parse(input)
}

fn dict_key(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            terminated(identifier_or_keyword, peek(ws(char(':')))),
            |key| Expr::Literal(Literal::Str(key)),
        ),
        conditional_expr,
    ))
    .parse(input)
}

fn dict_literal(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(
            char('{'),
            terminated(
                separated_list0(
                    ws(char(',')),
                    separated_pair(ws(dict_key), ws(char(':')), ws(expression)),
                ),
                opt(ws(char(','))),
            ),
            ws(char('}')),
        ),
        Expr::Dict,
    )
    .parse(input)
}

/// `(e)` groups, `()` and `(a, b)` build lists.
fn paren_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        value(Expr::List(Vec::new()), pair(char('('), ws(char(')')))),
        map(
            delimited(
                char('('),
                pair(
                    separated_list1(ws(char(',')), ws(expression)),
                    opt(ws(char(','))),
                ),
                ws(char(')')),
            ),
            |(mut items, trailing)| {
                if items.len() == 1 && trailing.is_none() {
                    items.remove(0)
                } else {
                    Expr::List(items)
                }
            },
        ),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Index {
            target: Box::new(Expr::Name("values".into())),
            index: Box::new(Expr::str(name)),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                left: Box::new(Expr::Literal(Literal::Int(1))),
                op: BinaryOp::Add,
                right: Box::new(Expr::Binary {
                    left: Box::new(Expr::Literal(Literal::Int(2))),
                    op: BinaryOp::Mul,
                    right: Box::new(Expr::Literal(Literal::Int(3))),
                }),
            }
        );
    }

    #[test]
    fn test_subscript_and_member_chain() {
        let expr = parse_expression(r#"values["a"].b"#).unwrap();
        assert_eq!(
            expr,
            Expr::Attribute {
                target: Box::new(var("a")),
                name: "b".into()
            }
        );
    }

    #[test]
    fn test_conditionals() {
        let ternary = parse_expression("a ? 1 : 2").unwrap();
        let python = parse_expression("1 if a else 2").unwrap();
        assert_eq!(ternary, python);
    }

    #[test]
    fn test_word_operators() {
        assert!(matches!(
            parse_expression("a not in b").unwrap(),
            Expr::Binary { op: BinaryOp::NotIn, .. }
        ));
        assert!(matches!(
            parse_expression("a is not None").unwrap(),
            Expr::Binary { op: BinaryOp::IsNot, .. }
        ));
        assert!(matches!(
            parse_expression("not a and b").unwrap(),
            Expr::Binary { op: BinaryOp::And, .. }
        ));
        // identifiers that merely start with a keyword
        assert_eq!(parse_expression("notes").unwrap(), Expr::Name("notes".into()));
    }

    #[test]
    fn test_lambdas() {
        let arrow = parse_expression("(a, b) => a + b").unwrap();
        let Expr::Lambda { params, .. } = arrow else {
            panic!("expected lambda");
        };
        assert_eq!(params, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(
            parse_expression("lambda x: x * 2").unwrap(),
            Expr::Lambda { .. }
        ));
    }

    #[test]
    fn test_collections() {
        assert_eq!(
            parse_expression("[1, 'two', 3.0]").unwrap(),
            Expr::List(vec![
                Expr::Literal(Literal::Int(1)),
                Expr::str("two"),
                Expr::Literal(Literal::Float(3.0)),
            ])
        );
        assert_eq!(
            parse_expression("{widget: 'monetary', 'x': 1}").unwrap(),
            Expr::Dict(vec![
                (Expr::str("widget"), Expr::str("monetary")),
                (Expr::str("x"), Expr::Literal(Literal::Int(1))),
            ])
        );
        assert_eq!(parse_expression("()").unwrap(), Expr::List(vec![]));
        assert_eq!(
            parse_expression("(1, 2)").unwrap(),
            Expr::List(vec![
                Expr::Literal(Literal::Int(1)),
                Expr::Literal(Literal::Int(2))
            ])
        );
    }

    #[test]
    fn test_call_with_keywords() {
        let expr = parse_expression("f(1, reverse=True)").unwrap();
        let Expr::Call { args, kwargs, .. } = expr else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        assert_eq!(kwargs[0].0, "reverse");
    }

    #[test]
    fn test_assignment() {
        let expr = parse_expression(r#"values["x"] = 1"#).unwrap();
        assert!(matches!(expr, Expr::Assign { .. }));
        assert!(matches!(
            parse_expression("a == 1").unwrap(),
            Expr::Binary { op: BinaryOp::Eq, .. }
        ));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            parse_expression(r#""a\"b\n""#).unwrap(),
            Expr::str("a\"b\n")
        );
    }

    #[test]
    fn test_trailing_garbage_is_rejected() {
        let err = parse_expression("1 2").unwrap_err();
        assert!(matches!(err, ExprError::Parse { .. }));
    }
}
