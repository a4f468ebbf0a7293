//! A `nom`-based tokenizer turning expression source into nested token groups.
//!
//! Brackets are not kept as separate tokens: `(`, `[` and `{` open a [`Token::Group`]
//! holding everything up to the matching closer, so the rewriter can recurse into
//! nested scopes without tracking depth itself.

use crate::error::ExprError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{escaped, is_not, tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket {
    Paren,
    Square,
    Brace,
}

impl Bracket {
    pub fn open(self) -> char {
        match self {
            Bracket::Paren => '(',
            Bracket::Square => '[',
            Bracket::Brace => '{',
        }
    }

    pub fn close(self) -> char {
        match self {
            Bracket::Paren => ')',
            Bracket::Square => ']',
            Bracket::Brace => '}',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Name(String),
    Number(String),
    /// A string literal, kept with its original quotes and escapes.
    Str(String),
    Op(String),
    Group(Bracket, Vec<Token>),
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        matches!(self, Token::Op(o) if o == op)
    }

    pub fn is_name(&self, name: &str) -> bool {
        matches!(self, Token::Name(n) if n == name)
    }

    /// A double-quoted string literal for `text`.
    pub fn string_literal(text: &str) -> Self {
        Token::Str(format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\"")))
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    match terminated(token_list, multispace0).parse(source) {
        Ok(("", tokens)) => Ok(tokens),
        Ok((rest, _)) => Err(ExprError::tokenize(
            source,
            format!("unexpected input at '{}'", rest),
        )),
        Err(e) => Err(ExprError::tokenize(source, e.to_string())),
    }
}

fn token_list(input: &str) -> IResult<&str, Vec<Token>> {
    many0(preceded(multispace0, token)).parse(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((group, string_token, number_token, name_token, op_token)).parse(input)
}

fn group(input: &str) -> IResult<&str, Token> {
    alt((
        map(
            delimited(char('('), token_list, preceded(multispace0, char(')'))),
            |tokens| Token::Group(Bracket::Paren, tokens),
        ),
        map(
            delimited(char('['), token_list, preceded(multispace0, char(']'))),
            |tokens| Token::Group(Bracket::Square, tokens),
        ),
        map(
            delimited(char('{'), token_list, preceded(multispace0, char('}'))),
            |tokens| Token::Group(Bracket::Brace, tokens),
        ),
    ))
    .parse(input)
}

fn double_quoted(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('"'),
        opt(escaped(is_not("\"\\"), '\\', satisfy(|_| true))),
        char('"'),
    ))
    .parse(input)
}

fn single_quoted(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('\''),
        opt(escaped(is_not("'\\"), '\\', satisfy(|_| true))),
        char('\''),
    ))
    .parse(input)
}

fn string_token(input: &str) -> IResult<&str, Token> {
    map(alt((double_quoted, single_quoted)), |s: &str| {
        Token::Str(s.to_string())
    })
    .parse(input)
}

fn number_token(input: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(
            digit1,
            opt(pair(
                preceded(char('.'), opt(digit1)),
                opt(pair(one_of("eE"), pair(opt(one_of("+-")), digit1))),
            )),
        )),
        |s: &str| Token::Number(s.to_string()),
    )
    .parse(input)
}

fn name_token(input: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_' || c == '$'),
            take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
        )),
        |s: &str| Token::Name(s.to_string()),
    )
    .parse(input)
}

fn op_token(input: &str) -> IResult<&str, Token> {
    let long = alt((
        value("=>", tag("=>")),
        value("==", tag("===")),
        value("!=", tag("!==")),
        value("==", tag("==")),
        value("!=", tag("!=")),
        value("<=", tag("<=")),
        value(">=", tag(">=")),
        value("//", tag("//")),
        value("&&", tag("&&")),
        value("||", tag("||")),
    ));
    alt((
        map(long, |op: &str| Token::Op(op.to_string())),
        map(one_of("+-*/%<>=!?:.,"), |c: char| Token::Op(c.to_string())),
    ))
    .parse(input)
}

/// Renders tokens back to source text.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(p) = prev {
            if needs_space(p, token) {
                out.push(' ');
            }
        }
        match token {
            Token::Name(s) | Token::Number(s) | Token::Str(s) | Token::Op(s) => out.push_str(s),
            Token::Group(bracket, inner) => {
                out.push(bracket.open());
                out.push_str(&render_tokens(inner));
                out.push(bracket.close());
            }
        }
        prev = Some(token);
    }
    out
}

fn needs_space(prev: &Token, next: &Token) -> bool {
    if prev.is_op(".") || next.is_op(".") || next.is_op(",") || next.is_op(":") {
        return false;
    }
    if let Token::Group(Bracket::Paren | Bracket::Square, _) = next {
        // calls and subscripts hug their target
        return !matches!(prev, Token::Name(_) | Token::Str(_) | Token::Group(..)) || is_word_op(prev);
    }
    true
}

fn is_word_op(token: &Token) -> bool {
    matches!(token, Token::Name(n) if matches!(n.as_str(), "and" | "or" | "not" | "in" | "is" | "if" | "else" | "lambda"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_flat() {
        let tokens = tokenize("a + 12.5 >= 'x'").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("a".into()),
                Token::Op("+".into()),
                Token::Number("12.5".into()),
                Token::Op(">=".into()),
                Token::Str("'x'".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_nested_groups() {
        let tokens = tokenize("f(a, [1, 2])").unwrap();
        assert_eq!(tokens.len(), 2);
        let Token::Group(Bracket::Paren, inner) = &tokens[1] else {
            panic!("expected a paren group");
        };
        assert_eq!(inner.len(), 3);
        assert!(matches!(inner[2], Token::Group(Bracket::Square, _)));
    }

    #[test]
    fn test_string_escapes_are_kept() {
        let tokens = tokenize(r#""a \"b\" c""#).unwrap();
        assert_eq!(tokens, vec![Token::Str(r#""a \"b\" c""#.into())]);
    }

    #[test]
    fn test_unbalanced_input_is_an_error() {
        let err = tokenize("f(a").unwrap_err();
        assert!(matches!(err, ExprError::Tokenize { ref expression, .. } if expression == "f(a"));
        assert!(tokenize("a ) b").is_err());
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn test_render_round_trip_is_stable() {
        let source = "values.get(\"a\").b[0] + f(x, y)";
        let tokens = tokenize(source).unwrap();
        assert_eq!(render_tokens(&tokens), source);
    }
}
