//! Rewrites free identifiers of an expression into lookups on the render values.
//!
//! `a.b + f(x)` becomes `values.get("a").b + values.get("f")(values.get("x"))`, or the
//! subscript form `values["a"]` when missing names must raise. Lambda parameters,
//! member names, literal dict keys, call keyword names and allow-listed names are kept.

use crate::error::ExprError;
use crate::functions::Builtin;
use crate::tokenizer::{Bracket, Token, render_tokens, tokenize};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Name of the values container in rewritten source.
pub const VALUES_NAME: &str = "values";

pub const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "lambda", "True", "False", "None", "true",
    "false", "null",
];

/// Keywords plus builtin helper names: everything an expression may name directly.
pub static ALLOWED_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    KEYWORDS
        .iter()
        .copied()
        .chain(Builtin::ALL.iter().map(|b| b.name()))
        .collect()
});

/// Rewrites `expr` with the default allow-list and no pre-bound locals.
pub fn rewrite(expr: &str, raise_on_missing: bool) -> Result<String, ExprError> {
    compile_expr(expr, &ALLOWED_NAMES, &[], raise_on_missing)
}

pub fn compile_expr(
    expr: &str,
    allowed_names: &HashSet<&str>,
    local_names: &[&str],
    raise_on_missing: bool,
) -> Result<String, ExprError> {
    let tokens = tokenize(expr)?;
    let rewriter = Rewriter {
        allowed: allowed_names,
        raise_on_missing,
    };
    let locals: HashSet<String> = local_names.iter().map(|s| s.to_string()).collect();
    let rewritten = rewriter.rewrite_tokens(&tokens, &locals, GroupKind::Top);
    Ok(render_tokens(&rewritten))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GroupKind {
    Top,
    Plain,
    CallArgs,
    Dict,
}

struct Rewriter<'a> {
    allowed: &'a HashSet<&'a str>,
    raise_on_missing: bool,
}

impl Rewriter<'_> {
    fn rewrite_tokens(
        &self,
        tokens: &[Token],
        outer: &HashSet<String>,
        kind: GroupKind,
    ) -> Vec<Token> {
        let mut locals = outer.clone();
        locals.extend(lambda_params(tokens));

        let mut out = Vec::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            let prev = if i > 0 { tokens.get(i - 1) } else { None };
            let next = tokens.get(i + 1);
            let at_item_start = prev.is_none_or(|p| p.is_op(","));
            match token {
                Token::Name(name) => {
                    let is_member = prev.is_some_and(|p| p.is_op("."));
                    let is_dict_key =
                        kind == GroupKind::Dict && at_item_start && next.is_some_and(|n| n.is_op(":"));
                    let is_keyword_arg = kind == GroupKind::CallArgs
                        && at_item_start
                        && next.is_some_and(|n| n.is_op("="));
                    if is_member
                        || is_dict_key
                        || is_keyword_arg
                        || self.allowed.contains(name.as_str())
                        || locals.contains(name)
                    {
                        out.push(token.clone());
                        continue;
                    }
                    let assigned = next.is_some_and(|n| n.is_op("="));
                    out.extend(self.lookup(name, assigned));
                }
                Token::Group(bracket, inner) => {
                    let inner_kind = match bracket {
                        Bracket::Brace => GroupKind::Dict,
                        Bracket::Paren if prev.is_some_and(is_callable) => GroupKind::CallArgs,
                        _ => GroupKind::Plain,
                    };
                    out.push(Token::Group(
                        *bracket,
                        self.rewrite_tokens(inner, &locals, inner_kind),
                    ));
                }
                _ => out.push(token.clone()),
            }
        }
        out
    }

    fn lookup(&self, name: &str, assigned: bool) -> Vec<Token> {
        let key = Token::string_literal(name);
        if assigned || self.raise_on_missing {
            vec![
                Token::Name(VALUES_NAME.to_string()),
                Token::Group(Bracket::Square, vec![key]),
            ]
        } else {
            vec![
                Token::Name(VALUES_NAME.to_string()),
                Token::Op(".".to_string()),
                Token::Name("get".to_string()),
                Token::Group(Bracket::Paren, vec![key]),
            ]
        }
    }
}

/// A token after which a parenthesised group is a call argument list.
fn is_callable(token: &Token) -> bool {
    match token {
        Token::Name(n) => !KEYWORDS.contains(&n.as_str()),
        Token::Group(..) | Token::Str(_) => true,
        _ => false,
    }
}

/// Parameter names introduced by `x => ...`, `(a, b) => ...` or `lambda a, b: ...`.
fn lambda_params(tokens: &[Token]) -> Vec<String> {
    let mut params = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if token.is_op("=>") && i > 0 {
            match &tokens[i - 1] {
                Token::Name(name) => params.push(name.clone()),
                Token::Group(Bracket::Paren, inner) => params.extend(names_of(inner)),
                _ => {}
            }
        } else if token.is_name("lambda") {
            params.extend(names_of(
                &tokens[i + 1..]
                    .iter()
                    .take_while(|t| !t.is_op(":"))
                    .cloned()
                    .collect::<Vec<_>>(),
            ));
        }
    }
    params
}

fn names_of(tokens: &[Token]) -> Vec<String> {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Name(n) => Some(n.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_names_are_rewritten() {
        assert_eq!(rewrite("a + b", false).unwrap(), r#"values.get("a") + values.get("b")"#);
        assert_eq!(rewrite("a + b", true).unwrap(), r#"values["a"] + values["b"]"#);
    }

    #[test]
    fn test_member_chain_is_preserved() {
        assert_eq!(
            rewrite("record.partner_id.name", true).unwrap(),
            r#"values["record"].partner_id.name"#
        );
    }

    #[test]
    fn test_allowed_names_are_kept() {
        assert_eq!(
            rewrite("len(items) > 0 and not done", true).unwrap(),
            r#"len(values["items"]) > 0 and not values["done"]"#
        );
        assert_eq!(rewrite("x is None", true).unwrap(), r#"values["x"] is None"#);
    }

    #[test]
    fn test_lambda_params_shadow() {
        assert_eq!(
            rewrite("sorted(lines, key=l => l.seq)", true).unwrap(),
            r#"sorted(values["lines"], key = l => l.seq)"#
        );
        assert_eq!(
            rewrite("map((a, b) => a + b + c)", true).unwrap(),
            r#"values["map"]((a, b) => a + b + values["c"])"#
        );
        assert_eq!(
            rewrite("lambda p: p * k", true).unwrap(),
            r#"lambda p: p * values["k"]"#
        );
    }

    #[test]
    fn test_dict_keys_are_literal() {
        assert_eq!(
            rewrite("{widget: kind, 'x': y}", true).unwrap(),
            r#"{widget: values["kind"], 'x': values["y"]}"#
        );
    }

    #[test]
    fn test_assignment_target_uses_subscript() {
        assert_eq!(
            rewrite("total = total + 1", false).unwrap(),
            r#"values["total"] = values.get("total") + 1"#
        );
    }

    #[test]
    fn test_extra_locals_are_kept() {
        let rewritten = compile_expr("item.qty * rate", &ALLOWED_NAMES, &["item"], true).unwrap();
        assert_eq!(rewritten, r#"item.qty * values["rate"]"#);
    }

    #[test]
    fn test_tokenize_failure_names_expression() {
        let err = rewrite("a + (b", true).unwrap_err();
        assert!(err.to_string().contains("a + (b"));
    }
}
