//! Validation and lowering of parsed, rewritten expressions.
//!
//! After rewriting, the only names an expression may reach are the values
//! container (through a string subscript or `.get("...")`), lambda parameters and
//! builtin helpers. Anything else is rejected before the expression is trusted.

use crate::ast::Expr;
use crate::error::ExprError;
use crate::functions::Builtin;
use crate::rewriter::VALUES_NAME;
use std::collections::HashSet;
use std::sync::Arc;

pub fn validate(expr: Expr, source: &str) -> Result<Expr, ExprError> {
    Validator { source }.lower(expr, &HashSet::new())
}

struct Validator<'a> {
    source: &'a str,
}

impl Validator<'_> {
    fn reject(&self, reason: impl Into<String>) -> ExprError {
        ExprError::unsafe_expr(self.source, reason)
    }

    fn check_name(&self, name: &str) -> Result<(), ExprError> {
        if name.contains("__") {
            return Err(self.reject(format!("access to '{}' is forbidden", name)));
        }
        Ok(())
    }

    /// Recognizes `values["x"]` and `values.get("x")`.
    fn container_lookup(&self, expr: &Expr) -> Result<Option<Expr>, ExprError> {
        match expr {
            Expr::Index { target, index } if is_values(target) => match index.as_str_literal() {
                Some(key) => {
                    self.check_name(key)?;
                    Ok(Some(Expr::Var {
                        name: key.to_string(),
                        strict: true,
                    }))
                }
                None => Err(self.reject("the values container only accepts string keys")),
            },
            Expr::Call { func, args, kwargs } => match func.as_ref() {
                Expr::Attribute { target, name } if is_values(target) && name == "get" => {
                    match (args.as_slice(), kwargs.is_empty()) {
                        ([key], true) if key.as_str_literal().is_some() => {
                            let key = key.as_str_literal().unwrap_or_default();
                            self.check_name(key)?;
                            Ok(Some(Expr::Var {
                                name: key.to_string(),
                                strict: false,
                            }))
                        }
                        _ => Err(self.reject("the values container only accepts string keys")),
                    }
                }
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn lower(&self, expr: Expr, locals: &HashSet<String>) -> Result<Expr, ExprError> {
        if let Some(var) = self.container_lookup(&expr)? {
            return Ok(var);
        }
        let boxed = |e: Expr| -> Result<Box<Expr>, ExprError> { Ok(Box::new(self.lower(e, locals)?)) };
        Ok(match expr {
            Expr::Name(name) => {
                self.check_name(&name)?;
                if locals.contains(&name) {
                    Expr::Local(name)
                } else if let Some(builtin) = Builtin::from_name(&name) {
                    Expr::Global(builtin)
                } else {
                    return Err(self.reject(format!("name '{}' is not allowed", name)));
                }
            }
            Expr::Literal(_) | Expr::Var { .. } | Expr::Local(_) | Expr::Global(_) => expr,
            Expr::List(items) => Expr::List(
                items
                    .into_iter()
                    .map(|e| self.lower(e, locals))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Dict(entries) => Expr::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| {
                        if let Some(key) = k.as_str_literal() {
                            self.check_name(key)?;
                        }
                        Ok((self.lower(k, locals)?, self.lower(v, locals)?))
                    })
                    .collect::<Result<_, ExprError>>()?,
            ),
            Expr::Attribute { target, name } => {
                self.check_name(&name)?;
                Expr::Attribute {
                    target: boxed(*target)?,
                    name,
                }
            }
            Expr::Index { target, index } => {
                if let Some(key) = index.as_str_literal() {
                    self.check_name(key)?;
                }
                Expr::Index {
                    target: boxed(*target)?,
                    index: boxed(*index)?,
                }
            }
            Expr::Call { func, args, kwargs } => Expr::Call {
                func: boxed(*func)?,
                args: args
                    .into_iter()
                    .map(|e| self.lower(e, locals))
                    .collect::<Result<_, _>>()?,
                kwargs: kwargs
                    .into_iter()
                    .map(|(k, v)| {
                        self.check_name(&k)?;
                        Ok((k, self.lower(v, locals)?))
                    })
                    .collect::<Result<_, ExprError>>()?,
            },
            Expr::Unary { op, expr } => Expr::Unary {
                op,
                expr: boxed(*expr)?,
            },
            Expr::Binary { left, op, right } => Expr::Binary {
                left: boxed(*left)?,
                op,
                right: boxed(*right)?,
            },
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => Expr::Conditional {
                test: boxed(*test)?,
                then: boxed(*then)?,
                otherwise: boxed(*otherwise)?,
            },
            Expr::Lambda { params, body } => {
                let mut inner = locals.clone();
                for param in &params {
                    self.check_name(param)?;
                    inner.insert(param.clone());
                }
                let body = Arc::unwrap_or_clone(body);
                Expr::Lambda {
                    params,
                    body: Arc::new(self.lower(body, &inner)?),
                }
            }
            Expr::Assign { target, value } => {
                let target = self.lower(*target, locals)?;
                if !matches!(target, Expr::Var { .. }) {
                    return Err(self.reject("only template variables can be assigned"));
                }
                Expr::Assign {
                    target: Box::new(target),
                    value: boxed(*value)?,
                }
            }
        })
    }
}

fn is_values(expr: &Expr) -> bool {
    matches!(expr, Expr::Name(name) if name == VALUES_NAME)
}
