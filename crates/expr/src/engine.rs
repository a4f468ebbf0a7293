//! Expression evaluation engine.
//!
//! Entry point: [`evaluate`], or [`EvaluationContext`] when several expressions
//! share one scope.

use crate::ast::*;
use crate::error::ExprError;
use crate::functions::{self, as_function};
use crate::operators;
use crate::value::{Function, Lambda, Map, Value};
use std::sync::Arc;

/// The render values container as seen by expressions.
pub trait VariableScope {
    fn lookup(&self, name: &str) -> Option<Value>;

    fn assign(&mut self, name: &str, value: Value);

    /// Names currently visible, outermost first.
    fn names(&self) -> Vec<String> {
        Vec::new()
    }
}

impl VariableScope for Map {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn assign(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }

    fn names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

pub struct EvaluationContext<'s> {
    pub scope: &'s mut dyn VariableScope,
    locals: Vec<(String, Value)>,
}

impl<'s> EvaluationContext<'s> {
    pub fn new(scope: &'s mut dyn VariableScope) -> Self {
        Self {
            scope,
            locals: Vec::new(),
        }
    }

    fn local(&self, name: &str) -> Option<&Value> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(lit) => Ok(literal(lit)),
            Expr::Name(name) => Err(ExprError::UndefinedName(name.clone())),
            Expr::Var { name, strict } => match self.scope.lookup(name) {
                Some(value) => Ok(value),
                None if *strict => Err(ExprError::UndefinedName(name.clone())),
                None => Ok(Value::Null),
            },
            Expr::Local(name) => self
                .local(name)
                .cloned()
                .ok_or_else(|| ExprError::UndefinedName(name.clone())),
            Expr::Global(builtin) => Ok(Value::Function(Function::Builtin(*builtin))),
            Expr::List(items) => items
                .iter()
                .map(|e| self.evaluate(e))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Dict(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let key = match self.evaluate(key)? {
                        Value::Str(s) | Value::Markup(s) => s,
                        k @ (Value::Int(_) | Value::Float(_) | Value::Bool(_)) => k.to_text(),
                        other => {
                            return Err(ExprError::type_error(format!(
                                "unhashable dict key of type '{}'",
                                other.type_name()
                            )));
                        }
                    };
                    let value = self.evaluate(value)?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            Expr::Attribute { target, name } => {
                let target = self.evaluate(target)?;
                get_attribute(&target, name)
            }
            Expr::Index { target, index } => {
                let target = self.evaluate(target)?;
                let index = self.evaluate(index)?;
                get_item(&target, &index)
            }
            Expr::Call { func, args, kwargs } => {
                let args = args
                    .iter()
                    .map(|a| self.evaluate(a))
                    .collect::<Result<Vec<_>, _>>()?;
                let kwargs = kwargs
                    .iter()
                    .map(|(k, v)| self.evaluate(v).map(|v| (k.clone(), v)))
                    .collect::<Result<Vec<_>, _>>()?;
                if let Expr::Attribute { target, name } = func.as_ref() {
                    let target = self.evaluate(target)?;
                    return functions::call_method(self, &target, name, args, kwargs);
                }
                let callee = self.evaluate(func)?;
                let callee = as_function(&callee)?.clone();
                self.call(&callee, args, kwargs)
            }
            Expr::Unary { op, expr } => {
                let value = self.evaluate(expr)?;
                unary(*op, value)
            }
            Expr::Binary {
                left,
                op: BinaryOp::And,
                right,
            } => {
                let left = self.evaluate(left)?;
                if left.is_truthy() {
                    self.evaluate(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Binary {
                left,
                op: BinaryOp::Or,
                right,
            } => {
                let left = self.evaluate(left)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expr::Binary { left, op, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                operators::binary(*op, &left, &right)
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                if self.evaluate(test)?.is_truthy() {
                    self.evaluate(then)
                } else {
                    self.evaluate(otherwise)
                }
            }
            Expr::Lambda { params, body } => Ok(Value::Function(Function::Lambda(Arc::new(
                Lambda {
                    params: params.clone(),
                    body: Arc::clone(body),
                    captured: self.locals.clone(),
                },
            )))),
            Expr::Assign { target, value } => match target.as_ref() {
                Expr::Var { name, .. } => {
                    let value = self.evaluate(value)?;
                    self.scope.assign(name, value.clone());
                    Ok(value)
                }
                _ => Err(ExprError::type_error("cannot assign to expression")),
            },
        }
    }

    pub fn call(
        &mut self,
        func: &Function,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, ExprError> {
        match func {
            Function::Builtin(builtin) => functions::call_builtin(self, *builtin, args, kwargs),
            Function::Native(native) => {
                if !kwargs.is_empty() {
                    return Err(ExprError::function(
                        native.name(),
                        "keyword arguments are not supported",
                    ));
                }
                native.call(&args)
            }
            Function::Lambda(lambda) => {
                if args.len() != lambda.params.len() || !kwargs.is_empty() {
                    return Err(ExprError::function(
                        "<lambda>",
                        format!(
                            "takes {} positional arguments but {} were given",
                            lambda.params.len(),
                            args.len()
                        ),
                    ));
                }
                let mut frame = lambda.captured.clone();
                frame.extend(lambda.params.iter().cloned().zip(args));
                let saved = std::mem::replace(&mut self.locals, frame);
                let result = self.evaluate(&lambda.body);
                self.locals = saved;
                result
            }
        }
    }
}

pub fn evaluate(expr: &Expr, scope: &mut dyn VariableScope) -> Result<Value, ExprError> {
    EvaluationContext::new(scope).evaluate(expr)
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, ExprError> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| ExprError::type_error("integer overflow")),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(b))),
        (UnaryOp::Plus, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        (UnaryOp::Plus, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
        (_, v) => Err(ExprError::type_error(format!(
            "bad operand type for unary operator: '{}'",
            v.type_name()
        ))),
    }
}

/// Reads `target.name`.
///
/// Mapping keys win over the `length` property; a missing mapping key reads as null.
pub fn get_attribute(target: &Value, name: &str) -> Result<Value, ExprError> {
    match target {
        Value::Map(map) => Ok(match map.get(name) {
            Some(v) => v.clone(),
            None if name == "length" => Value::from(map.len()),
            None => Value::Null,
        }),
        Value::Record(record) => match record.get(name) {
            Some(v) => Ok(v),
            None => match name {
                "id" => Ok(record.id().into()),
                "display_name" => Ok(Value::Str(record.display_name())),
                "length" => Ok(record.size_hint().into()),
                _ => Err(ExprError::no_attribute(record.model(), name)),
            },
        },
        Value::Str(_) | Value::Markup(_) | Value::List(_) if name == "length" => {
            Ok(target.len().into())
        }
        other => Err(ExprError::no_attribute(other.type_name(), name)),
    }
}

fn normalize_index(index: i64, size: usize) -> Result<usize, ExprError> {
    let resolved = if index < 0 { index + size as i64 } else { index };
    if resolved < 0 || resolved as usize >= size {
        return Err(ExprError::IndexOutOfRange { index, size });
    }
    Ok(resolved as usize)
}

/// Reads `target[index]`.
pub fn get_item(target: &Value, index: &Value) -> Result<Value, ExprError> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => {
            let at = normalize_index(*i, items.len())?;
            Ok(items[at].clone())
        }
        (Value::Str(s) | Value::Markup(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let at = normalize_index(*i, chars.len())?;
            Ok(Value::Str(chars[at].to_string()))
        }
        (Value::Map(map), key) => {
            let key = key.to_text();
            map.get(&key).cloned().ok_or(ExprError::KeyNotFound(key))
        }
        (Value::Record(record), Value::Str(field)) => record
            .get(field)
            .ok_or_else(|| ExprError::no_attribute(record.model(), field.as_str())),
        (Value::Record(record), Value::Int(i)) => match record.records() {
            Some(iter) => {
                let items: Vec<Value> = iter.collect();
                let at = normalize_index(*i, items.len())?;
                Ok(items[at].clone())
            }
            None => Err(ExprError::type_error("record is not subscriptable by position")),
        },
        (target, index) => Err(ExprError::type_error(format!(
            "'{}' indices must be integers, not '{}'",
            target.type_name(),
            index.type_name()
        ))),
    }
}
