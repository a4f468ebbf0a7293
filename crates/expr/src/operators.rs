//! Arithmetic, comparison and membership operators.

use crate::ast::BinaryOp;
use crate::error::ExprError;
use crate::value::Value;
use std::cmp::Ordering;

/// Applies a non-short-circuiting binary operator.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arithmetic(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => multiply(left, right),
        BinaryOp::Div => divide(left, right),
        BinaryOp::FloorDiv => floor_divide(left, right),
        BinaryOp::Mod => modulo(left, right),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => Ok(Value::Bool(left != right)),
        BinaryOp::Lt => ordering(op, left, right).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::LtEq => ordering(op, left, right).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::Gt => ordering(op, left, right).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::GtEq => ordering(op, left, right).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::In => contains(right, left).map(Value::Bool),
        BinaryOp::NotIn => contains(right, left).map(|b| Value::Bool(!b)),
        BinaryOp::Is => Ok(Value::Bool(identical(left, right))),
        BinaryOp::IsNot => Ok(Value::Bool(!identical(left, right))),
        BinaryOp::And | BinaryOp::Or => Err(ExprError::type_error(
            "logical operators are evaluated lazily",
        )),
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
        BinaryOp::In => "in",
        BinaryOp::NotIn => "not in",
        BinaryOp::Is => "is",
        BinaryOp::IsNot => "is not",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> ExprError {
    ExprError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol(op),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> ExprError {
    ExprError::type_error("integer overflow")
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_))
}

fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, ExprError> {
    match (left, right) {
        (Value::Float(_), _) | (_, Value::Float(_)) if is_number(left) && is_number(right) => {
            match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
                _ => Err(unsupported(op, left, right)),
            }
        }
        _ if is_number(left) && is_number(right) => match (left.as_i64(), right.as_i64()) {
            (Some(a), Some(b)) => int_op(a, b).map(Value::Int).ok_or_else(overflow),
            _ => Err(unsupported(op, left, right)),
        },
        _ => Err(unsupported(op, left, right)),
    }
}

fn add(left: &Value, right: &Value) -> Result<Value, ExprError> {
    match (left, right) {
        (Value::List(a), Value::List(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Ok(Value::List(items))
        }
        (Value::Markup(_), _) | (_, Value::Markup(_)) if !left.is_null() && !right.is_null() => {
            Ok(Value::Markup(format!("{}{}", left.to_markup(), right.to_markup())))
        }
        // string concatenation coerces the other operand to text
        (Value::Str(a), other) if !other.is_null() => Ok(Value::Str(format!("{}{}", a, other.to_text()))),
        (other, Value::Str(b)) if !other.is_null() => Ok(Value::Str(format!("{}{}", other.to_text(), b))),
        _ => arithmetic(BinaryOp::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

/// Upper bound on the length of a repeated string (bytes) or list (items).
pub const MAX_REPEAT_LEN: usize = 1 << 24;

fn repeat(len: usize, count: i64) -> Result<usize, ExprError> {
    let count = usize::try_from(count).unwrap_or(0);
    match len.checked_mul(count) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(count),
        _ => Err(ExprError::type_error(format!(
            "repeated sequence would exceed {} elements",
            MAX_REPEAT_LEN
        ))),
    }
}

fn multiply(left: &Value, right: &Value) -> Result<Value, ExprError> {
    match (left, right) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            Ok(Value::Str(s.repeat(repeat(s.len(), *n)?)))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            let count = repeat(items.len(), *n)?;
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(Value::List(out))
        }
        _ => arithmetic(BinaryOp::Mul, left, right, i64::checked_mul, |a, b| a * b),
    }
}

fn numbers(op: BinaryOp, left: &Value, right: &Value) -> Result<(f64, f64), ExprError> {
    if !is_number(left) || !is_number(right) {
        return Err(unsupported(op, left, right));
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(unsupported(op, left, right)),
    }
}

fn divide(left: &Value, right: &Value) -> Result<Value, ExprError> {
    let (a, b) = numbers(BinaryOp::Div, left, right)?;
    if b == 0.0 {
        return Err(ExprError::DivisionByZero);
    }
    Ok(Value::Float(a / b))
}

fn floor_divide(left: &Value, right: &Value) -> Result<Value, ExprError> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        if *b == 0 {
            return Err(ExprError::DivisionByZero);
        }
        let quotient = a.checked_div(*b).ok_or_else(overflow)?;
        let adjust = if (a % b != 0) && ((*a < 0) != (*b < 0)) { 1 } else { 0 };
        return Ok(Value::Int(quotient - adjust));
    }
    let (a, b) = numbers(BinaryOp::FloorDiv, left, right)?;
    if b == 0.0 {
        return Err(ExprError::DivisionByZero);
    }
    Ok(Value::Float((a / b).floor()))
}

fn modulo(left: &Value, right: &Value) -> Result<Value, ExprError> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        if *b == 0 {
            return Err(ExprError::DivisionByZero);
        }
        // result takes the sign of the divisor
        return Ok(Value::Int(((a % b) + b) % b));
    }
    let (a, b) = numbers(BinaryOp::Mod, left, right)?;
    if b == 0.0 {
        return Err(ExprError::DivisionByZero);
    }
    Ok(Value::Float(a - b * (a / b).floor()))
}

fn ordering(op: BinaryOp, left: &Value, right: &Value) -> Result<Ordering, ExprError> {
    left.compare(right).ok_or_else(|| {
        ExprError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            symbol(op),
            left.type_name(),
            right.type_name()
        ))
    })
}

/// Membership test: `needle in container`.
pub fn contains(container: &Value, needle: &Value) -> Result<bool, ExprError> {
    match container {
        Value::List(items) => Ok(items.contains(needle)),
        Value::Str(s) | Value::Markup(s) => match needle.as_str() {
            Some(n) => Ok(s.contains(n)),
            None => Err(ExprError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                needle.type_name()
            ))),
        },
        Value::Map(map) => Ok(map.contains_key(&needle.to_text())),
        Value::Record(record) => match record.records() {
            Some(mut iter) => Ok(iter.any(|r| &r == needle)),
            None => Ok(needle
                .as_str()
                .is_some_and(|field| record.get(field).is_some())),
        },
        other => Err(ExprError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null | Value::Bool(_), _) | (_, Value::Null | Value::Bool(_)) => false,
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(binary(BinaryOp::Add, &Value::Int(1), &Value::Int(1)).unwrap(), Value::Int(2));
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(
            binary(BinaryOp::FloorDiv, &Value::Int(-7), &Value::Int(2)).unwrap(),
            Value::Int(-4)
        );
        assert_eq!(binary(BinaryOp::Mod, &Value::Int(-7), &Value::Int(3)).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).unwrap_err(),
            ExprError::DivisionByZero
        );
    }

    #[test]
    fn test_sequence_repetition() {
        let list = Value::from(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            binary(BinaryOp::Mul, &list, &Value::Int(2)).unwrap(),
            Value::from(vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            binary(BinaryOp::Mul, &Value::Int(3), &Value::from("ab")).unwrap(),
            Value::from("ababab")
        );
        assert_eq!(binary(BinaryOp::Mul, &Value::from("ab"), &Value::Int(-1)).unwrap(), Value::from(""));
    }

    #[test]
    fn test_huge_repetition_is_an_error() {
        let list = Value::from(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(matches!(
            binary(BinaryOp::Mul, &list, &Value::Int(i64::MAX)),
            Err(ExprError::Type(_))
        ));
        assert!(matches!(
            binary(BinaryOp::Mul, &Value::from("ab"), &Value::Int(i64::MAX)),
            Err(ExprError::Type(_))
        ));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::from("n"), &Value::Int(3)).unwrap(),
            Value::from("n3")
        );
        assert_eq!(
            binary(BinaryOp::Add, &Value::markup("<b>"), &Value::from("<")).unwrap(),
            Value::markup("<b>&lt;")
        );
        assert!(binary(BinaryOp::Add, &Value::Null, &Value::Int(1)).is_err());
    }

    #[test]
    fn test_membership() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert!(contains(&list, &Value::Int(2)).unwrap());
        assert!(contains(&Value::from("hello"), &Value::from("ell")).unwrap());
        assert!(contains(&Value::Int(1), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_ordering_type_mismatch() {
        let err = binary(BinaryOp::Lt, &Value::from("a"), &Value::Int(1)).unwrap_err();
        assert!(matches!(err, ExprError::Type(_)));
    }
}
