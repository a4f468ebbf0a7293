//! Builtin helper functions and the methods available on values.

use crate::engine::EvaluationContext;
use crate::error::ExprError;
use crate::operators::MAX_REPEAT_LEN;
use crate::value::{Function, Map, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Len,
    Str,
    Int,
    Float,
    Bool,
    Abs,
    Min,
    Max,
    Round,
    Range,
    Sum,
    Any,
    All,
    Sorted,
    List,
    Dict,
    Enumerate,
    Zip,
    Join,
    Repr,
    HasAttr,
}

impl Builtin {
    pub const ALL: &'static [Builtin] = &[
        Builtin::Len,
        Builtin::Str,
        Builtin::Int,
        Builtin::Float,
        Builtin::Bool,
        Builtin::Abs,
        Builtin::Min,
        Builtin::Max,
        Builtin::Round,
        Builtin::Range,
        Builtin::Sum,
        Builtin::Any,
        Builtin::All,
        Builtin::Sorted,
        Builtin::List,
        Builtin::Dict,
        Builtin::Enumerate,
        Builtin::Zip,
        Builtin::Join,
        Builtin::Repr,
        Builtin::HasAttr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Round => "round",
            Builtin::Range => "range",
            Builtin::Sum => "sum",
            Builtin::Any => "any",
            Builtin::All => "all",
            Builtin::Sorted => "sorted",
            Builtin::List => "list",
            Builtin::Dict => "dict",
            Builtin::Enumerate => "enumerate",
            Builtin::Zip => "zip",
            Builtin::Join => "join",
            Builtin::Repr => "repr",
            Builtin::HasAttr => "hasattr",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|b| b.name() == name)
    }
}

type Kwargs = Vec<(String, Value)>;

fn arg<'v>(function: &str, args: &'v [Value], index: usize) -> Result<&'v Value, ExprError> {
    args.get(index).ok_or_else(|| {
        ExprError::function(function, format!("missing required argument {}", index + 1))
    })
}

fn kwarg<'v>(kwargs: &'v Kwargs, name: &str) -> Option<&'v Value> {
    kwargs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

fn expect_arity(function: &str, args: &[Value], min: usize, max: usize) -> Result<(), ExprError> {
    if args.len() < min || args.len() > max {
        return Err(ExprError::function(
            function,
            format!(
                "takes {} to {} arguments but {} were given",
                min,
                max,
                args.len()
            ),
        ));
    }
    Ok(())
}

/// Materializes the items of an iterable value.
///
/// Mappings yield their keys, strings their characters, record sets their records.
pub fn iterate(value: &Value) -> Result<Vec<Value>, ExprError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Map(map) => Ok(map.keys().map(|k| Value::Str(k.clone())).collect()),
        Value::Str(s) | Value::Markup(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Record(record) => match record.records() {
            Some(iter) => Ok(iter.collect()),
            None => Ok(vec![value.clone()]),
        },
        other => Err(ExprError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

fn to_int(function: &str, value: &Value) -> Result<i64, ExprError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        Value::Str(s) | Value::Markup(s) => s.trim().parse::<i64>().map_err(|_| {
            ExprError::function(function, format!("invalid literal for int(): '{}'", s))
        }),
        other => Err(ExprError::function(
            function,
            format!("cannot convert '{}' to int", other.type_name()),
        )),
    }
}

fn to_float(function: &str, value: &Value) -> Result<f64, ExprError> {
    match value {
        Value::Str(s) | Value::Markup(s) => s.trim().parse::<f64>().map_err(|_| {
            ExprError::function(function, format!("could not convert string to float: '{}'", s))
        }),
        other => other.as_f64().ok_or_else(|| {
            ExprError::function(
                function,
                format!("cannot convert '{}' to float", other.type_name()),
            )
        }),
    }
}

/// Sorts values, optionally through a key function. Incomparable items are an error.
fn sort_values(
    ctx: &mut EvaluationContext<'_>,
    items: Vec<Value>,
    key: Option<&Value>,
    reverse: bool,
) -> Result<Vec<Value>, ExprError> {
    let keys = match key {
        Some(Value::Function(func)) => items
            .iter()
            .map(|item| ctx.call(func, vec![item.clone()], Vec::new()))
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Null) | None => items.clone(),
        Some(other) => {
            return Err(ExprError::function(
                "sorted",
                format!("key must be a function, not '{}'", other.type_name()),
            ));
        }
    };
    let mut indices: Vec<usize> = (0..items.len()).collect();
    let mut failure = None;
    indices.sort_by(|&a, &b| match keys[a].compare(&keys[b]) {
        Some(ord) => ord,
        None => {
            failure.get_or_insert_with(|| {
                ExprError::type_error(format!(
                    "'<' not supported between instances of '{}' and '{}'",
                    keys[a].type_name(),
                    keys[b].type_name()
                ))
            });
            Ordering::Equal
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    if reverse {
        indices.reverse();
    }
    Ok(indices.into_iter().map(|i| items[i].clone()).collect())
}

fn extremum(
    ctx: &mut EvaluationContext<'_>,
    name: &str,
    args: Vec<Value>,
    kwargs: &Kwargs,
    want: Ordering,
) -> Result<Value, ExprError> {
    let items = if args.len() == 1 {
        iterate(&args[0])?
    } else {
        args
    };
    if items.is_empty() {
        return match kwarg(kwargs, "default") {
            Some(default) => Ok(default.clone()),
            None => Err(ExprError::function(name, "arg is an empty sequence")),
        };
    }
    let sorted = sort_values(ctx, items, kwarg(kwargs, "key"), false)?;
    let picked = if want == Ordering::Less {
        sorted.into_iter().next()
    } else {
        sorted.into_iter().last()
    };
    Ok(picked.unwrap_or_default())
}

fn round_value(args: &[Value]) -> Result<Value, ExprError> {
    expect_arity("round", args, 1, 2)?;
    let number = to_float("round", &args[0])?;
    match args.get(1) {
        None | Some(Value::Null) => {
            let rounded = round_half_even(number);
            Ok(Value::Int(rounded as i64))
        }
        Some(digits) => {
            let digits = to_int("round", digits)?;
            let factor = 10f64.powi(digits as i32);
            let rounded = round_half_even(number * factor) / factor;
            Ok(if matches!(args[0], Value::Int(_)) && digits >= 0 {
                args[0].clone()
            } else {
                Value::Float(rounded)
            })
        }
    }
}

fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - x.signum()
    } else {
        rounded
    }
}

fn range(args: &[Value]) -> Result<Value, ExprError> {
    expect_arity("range", args, 1, 3)?;
    let ints = args
        .iter()
        .map(|a| to_int("range", a))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => (0, 0, 1),
    };
    if step == 0 {
        return Err(ExprError::function("range", "arg 3 must not be zero"));
    }
    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let stride = i128::from(step).abs();
    let len = if span > 0 { (span + stride - 1) / stride } else { 0 };
    if len > MAX_REPEAT_LEN as i128 {
        return Err(ExprError::function(
            "range",
            format!("more than {} elements", MAX_REPEAT_LEN),
        ));
    }
    let mut out = Vec::with_capacity(len as usize);
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::List(out))
}

fn dict(args: &[Value], kwargs: Kwargs) -> Result<Value, ExprError> {
    let mut map = Map::new();
    if let Some(source) = args.first() {
        match source {
            Value::Map(m) => map.extend(m.iter().map(|(k, v)| (k.clone(), v.clone()))),
            other => {
                for pair in iterate(other)? {
                    let items = iterate(&pair)?;
                    let [key, value] = items.as_slice() else {
                        return Err(ExprError::function(
                            "dict",
                            "sequence elements must be key/value pairs",
                        ));
                    };
                    map.insert(key.to_text(), value.clone());
                }
            }
        }
    }
    map.extend(kwargs);
    Ok(Value::Map(map))
}

pub fn call_builtin(
    ctx: &mut EvaluationContext<'_>,
    builtin: Builtin,
    args: Vec<Value>,
    kwargs: Kwargs,
) -> Result<Value, ExprError> {
    let name = builtin.name();
    match builtin {
        Builtin::Len => {
            let value = arg(name, &args, 0)?;
            value.len().map(Value::from).ok_or_else(|| {
                ExprError::type_error(format!(
                    "object of type '{}' has no len()",
                    value.type_name()
                ))
            })
        }
        Builtin::Str => Ok(Value::Str(args.first().map(Value::to_text).unwrap_or_default())),
        Builtin::Int => match args.first() {
            Some(v) => to_int(name, v).map(Value::Int),
            None => Ok(Value::Int(0)),
        },
        Builtin::Float => match args.first() {
            Some(v) => to_float(name, v).map(Value::Float),
            None => Ok(Value::Float(0.0)),
        },
        Builtin::Bool => Ok(Value::Bool(args.first().is_some_and(Value::is_truthy))),
        Builtin::Abs => match arg(name, &args, 0)? {
            Value::Int(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| ExprError::type_error("integer overflow")),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(ExprError::function(
                name,
                format!("bad operand type '{}'", other.type_name()),
            )),
        },
        Builtin::Min => extremum(ctx, name, args, &kwargs, Ordering::Less),
        Builtin::Max => extremum(ctx, name, args, &kwargs, Ordering::Greater),
        Builtin::Round => round_value(&args),
        Builtin::Range => range(&args),
        Builtin::Sum => {
            let items = iterate(arg(name, &args, 0)?)?;
            let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
            for item in items {
                total = crate::operators::binary(crate::ast::BinaryOp::Add, &total, &item)?;
            }
            Ok(total)
        }
        Builtin::Any => Ok(Value::Bool(
            iterate(arg(name, &args, 0)?)?.iter().any(Value::is_truthy),
        )),
        Builtin::All => Ok(Value::Bool(
            iterate(arg(name, &args, 0)?)?.iter().all(Value::is_truthy),
        )),
        Builtin::Sorted => {
            let items = iterate(arg(name, &args, 0)?)?;
            let reverse = kwarg(&kwargs, "reverse").is_some_and(Value::is_truthy);
            sort_values(ctx, items, kwarg(&kwargs, "key"), reverse).map(Value::List)
        }
        Builtin::List => match args.first() {
            Some(v) => iterate(v).map(Value::List),
            None => Ok(Value::List(Vec::new())),
        },
        Builtin::Dict => dict(&args, kwargs),
        Builtin::Enumerate => {
            let start = match args.get(1).or(kwarg(&kwargs, "start")) {
                Some(v) => to_int(name, v)?,
                None => 0,
            };
            let items = iterate(arg(name, &args, 0)?)?;
            Ok(Value::List(
                items
                    .into_iter()
                    .zip(start..)
                    .map(|(item, i)| Value::List(vec![Value::Int(i), item]))
                    .collect(),
            ))
        }
        Builtin::Zip => {
            let columns = args.iter().map(iterate).collect::<Result<Vec<_>, _>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::List(
                (0..rows)
                    .map(|r| Value::List(columns.iter().map(|c| c[r].clone()).collect()))
                    .collect(),
            ))
        }
        Builtin::Join => {
            let items = iterate(arg(name, &args, 0)?)?;
            let sep = args
                .get(1)
                .or(kwarg(&kwargs, "sep"))
                .map(Value::to_text)
                .unwrap_or_default();
            Ok(Value::Str(
                items.iter().map(Value::to_text).collect::<Vec<_>>().join(&sep),
            ))
        }
        Builtin::Repr => Ok(Value::Str(arg(name, &args, 0)?.repr())),
        Builtin::HasAttr => {
            let target = arg(name, &args, 0)?;
            let attr = arg(name, &args, 1)?.to_text();
            Ok(Value::Bool(match target {
                Value::Map(m) => m.contains_key(&attr),
                Value::Record(r) => r.get(&attr).is_some(),
                Value::Str(_) | Value::Markup(_) | Value::List(_) => attr == "length",
                _ => false,
            }))
        }
    }
}

/// Calls `target.name(args)`.
pub fn call_method(
    ctx: &mut EvaluationContext<'_>,
    target: &Value,
    name: &str,
    args: Vec<Value>,
    kwargs: Kwargs,
) -> Result<Value, ExprError> {
    match target {
        Value::Str(s) | Value::Markup(s) => string_method(s, name, &args, &kwargs),
        Value::List(items) => list_method(items, name, &args),
        Value::Map(map) => match map.get(name) {
            Some(Value::Function(func)) => ctx.call(func, args, kwargs),
            Some(other) => Err(ExprError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
            None => map_method(map, name, &args),
        },
        Value::Record(record) => match record.get(name) {
            Some(Value::Function(func)) => ctx.call(&func, args, kwargs),
            Some(other) => Err(ExprError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
            None => Err(ExprError::no_attribute(record.model(), name)),
        },
        other => Err(ExprError::no_attribute(other.type_name(), name)),
    }
}

fn text_arg(method: &str, args: &[Value], index: usize) -> Result<String, ExprError> {
    arg(method, args, index).map(Value::to_text)
}

fn string_method(s: &str, name: &str, args: &[Value], kwargs: &Kwargs) -> Result<Value, ExprError> {
    let strip_chars = |index: usize| -> Option<Vec<char>> {
        args.get(index)
            .filter(|v| !v.is_null())
            .map(|v| v.to_text().chars().collect())
    };
    let result = match name {
        "upper" => Value::Str(s.to_uppercase()),
        "lower" => Value::Str(s.to_lowercase()),
        "strip" => Value::Str(match strip_chars(0) {
            Some(chars) => s.trim_matches(chars.as_slice()).to_string(),
            None => s.trim().to_string(),
        }),
        "lstrip" => Value::Str(match strip_chars(0) {
            Some(chars) => s.trim_start_matches(chars.as_slice()).to_string(),
            None => s.trim_start().to_string(),
        }),
        "rstrip" => Value::Str(match strip_chars(0) {
            Some(chars) => s.trim_end_matches(chars.as_slice()).to_string(),
            None => s.trim_end().to_string(),
        }),
        "split" => {
            let parts: Vec<Value> = match args.first().filter(|v| !v.is_null()) {
                Some(sep) => s.split(sep.to_text().as_str()).map(Value::from).collect(),
                None => s.split_whitespace().map(Value::from).collect(),
            };
            Value::List(parts)
        }
        "replace" => Value::Str(s.replace(&text_arg(name, args, 0)?, &text_arg(name, args, 1)?)),
        "startswith" => Value::Bool(s.starts_with(&text_arg(name, args, 0)?)),
        "endswith" => Value::Bool(s.ends_with(&text_arg(name, args, 0)?)),
        "join" => {
            let items = iterate(arg(name, args, 0)?)?;
            Value::Str(items.iter().map(Value::to_text).collect::<Vec<_>>().join(s))
        }
        "format" => Value::Str(format_placeholders(s, args, kwargs)?),
        "title" => Value::Str(
            s.split(' ')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        "capitalize" => Value::Str(capitalize(s)),
        _ => return Err(ExprError::no_attribute("str", name)),
    };
    Ok(result)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `"{} of {total}".format(a, total=b)` style placeholder substitution.
fn format_placeholders(template: &str, args: &[Value], kwargs: &Kwargs) -> Result<String, ExprError> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    let mut auto_index = 0;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let field: String = chars.by_ref().take_while(|&ec| ec != '}').collect();
                let field = field.trim();
                let value = if field.is_empty() {
                    auto_index += 1;
                    args.get(auto_index - 1)
                } else if let Ok(index) = field.parse::<usize>() {
                    args.get(index)
                } else {
                    kwarg(kwargs, field)
                };
                match value {
                    Some(v) => out.push_str(&v.to_text()),
                    None => {
                        return Err(ExprError::function(
                            "format",
                            format!("missing value for placeholder '{{{}}}'", field),
                        ));
                    }
                }
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

fn list_method(items: &[Value], name: &str, args: &[Value]) -> Result<Value, ExprError> {
    match name {
        "index" => {
            let needle = arg(name, args, 0)?;
            items
                .iter()
                .position(|v| v == needle)
                .map(Value::from)
                .ok_or_else(|| {
                    ExprError::function("index", format!("{} is not in list", needle.repr()))
                })
        }
        "count" => {
            let needle = arg(name, args, 0)?;
            Ok(Value::from(items.iter().filter(|v| *v == needle).count()))
        }
        _ => Err(ExprError::no_attribute("list", name)),
    }
}

fn map_method(map: &Map, name: &str, args: &[Value]) -> Result<Value, ExprError> {
    match name {
        "get" => {
            let key = text_arg(name, args, 0)?;
            Ok(map
                .get(&key)
                .cloned()
                .unwrap_or_else(|| args.get(1).cloned().unwrap_or_default()))
        }
        "keys" => Ok(Value::List(map.keys().map(|k| Value::Str(k.clone())).collect())),
        "values" => Ok(Value::List(map.values().cloned().collect())),
        "items" => Ok(Value::List(
            map.iter()
                .map(|(k, v)| Value::List(vec![Value::Str(k.clone()), v.clone()]))
                .collect(),
        )),
        _ => Err(ExprError::no_attribute("dict", name)),
    }
}

/// Unwraps a callable value.
pub fn as_function(value: &Value) -> Result<&Function, ExprError> {
    match value {
        Value::Function(func) => Ok(func),
        other => Err(ExprError::type_error(format!(
            "'{}' object is not callable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(*builtin));
        }
        assert_eq!(Builtin::from_name("eval"), None);
    }

    #[test]
    fn test_iterate_mapping_yields_keys() {
        let mut map = Map::new();
        map.insert("a".into(), Value::Int(1));
        map.insert("b".into(), Value::Int(2));
        assert_eq!(
            iterate(&Value::Map(map)).unwrap(),
            vec![Value::from("a"), Value::from("b")]
        );
        assert!(iterate(&Value::Int(3)).is_err());
    }

    #[test]
    fn test_format_placeholders() {
        let out = format_placeholders(
            "{} of {total} {{x}}",
            &[Value::Int(1)],
            &vec![("total".to_string(), Value::Int(3))],
        )
        .unwrap();
        assert_eq!(out, "1 of 3 {x}");
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_value(&[Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(round_value(&[Value::Float(3.5)]).unwrap(), Value::Int(4));
        assert_eq!(
            round_value(&[Value::Float(1.234), Value::Int(2)]).unwrap(),
            Value::Float(1.23)
        );
    }

    #[test]
    fn test_range() {
        assert_eq!(
            range(&[Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap(),
            Value::List(vec![Value::Int(5), Value::Int(3), Value::Int(1)])
        );
        assert!(range(&[Value::Int(1), Value::Int(2), Value::Int(0)]).is_err());
    }

    #[test]
    fn test_range_near_integer_limits() {
        let near_max = range(&[Value::Int(i64::MAX - 1), Value::Int(i64::MAX), Value::Int(5)]).unwrap();
        assert_eq!(near_max, Value::List(vec![Value::Int(i64::MAX - 1)]));
        let near_min = range(&[Value::Int(i64::MIN + 1), Value::Int(i64::MIN), Value::Int(-5)]).unwrap();
        assert_eq!(near_min, Value::List(vec![Value::Int(i64::MIN + 1)]));
        assert!(range(&[Value::Int(0), Value::Int(i64::MAX)]).is_err());
    }

    #[test]
    fn test_string_methods() {
        let kwargs = Vec::new();
        assert_eq!(
            string_method("  hi ", "strip", &[], &kwargs).unwrap(),
            Value::from("hi")
        );
        assert_eq!(
            string_method("a,b", "split", &[Value::from(",")], &kwargs).unwrap(),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(
            string_method("hello world", "title", &[], &kwargs).unwrap(),
            Value::from("Hello World")
        );
        assert!(string_method("x", "__class__", &[], &kwargs).is_err());
    }
}
