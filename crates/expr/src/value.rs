//! The runtime value model shared by expressions, templates and converters.

use crate::ast::Expr;
use crate::error::ExprError;
use crate::functions::Builtin;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Insertion-ordered string-keyed map.
pub type Map = IndexMap<String, Value>;

/// A business record exposed to templates.
///
/// Templates only ever read records through this trait: attribute access
/// (`record.name`), `t-field` bindings and iteration over record sets.
pub trait Record: Send + Sync + fmt::Debug {
    fn model(&self) -> &str;

    fn id(&self) -> Option<i64>;

    /// Reads a field value. `None` means the field does not exist.
    fn get(&self, field: &str) -> Option<Value>;

    /// The logical type of a field, used to pick a converter.
    fn field_type(&self, _field: &str) -> Option<String> {
        None
    }

    fn check_access(&self, _operation: &str) -> bool {
        false
    }

    fn display_name(&self) -> String {
        match self.id() {
            Some(id) => format!("{}({})", self.model(), id),
            None => format!("{}()", self.model()),
        }
    }

    /// Iterates the records of a record set, if this record is one.
    fn records(&self) -> Option<Box<dyn Iterator<Item = Value> + '_>> {
        None
    }

    /// Number of records yielded by [`Record::records`], when known up front.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync;

/// A host function passed into render values.
#[derive(Clone)]
pub struct NativeFunction {
    name: Arc<str>,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, ExprError> {
        (self.func)(args)
    }
}

/// An anonymous function created by a lambda expression.
#[derive(Debug)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Arc<Expr>,
    pub captured: Vec<(String, Value)>,
}

#[derive(Clone)]
pub enum Function {
    Builtin(Builtin),
    Lambda(Arc<Lambda>),
    Native(NativeFunction),
}

impl Function {
    pub fn name(&self) -> String {
        match self {
            Function::Builtin(b) => b.name().to_string(),
            Function::Lambda(_) => "<lambda>".to_string(),
            Function::Native(n) => n.name().to_string(),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Builtin(b) => write!(f, "Builtin({})", b.name()),
            Function::Lambda(l) => write!(f, "Lambda({:?})", l.params),
            Function::Native(n) => write!(f, "Native({})", n.name()),
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Builtin(a), Function::Builtin(b)) => a == b,
            (Function::Lambda(a), Function::Lambda(b)) => Arc::ptr_eq(a, b),
            (Function::Native(a), Function::Native(b)) => Arc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Text that is already safe HTML and must not be escaped again.
    Markup(String),
    List(Vec<Value>),
    Map(Map),
    Record(Arc<dyn Record>),
    Function(Function),
}

impl Value {
    pub fn markup(text: impl Into<String>) -> Self {
        Value::Markup(text.into())
    }

    pub fn native<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
    {
        Value::Function(Function::Native(NativeFunction::new(name, func)))
    }

    pub fn record(record: impl Record + 'static) -> Self {
        Value::Record(Arc::new(record))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Markup(_) => "Markup",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
            Value::Record(_) => "record",
            Value::Function(_) => "function",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, Value::Markup(_))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) | Value::Markup(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Record(r) => r.size_hint() != Some(0),
            Value::Function(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Markup(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// The length of sized values; `None` for values without a length.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) | Value::Markup(s) => Some(s.chars().count()),
            Value::List(l) => Some(l.len()),
            Value::Map(m) => Some(m.len()),
            Value::Record(r) => r.size_hint(),
            _ => None,
        }
    }

    /// Text form used when a value is written to the output or interpolated.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Str(s) | Value::Markup(s) => s.clone(),
            _ => self.repr(),
        }
    }

    /// Literal-like representation, used for nested values and `repr()`.
    pub fn repr(&self) -> String {
        match self {
            Value::Null => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) | Value::Markup(s) => format!("'{}'", s.replace('\'', "\\'")),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Map(map) => {
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("'{}': {}", k, v.repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Record(r) => r.display_name(),
            Value::Function(func) => format!("<function {}>", func.name()),
        }
    }

    /// Markup form of the value: markup passes through, anything else is escaped.
    pub fn to_markup(&self) -> String {
        match self {
            Value::Markup(m) => m.clone(),
            other => escape_html(&other.to_text()),
        }
    }

    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                a.as_f64().and_then(|x| b.as_f64().and_then(|y| x.partial_cmp(&y)))
            }
            (Value::Str(a) | Value::Markup(a), Value::Str(b) | Value::Markup(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Bool(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Str(a) | Value::Markup(a), Value::Str(b) | Value::Markup(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a.model() == b.model() && a.id() == b.id(),
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::Int(3).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
    }

    #[test]
    fn test_text_forms() {
        assert_eq!(Value::Int(2).to_text(), "2");
        assert_eq!(Value::Float(2.0).to_text(), "2.0");
        assert_eq!(Value::Float(0.5).to_text(), "0.5");
        assert_eq!(Value::Bool(true).to_text(), "True");
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::from("a")]).to_text(),
            "[1, 'a']"
        );
    }

    #[test]
    fn test_markup_is_not_escaped_twice() {
        assert_eq!(Value::from("<b>").to_markup(), "&lt;b&gt;");
        assert_eq!(Value::markup("<b>").to_markup(), "<b>");
    }

    #[test]
    fn test_from_json_keeps_key_order() {
        let value = Value::from(json!({"b": 1, "a": [true, null, 1.5]}));
        let Value::Map(map) = value else {
            panic!("expected a map");
        };
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(
            map["a"],
            Value::List(vec![Value::Bool(true), Value::Null, Value::Float(1.5)])
        );
    }

    #[test]
    fn test_numeric_equality_across_types() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::from("2"));
        assert_eq!(Value::from("a"), Value::markup("a"));
    }
}
