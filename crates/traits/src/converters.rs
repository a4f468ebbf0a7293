//! Field converter registry.
//!
//! `t-field` and widget-driven `t-out` hand values to a converter chosen by a
//! logical type name (`char`, `text`, `html`, `integer`, ...). A converter turns the
//! value into markup and may contribute attributes to the enclosing element.

use crate::error::CollaboratorError;
use qweb_expr::{Map, Record, Value, VariableScope, escape_html};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

pub trait Converter: Send + Sync + Debug {
    /// The type name the converter is registered under by default.
    fn name(&self) -> &'static str;

    /// Converts a value to markup. `Ok(None)` means "nothing to display".
    fn value_to_html(&self, value: &Value, options: &Map) -> Result<Option<Value>, CollaboratorError>;

    /// Converts a record field. Unset fields (`None`/`False`) display nothing.
    fn record_to_html(
        &self,
        record: &dyn Record,
        field: &str,
        options: &Map,
    ) -> Result<Option<Value>, CollaboratorError> {
        match read_field(self.name(), record, field)? {
            Value::Null | Value::Bool(false) => Ok(None),
            value => self.value_to_html(&value, options),
        }
    }

    /// Attributes added to the element of a `t-field`.
    ///
    /// With `inherit_branding` set in `options` this yields the `data-oe-*`
    /// attributes editors use to map output back to fields.
    fn attributes(
        &self,
        record: &dyn Record,
        field: &str,
        options: &Map,
        _values: &dyn VariableScope,
    ) -> Vec<(String, Value)> {
        if !options.get("inherit_branding").is_some_and(Value::is_truthy) {
            return Vec::new();
        }
        let option = |key: &str| options.get(key).cloned().unwrap_or_default();
        vec![
            ("data-oe-model".to_string(), Value::from(record.model())),
            ("data-oe-id".to_string(), Value::from(record.id())),
            ("data-oe-field".to_string(), Value::from(field)),
            ("data-oe-type".to_string(), option("type")),
            ("data-oe-expression".to_string(), option("expression")),
        ]
    }
}

fn read_field(type_name: &str, record: &dyn Record, field: &str) -> Result<Value, CollaboratorError> {
    record.get(field).ok_or_else(|| {
        CollaboratorError::converter(
            type_name,
            format!("'{}' has no field '{}'", record.model(), field),
        )
    })
}

/// Maps type names to converters. Built once and shared read-only by renders.
#[derive(Debug, Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every builtin converter.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for converter in builtin_converters() {
            registry.register_default(converter);
        }
        registry
    }

    /// Registers (or replaces) the converter for `type_name`.
    pub fn register(&mut self, type_name: impl Into<String>, converter: Arc<dyn Converter>) {
        let type_name = type_name.into();
        log::debug!("Registered converter '{}' for type '{}'", converter.name(), type_name);
        self.converters.insert(type_name, converter);
    }

    /// Registers a converter under its own name.
    pub fn register_default(&mut self, converter: Arc<dyn Converter>) {
        self.register(converter.name(), converter);
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn Converter>> {
        self.converters.get(type_name).cloned()
    }

    pub fn resolve(&self, type_name: &str) -> Result<Arc<dyn Converter>, CollaboratorError> {
        self.get(type_name)
            .ok_or_else(|| CollaboratorError::MissingConverter(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.converters.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

pub fn builtin_converters() -> Vec<Arc<dyn Converter>> {
    vec![
        Arc::new(CharConverter),
        Arc::new(TextConverter),
        Arc::new(HtmlConverter),
        Arc::new(IntegerConverter),
        Arc::new(FloatConverter),
        Arc::new(BooleanConverter),
        Arc::new(Many2OneConverter),
    ]
}

/// Escaped single-line text. An empty string stays an (empty) displayable value.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharConverter;

impl Converter for CharConverter {
    fn name(&self) -> &'static str {
        "char"
    }

    fn value_to_html(&self, value: &Value, _options: &Map) -> Result<Option<Value>, CollaboratorError> {
        Ok(match value {
            Value::Null | Value::Bool(false) => None,
            other => Some(Value::Markup(other.to_markup())),
        })
    }
}

/// Escaped multi-line text with line breaks turned into `<br/>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextConverter;

impl Converter for TextConverter {
    fn name(&self) -> &'static str {
        "text"
    }

    fn value_to_html(&self, value: &Value, _options: &Map) -> Result<Option<Value>, CollaboratorError> {
        Ok(match value {
            Value::Null | Value::Bool(false) => None,
            other => Some(Value::Markup(
                other.to_markup().split('\n').collect::<Vec<_>>().join("<br/>\n"),
            )),
        })
    }
}

/// Trusted HTML, written without escaping.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlConverter;

impl Converter for HtmlConverter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn value_to_html(&self, value: &Value, _options: &Map) -> Result<Option<Value>, CollaboratorError> {
        Ok(match value {
            Value::Null | Value::Bool(false) => None,
            other => Some(Value::Markup(other.to_text())),
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerConverter;

impl Converter for IntegerConverter {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn value_to_html(&self, value: &Value, _options: &Map) -> Result<Option<Value>, CollaboratorError> {
        match value {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(Value::Markup(i.to_string()))),
            Value::Float(f) => Ok(Some(Value::Markup(format!("{}", f.trunc() as i64)))),
            other => Err(CollaboratorError::converter(
                self.name(),
                format!("expected a number, got {}", other.type_name()),
            )),
        }
    }
}

/// Floats, honouring a `precision` option (digits after the decimal point).
#[derive(Debug, Default, Clone, Copy)]
pub struct FloatConverter;

impl Converter for FloatConverter {
    fn name(&self) -> &'static str {
        "float"
    }

    fn value_to_html(&self, value: &Value, options: &Map) -> Result<Option<Value>, CollaboratorError> {
        if value.is_null() {
            return Ok(None);
        }
        let number = value.as_f64().ok_or_else(|| {
            CollaboratorError::converter(
                self.name(),
                format!("expected a number, got {}", value.type_name()),
            )
        })?;
        let text = match options.get("precision").and_then(Value::as_i64) {
            Some(precision) if precision >= 0 => format!("{:.*}", precision as usize, number),
            _ => Value::Float(number).to_text(),
        };
        Ok(Some(Value::Markup(text)))
    }
}

/// Renders a read-only checkbox.
#[derive(Debug, Default, Clone, Copy)]
pub struct BooleanConverter;

impl Converter for BooleanConverter {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn value_to_html(&self, value: &Value, _options: &Map) -> Result<Option<Value>, CollaboratorError> {
        let checked = if value.is_truthy() {
            r#" checked="checked""#
        } else {
            ""
        };
        Ok(Some(Value::Markup(format!(
            r#"<input type="checkbox" readonly="readonly"{}/>"#,
            checked
        ))))
    }

    fn record_to_html(
        &self,
        record: &dyn Record,
        field: &str,
        options: &Map,
    ) -> Result<Option<Value>, CollaboratorError> {
        let value = read_field(self.name(), record, field)?;
        self.value_to_html(&value, options)
    }
}

/// A related record, displayed by its display name.
#[derive(Debug, Default, Clone, Copy)]
pub struct Many2OneConverter;

impl Converter for Many2OneConverter {
    fn name(&self) -> &'static str {
        "many2one"
    }

    fn value_to_html(&self, value: &Value, _options: &Map) -> Result<Option<Value>, CollaboratorError> {
        Ok(match value {
            Value::Null | Value::Bool(false) => None,
            Value::Record(record) if record.size_hint() == Some(0) => None,
            Value::Record(record) => Some(Value::Markup(escape_html(&record.display_name()))),
            other => Some(Value::Markup(other.to_markup())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Partner;

    impl Record for Partner {
        fn model(&self) -> &str {
            "res.partner"
        }

        fn id(&self) -> Option<i64> {
            Some(3)
        }

        fn get(&self, field: &str) -> Option<Value> {
            match field {
                "name" => Some(Value::from("Ada & Co")),
                "comment" => Some(Value::from("")),
                "active" => Some(Value::Bool(false)),
                "parent_id" => Some(Value::Null),
                _ => None,
            }
        }

        fn display_name(&self) -> String {
            "Ada & Co".to_string()
        }
    }

    fn convert(type_name: &str, value: Value) -> Option<Value> {
        ConverterRegistry::with_builtins()
            .resolve(type_name)
            .unwrap()
            .value_to_html(&value, &Map::new())
            .unwrap()
    }

    #[test]
    fn test_char_escapes_and_keeps_empty_string() {
        assert_eq!(
            convert("char", Value::from("<b>")),
            Some(Value::markup("&lt;b&gt;"))
        );
        assert_eq!(convert("char", Value::from("")), Some(Value::markup("")));
        assert_eq!(convert("char", Value::Null), None);
    }

    #[test]
    fn test_text_breaks_lines() {
        assert_eq!(
            convert("text", Value::from("a\nb")),
            Some(Value::markup("a<br/>\nb"))
        );
    }

    #[test]
    fn test_html_is_not_escaped() {
        assert_eq!(
            convert("html", Value::from("<i>x</i>")),
            Some(Value::markup("<i>x</i>"))
        );
    }

    #[test]
    fn test_float_precision() {
        let mut options = Map::new();
        options.insert("precision".into(), Value::Int(2));
        let value = FloatConverter
            .value_to_html(&Value::Float(3.14159), &options)
            .unwrap();
        assert_eq!(value, Some(Value::markup("3.14")));
        assert_eq!(convert("integer", Value::Int(0)), Some(Value::markup("0")));
    }

    #[test]
    fn test_record_fields() {
        let partner = Partner;
        let options = Map::new();
        assert_eq!(
            CharConverter.record_to_html(&partner, "name", &options).unwrap(),
            Some(Value::markup("Ada &amp; Co"))
        );
        assert_eq!(
            CharConverter.record_to_html(&partner, "comment", &options).unwrap(),
            Some(Value::markup(""))
        );
        assert_eq!(
            Many2OneConverter
                .record_to_html(&partner, "parent_id", &options)
                .unwrap(),
            None
        );
        assert!(
            BooleanConverter
                .record_to_html(&partner, "active", &options)
                .unwrap()
                .is_some()
        );
        assert!(CharConverter.record_to_html(&partner, "missing", &options).is_err());
    }

    #[test]
    fn test_branding_attributes() {
        let partner = Partner;
        let values = Map::new();
        assert!(
            CharConverter
                .attributes(&partner, "name", &Map::new(), &values)
                .is_empty()
        );

        let mut options = Map::new();
        options.insert("inherit_branding".into(), Value::Bool(true));
        options.insert("type".into(), Value::from("char"));
        options.insert("expression".into(), Value::from("partner.name"));
        let attrs = CharConverter.attributes(&partner, "name", &options, &values);
        assert_eq!(attrs[0], ("data-oe-model".to_string(), Value::from("res.partner")));
        assert_eq!(attrs[1], ("data-oe-id".to_string(), Value::Int(3)));
        assert_eq!(attrs[4].1, Value::from("partner.name"));
    }

    #[test]
    fn test_missing_converter() {
        let err = ConverterRegistry::new().resolve("monetary").unwrap_err();
        assert_eq!(err, CollaboratorError::MissingConverter("monetary".into()));
    }
}
