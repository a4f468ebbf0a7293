use crate::ast::{DynamicAttribute, Instruction, TagTemplate};
use crate::error::QWebError;
use crate::executor::Executor;
use crate::output::OutputSink;
use crate::xml;
use indexmap::IndexMap;
use qweb_expr::Value;

/// Attributes are written when truthy, or when they are an explicit empty string.
pub(crate) fn keep_attribute(value: &Value) -> bool {
    match value {
        Value::Str(s) | Value::Markup(s) => s.is_empty() || value.is_truthy(),
        other => other.is_truthy(),
    }
}

/// The escaped text of an attribute value.
pub(crate) fn attribute_text(name: &str, value: &Value) -> String {
    match value {
        Value::Bool(true) => name.to_string(),
        Value::Markup(markup) => markup.clone(),
        Value::List(items) => {
            let words: Vec<String> = items.iter().map(Value::to_text).collect();
            xml::escape_attr(&words.join(" "))
        }
        Value::Map(map) => {
            let pairs: String = map
                .iter()
                .map(|(key, item)| format!("{}:{};", key, item.to_text()))
                .collect();
            xml::escape_attr(&pairs)
        }
        other => xml::escape_attr(&other.to_text()),
    }
}

/// Name/value pairs from a `t-att` value: a mapping, a list of pairs or one pair.
fn bulk_attributes(value: Value, source: &str) -> Result<Vec<(String, Value)>, QWebError> {
    let pair = |item: Value| -> Result<(String, Value), QWebError> {
        match item {
            Value::List(mut parts) if parts.len() == 2 => {
                let value = parts.pop().unwrap_or_default();
                let name = parts.pop().unwrap_or_default().to_text();
                Ok((name, value))
            }
            other => Err(QWebError::evaluation(format!(
                "t-att=\"{}\" expects name/value pairs, found {}",
                source,
                other.repr()
            ))),
        }
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Map(map) => Ok(map.into_iter().collect()),
        Value::List(items) if !matches!(items.first(), Some(Value::List(_))) => {
            pair(Value::List(items)).map(|p| vec![p])
        }
        Value::List(items) => items.into_iter().map(pair).collect(),
        other => Err(QWebError::evaluation(format!(
            "t-att=\"{}\" must be a mapping or a list of pairs, found {}",
            source,
            other.type_name()
        ))),
    }
}

impl Executor<'_> {
    pub(crate) fn handle_tag(
        &mut self,
        tag: &TagTemplate,
        body: &[Instruction],
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        self.write_start_tag(tag, Vec::new(), sink)?;
        if !tag.self_close {
            self.execute(body, sink)?;
            sink.write(&xml::close_tag(&tag.tag))?;
        }
        Ok(())
    }

    /// Writes the start tag of `tag`.
    ///
    /// Static attributes come first in document order. Dynamic ones are evaluated
    /// in order and replace a static of the same name in place. `extra` attributes
    /// (from converters) go last. The whole list then passes the attribute hook.
    pub(crate) fn write_start_tag(
        &mut self,
        tag: &TagTemplate,
        extra: Vec<(String, Value)>,
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        let mut attributes: IndexMap<String, Value> = tag
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), Value::Markup(value.clone())))
            .collect();
        for dynamic in &tag.dynamic {
            match dynamic {
                DynamicAttribute::Expr { name, value } => {
                    let value = self.eval(value)?;
                    attributes.insert(name.clone(), value);
                }
                DynamicAttribute::Format { name, value } => {
                    let value = value.render(&mut self.scope)?;
                    attributes.insert(name.clone(), Value::Str(value));
                }
                DynamicAttribute::Bulk(expr) => {
                    let value = self.eval(expr)?;
                    attributes.extend(bulk_attributes(value, expr.source())?);
                }
            }
        }
        attributes.extend(extra);

        let attributes = self
            .env
            .attribute_hook()
            .post_process(&tag.tag, attributes.into_iter().collect());
        let rendered: Vec<(String, String)> = attributes
            .into_iter()
            .filter(|(_, value)| keep_attribute(value))
            .map(|(name, value)| {
                let text = attribute_text(&name, &value);
                (name, text)
            })
            .collect();
        sink.write(&xml::open_tag_escaped(&tag.tag, &rendered, tag.self_close))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qweb_expr::Map;

    #[test]
    fn test_attribute_filtering() {
        assert!(keep_attribute(&Value::from("")));
        assert!(keep_attribute(&Value::Int(3)));
        assert!(!keep_attribute(&Value::Null));
        assert!(!keep_attribute(&Value::Bool(false)));
        assert!(!keep_attribute(&Value::Int(0)));
    }

    #[test]
    fn test_attribute_text_forms() {
        assert_eq!(attribute_text("checked", &Value::Bool(true)), "checked");
        assert_eq!(
            attribute_text("class", &Value::from(vec![Value::from("a"), Value::from("b")])),
            "a b"
        );
        let mut style = Map::new();
        style.insert("color".into(), Value::from("red"));
        assert_eq!(attribute_text("style", &Value::Map(style)), "color:red;");
        assert_eq!(attribute_text("title", &Value::from("a\"b")), "a&quot;b");
        assert_eq!(attribute_text("title", &Value::markup("&amp;")), "&amp;");
    }

    #[test]
    fn test_bulk_shapes() {
        let single = Value::from(vec![Value::from("id"), Value::Int(4)]);
        assert_eq!(
            bulk_attributes(single, "x").unwrap(),
            vec![("id".to_string(), Value::Int(4))]
        );
        let pairs = Value::from(vec![
            Value::from(vec![Value::from("a"), Value::from("1")]),
            Value::from(vec![Value::from("b"), Value::from("2")]),
        ]);
        assert_eq!(bulk_attributes(pairs, "x").unwrap().len(), 2);
        assert!(bulk_attributes(Value::Int(1), "x").is_err());
    }
}
