//! Content output and the empty/fallback/forced display policy.
//!
//! A value produces content unless it is `None` or `False`. Then:
//! - content: the element is written around it
//! - no content, fallback body: the element is written around the fallback
//! - no content, no fallback: the element is written empty only when display is
//!   forced, otherwise nothing is written at all

use crate::ast::{Instruction, OutputMode, OutputOptions, OutputSource, TagTemplate};
use crate::compiler_handlers::output::CALLER_CONTENT;
use crate::error::QWebError;
use crate::executor::Executor;
use crate::output::OutputSink;
use crate::xml;
use qweb_expr::{CompiledExpr, Map, Value, VariableScope, escape_html};

const DEFAULT_FIELD_TYPE: &str = "char";

struct Rendered {
    attributes: Vec<(String, Value)>,
    content: Option<String>,
    force_display: bool,
}

fn force_display(options: &Map) -> bool {
    options.get("force_display").is_some_and(Value::is_truthy)
}

impl Executor<'_> {
    pub(crate) fn handle_output(
        &mut self,
        source: &OutputSource,
        mode: OutputMode,
        options: &OutputOptions,
        tag: Option<&TagTemplate>,
        fallback: &[Instruction],
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        let options = self.evaluate_options(options)?;
        let Rendered {
            attributes,
            content,
            force_display,
        } = match source {
            OutputSource::Field {
                record,
                field,
                expression,
            } => self.render_field(record, field, expression, options)?,
            OutputSource::Expr(expr) => {
                let value = self.eval(expr)?;
                self.render_value(value, mode, options)?
            }
            OutputSource::CallerContent => {
                let value = self
                    .scope
                    .lookup(CALLER_CONTENT)
                    .filter(Value::is_truthy)
                    .unwrap_or_default();
                self.render_value(value, mode, options)?
            }
        };

        if content.is_none() && fallback.is_empty() && !force_display {
            return Ok(());
        }
        if let Some(tag) = tag {
            self.write_start_tag(tag, attributes, sink)?;
        }
        match content {
            Some(text) => sink.write(&text)?,
            None => self.execute(fallback, sink)?,
        }
        if let Some(tag) = tag {
            sink.write(&xml::close_tag(&tag.tag))?;
        }
        Ok(())
    }

    /// `t-options` merged with the `t-options-<key>` values.
    pub(crate) fn evaluate_options(&mut self, options: &OutputOptions) -> Result<Map, QWebError> {
        let mut merged = match &options.base {
            Some(expr) => match self.eval(expr)? {
                Value::Map(map) => map,
                Value::Null => Map::new(),
                other => {
                    return Err(QWebError::evaluation(format!(
                        "t-options must be a mapping, found {}",
                        other.type_name()
                    )));
                }
            },
            None => Map::new(),
        };
        for (key, expr) in &options.keys {
            let value = self.eval(expr)?;
            merged.insert(key.clone(), value);
        }
        Ok(merged)
    }

    fn render_value(
        &self,
        value: Value,
        mode: OutputMode,
        options: Map,
    ) -> Result<Rendered, QWebError> {
        let force_display = force_display(&options);
        if let Some(widget) = options.get("widget").and_then(Value::as_str) {
            let converter = self.env.converters().resolve(widget)?;
            let content = match value {
                Value::Null | Value::Bool(false) => None,
                value => converter.value_to_html(&value, &options)?,
            };
            return Ok(Rendered {
                attributes: Vec::new(),
                content: content.map(|v| v.to_markup()),
                force_display,
            });
        }
        let content = match value {
            Value::Null | Value::Bool(false) => None,
            value => Some(match mode {
                OutputMode::Esc => escape_html(&value.to_text()),
                OutputMode::Raw => value.to_text(),
                OutputMode::Out => value.to_markup(),
            }),
        };
        Ok(Rendered {
            attributes: Vec::new(),
            content,
            force_display,
        })
    }

    /// `t-field`: the record's field goes through the converter of its type.
    fn render_field(
        &mut self,
        record: &CompiledExpr,
        field: &str,
        expression: &str,
        mut options: Map,
    ) -> Result<Rendered, QWebError> {
        let target = self.eval(record)?;
        let found = target.type_name();
        let Value::Record(record) = target else {
            return Err(QWebError::evaluation(format!(
                "t-field=\"{}\" needs a record, found {}",
                expression, found
            )));
        };
        let type_name = options
            .get("widget")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| record.field_type(field))
            .unwrap_or_else(|| DEFAULT_FIELD_TYPE.to_string());
        let converter = self.env.converters().resolve(&type_name)?;

        let compile_options = &self.template.options;
        let branding = compile_options.inherit_branding
            || (compile_options.inherit_branding_auto && record.check_access("write"));
        options.insert("type".to_string(), Value::from(type_name.as_str()));
        options.insert("expression".to_string(), Value::from(expression));
        options.insert("inherit_branding".to_string(), Value::Bool(branding));

        let content = converter.record_to_html(&*record, field, &options)?;
        let attributes = converter.attributes(&*record, field, &options, &self.scope);
        Ok(Rendered {
            attributes,
            content: content.map(|v| v.to_markup()),
            force_display: branding || force_display(&options),
        })
    }
}
