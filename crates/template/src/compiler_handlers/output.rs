//! Content directives: t-field, t-esc, t-raw and t-out.
//!
//! The element's children are compiled as the fallback shown when the value is
//! empty. Whether the element appears at all is decided at render time.

use super::{Directive, check_variable_name};
use crate::ast::{Instruction, OutputMode, OutputOptions, OutputSource};
use crate::compiler::{Compiler, NodeCtx};
use crate::error::QWebError;
use crate::xml::{Element, T_TAG};

/// The name of the caller-content slot filled by `t-call`.
pub const CALLER_CONTENT: &str = "0";

impl Compiler<'_> {
    pub(crate) fn compile_output(
        &mut self,
        node: NodeCtx<'_>,
        directive: Directive,
    ) -> Result<Vec<Instruction>, QWebError> {
        let el = node.el;
        let expression = el.get(directive.attribute()).unwrap_or_default().trim();

        let (source, mode) = match directive {
            Directive::Field => (self.field_source(el, expression)?, OutputMode::Out),
            Directive::Esc => (self.output_source(expression)?, OutputMode::Esc),
            Directive::Raw => (self.output_source(expression)?, OutputMode::Raw),
            _ => (self.output_source(expression)?, OutputMode::Out),
        };
        let options = self.output_options(el)?;
        let tag = if el.tag == T_TAG {
            None
        } else {
            Some(self.tag_template(el, false)?)
        };
        let fallback = self.compile_children(el, node.path)?;

        Ok(vec![Instruction::Output {
            node: node.node,
            source,
            mode,
            options,
            tag,
            fallback,
        }])
    }

    fn output_source(&self, expression: &str) -> Result<OutputSource, QWebError> {
        if expression == CALLER_CONTENT {
            Ok(OutputSource::CallerContent)
        } else {
            Ok(OutputSource::Expr(self.expr(expression)?))
        }
    }

    fn field_source(&self, el: &Element, expression: &str) -> Result<OutputSource, QWebError> {
        if el.tag == T_TAG {
            return Err(QWebError::directive(format!(
                "t-field can not be used on a <t> element, found t-field=\"{}\"",
                expression
            )));
        }
        let Some((record, field)) = expression.rsplit_once('.') else {
            return Err(QWebError::directive(format!(
                "t-field must be a record and a field name separated by a dot, found \"{}\"",
                expression
            )));
        };
        check_variable_name(field, "t-field")?;
        Ok(OutputSource::Field {
            record: self.expr(record)?,
            field: field.to_string(),
            expression: expression.to_string(),
        })
    }

    /// `t-options`, `t-options-<key>` and, for calls, `t-lang`.
    pub(crate) fn output_options(&self, el: &Element) -> Result<OutputOptions, QWebError> {
        let mut options = OutputOptions::default();
        for (name, value) in &el.attributes {
            if name == "t-options" {
                options.base = Some(self.expr(value)?);
            } else if let Some(key) = name.strip_prefix("t-options-") {
                options.keys.push((key.to_string(), self.expr(value)?));
            } else if name == "t-lang" {
                options.keys.push(("lang".to_string(), self.expr(value)?));
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Instruction, OutputSource};
    use crate::compiler::compile_str;
    use crate::error::QWebError;
    use crate::options::CompileOptions;

    fn compile(source: &str) -> Result<Vec<Instruction>, QWebError> {
        compile_str(source, "test", &CompileOptions::default()).map(|t| t.body)
    }

    #[test]
    fn test_field_splits_record_and_field() {
        let body = compile(r#"<span t-field="doc.partner_id.name"/>"#).unwrap();
        let Instruction::Output {
            source: OutputSource::Field {
                field, expression, ..
            },
            ..
        } = &body[0]
        else {
            panic!("expected a field output");
        };
        assert_eq!(field, "name");
        assert_eq!(expression, "doc.partner_id.name");
    }

    #[test]
    fn test_field_shape_errors() {
        assert!(compile(r#"<t t-field="doc.name"/>"#).is_err());
        assert!(compile(r#"<span t-field="name"/>"#).is_err());
    }

    #[test]
    fn test_zero_reads_caller_content() {
        let body = compile(r#"<div t-out="0">default</div>"#).unwrap();
        let Instruction::Output {
            source, fallback, ..
        } = &body[0]
        else {
            panic!("expected an output");
        };
        assert!(matches!(source, OutputSource::CallerContent));
        assert!(matches!(fallback.as_slice(), [Instruction::Text(t)] if t == "default"));
    }

    #[test]
    fn test_options_are_collected() {
        let body =
            compile(r#"<span t-out="v" t-options="{'widget': 'float'}" t-options-precision="2"/>"#)
                .unwrap();
        let Instruction::Output { options, .. } = &body[0] else {
            panic!("expected an output");
        };
        assert!(options.base.is_some());
        assert_eq!(options.keys[0].0, "precision");
    }
}
