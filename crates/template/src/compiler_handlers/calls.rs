//! Terminal directives: t-call, t-call-assets and t-set.

use super::{check_variable_name, has_content};
use crate::ast::{Instruction, SetSource};
use crate::compiler::{Compiler, NodeCtx};
use crate::compiler_handlers::output::CALLER_CONTENT;
use crate::error::QWebError;

impl Compiler<'_> {
    pub(crate) fn compile_call_assets(
        &mut self,
        node: NodeCtx<'_>,
    ) -> Result<Vec<Instruction>, QWebError> {
        let el = node.el;
        if has_content(el) {
            return Err(QWebError::directive(
                "t-call-assets does not accept a body",
            ));
        }
        let bundle = self.format(el.get("t-call-assets").unwrap_or_default())?;
        let css = el.get("t-css").map(|src| self.expr(src)).transpose()?;
        let js = el.get("t-js").map(|src| self.expr(src)).transpose()?;
        Ok(vec![Instruction::CallAssets {
            node: node.node,
            bundle,
            css,
            js,
        }])
    }

    /// The body of a call is compiled like any other content and rendered into
    /// the callee's `0` variable.
    pub(crate) fn compile_call(
        &mut self,
        node: NodeCtx<'_>,
    ) -> Result<Vec<Instruction>, QWebError> {
        let el = node.el;
        let target = el.get("t-call").unwrap_or_default().trim();
        if target.is_empty() {
            return Err(QWebError::directive("t-call needs a template name"));
        }
        let template = self.format(target)?;
        let options = self.output_options(el)?;
        let body = self.compile_children(el, node.path)?;
        Ok(vec![Instruction::Call {
            node: node.node,
            template,
            options,
            body,
        }])
    }

    pub(crate) fn compile_set(&mut self, node: NodeCtx<'_>) -> Result<Vec<Instruction>, QWebError> {
        let el = node.el;
        let name = el.get("t-set").unwrap_or_default().trim().to_string();
        let value = el.get("t-value");
        let valuef = el.get("t-valuef");

        if value.is_some() && valuef.is_some() {
            return Err(QWebError::directive(format!(
                "t-set=\"{}\" can not have both t-value and t-valuef",
                name
            )));
        }
        let has_value = value.is_some() || valuef.is_some();
        if has_value && has_content(el) {
            return Err(QWebError::directive(format!(
                "t-set=\"{}\" with a value must not have a body",
                name
            )));
        }
        if name == CALLER_CONTENT {
            if has_value {
                return Err(QWebError::directive(
                    "the caller content '0' can only be set from a body",
                ));
            }
        } else {
            check_variable_name(&name, "t-set")?;
        }

        let source = match (value, valuef) {
            (Some(src), _) => SetSource::Value(self.expr(src)?),
            (None, Some(src)) => SetSource::Format(self.format(src)?),
            (None, None) => SetSource::Body(self.compile_children(el, node.path)?),
        };
        Ok(vec![Instruction::Set {
            node: node.node,
            name,
            source,
        }])
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Instruction, SetSource};
    use crate::compiler::compile_str;
    use crate::error::QWebError;
    use crate::options::CompileOptions;

    fn compile(source: &str) -> Result<Vec<Instruction>, QWebError> {
        compile_str(source, "test", &CompileOptions::default()).map(|t| t.body)
    }

    fn rejected(source: &str) -> bool {
        match compile(source) {
            Err(err) => matches!(err.root_cause(), QWebError::Directive(_)),
            Ok(_) => false,
        }
    }

    #[test]
    fn test_set_sources() {
        let body = compile(
            r#"<t><t t-set="a" t-value="1"/><t t-set="b" t-valuef="x {{a}}"/><t t-set="c"><b>c</b></t></t>"#,
        )
        .unwrap();
        let sources: Vec<&SetSource> = body
            .iter()
            .filter_map(|i| match i {
                Instruction::Set { source, .. } => Some(source),
                _ => None,
            })
            .collect();
        assert!(matches!(sources[0], SetSource::Value(_)));
        assert!(matches!(sources[1], SetSource::Format(_)));
        assert!(matches!(sources[2], SetSource::Body(b) if matches!(b.as_slice(), [Instruction::Text(t)] if t == "<b>c</b>")));
    }

    #[test]
    fn test_set_shape_errors() {
        assert!(rejected(r#"<t t-set="a" t-value="1">body</t>"#));
        assert!(rejected(r#"<t t-set="a" t-value="1" t-valuef="2"/>"#));
        assert!(rejected(r#"<t t-set="0" t-value="1"/>"#));
        assert!(rejected(r#"<t t-set="a-b" t-value="1"/>"#));
        assert!(compile(r#"<t t-set="0">caller</t>"#).is_ok());
        assert!(compile("<t t-set=\"a\" t-value=\"1\">\n  </t>").is_ok());
    }

    #[test]
    fn test_call_keeps_body_and_options() {
        let body = compile(r#"<t t-call="base.layout" t-options-title="'Hi'"><p>in</p></t>"#).unwrap();
        let Instruction::Call {
            template,
            options,
            body,
            ..
        } = &body[0]
        else {
            panic!("expected a call");
        };
        assert!(template.is_static());
        assert_eq!(options.keys[0].0, "title");
        assert!(matches!(body.as_slice(), [Instruction::Text(t)] if t == "<p>in</p>"));
    }

    #[test]
    fn test_call_assets_rejects_body() {
        assert!(compile(r#"<t t-call-assets="web.assets" t-js="False"/>"#).is_ok());
        assert!(rejected(r#"<t t-call-assets="web.assets">x</t>"#));
    }
}
