use crate::ast::{Instruction, OutputOptions};
use crate::compiler_handlers::output::CALLER_CONTENT;
use crate::error::QWebError;
use crate::executor::{Executor, MAX_CALL_DEPTH};
use crate::executor_handlers::attributes::{attribute_text, keep_attribute};
use crate::output::{OutputSink, StringSink};
use crate::xml;
use qweb_expr::{CompiledExpr, FormatString, Value};

impl Executor<'_> {
    /// `t-call`: the callee renders straight into `sink` with a copy of the
    /// visible values.
    ///
    /// The call body runs in a pushed frame first, so `t-set`s inside it become
    /// parameters of the callee without touching the caller. Its output is passed
    /// as markup in `0`. Only the `lang` option is read from `t-options`.
    pub(crate) fn handle_call(
        &mut self,
        template: &FormatString,
        options: &OutputOptions,
        body: &[Instruction],
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(QWebError::evaluation(format!(
                "t-call nesting deeper than {} templates",
                MAX_CALL_DEPTH
            )));
        }
        let name = template.render(&mut self.scope)?.trim().to_string();
        let call_options = self.evaluate_options(options)?;

        self.scope.push();
        let mut content = StringSink::new();
        let rendered = self.execute(body, &mut content);
        let mut values = self.scope.flatten();
        self.scope.pop();
        rendered?;

        let content = content.into_string();
        if content.is_empty() {
            values.shift_remove(CALLER_CONTENT);
        } else {
            values.insert(CALLER_CONTENT.to_string(), Value::Markup(content));
        }

        let mut compile_options = self.template.options.clone();
        if let Some(lang) = call_options.get("lang").and_then(Value::as_str) {
            if compile_options.lang.as_deref() != Some(lang) {
                log::debug!("t-call '{}' switches language to '{}'", name, lang);
                compile_options = compile_options.with_lang(Some(lang.to_string()));
            }
        }
        compile_options.caller_template = Some(self.template.reference.clone());

        let callee = self.env.template(&name, &compile_options)?;
        self.nested(callee, values).run(sink)
    }

    pub(crate) fn handle_call_assets(
        &mut self,
        bundle: &FormatString,
        css: Option<&CompiledExpr>,
        js: Option<&CompiledExpr>,
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        let bundle = bundle.render(&mut self.scope)?;
        let css = match css {
            Some(expr) => self.eval(expr)?.is_truthy(),
            None => true,
        };
        let js = match js {
            Some(expr) => self.eval(expr)?.is_truthy(),
            None => true,
        };

        let assets = self.env.assets();
        let files = assets.bundle_files(&bundle, css, js)?;
        for node in assets.to_nodes(&bundle, &files)? {
            let attributes: Vec<(String, String)> = node
                .attributes
                .iter()
                .filter(|(_, value)| keep_attribute(value))
                .map(|(name, value)| (name.clone(), attribute_text(name, value)))
                .collect();
            let self_close = node.content.is_none();
            sink.write(&xml::open_tag_escaped(&node.tag, &attributes, self_close))?;
            if let Some(content) = &node.content {
                sink.write(content)?;
                sink.write(&xml::close_tag(&node.tag))?;
            }
        }
        Ok(())
    }
}
