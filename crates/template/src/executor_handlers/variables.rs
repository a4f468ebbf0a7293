use crate::ast::SetSource;
use crate::error::QWebError;
use crate::executor::Executor;
use crate::output::StringSink;
use qweb_expr::Value;

impl Executor<'_> {
    /// `t-set`: a body is rendered and stored as markup.
    pub(crate) fn handle_set(&mut self, name: &str, source: &SetSource) -> Result<(), QWebError> {
        let value = match source {
            SetSource::Value(expr) => self.eval(expr)?,
            SetSource::Format(format) => Value::Str(format.render(&mut self.scope)?),
            SetSource::Body(body) => {
                let mut content = StringSink::new();
                self.execute(body, &mut content)?;
                Value::Markup(content.into_string())
            }
        };
        self.scope.set(name, value);
        Ok(())
    }
}
