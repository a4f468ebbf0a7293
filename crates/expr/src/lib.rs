//! Sandboxed expression language for QWeb templates.
//!
//! Expression source goes through four stages before it can run:
//! tokenizing, rewriting free names into lookups on the render values,
//! parsing the rewritten source, and validating/lowering the parsed tree so it
//! can only reach the values container, lambda parameters and builtin helpers.
//!
//! # Key Types
//!
//! - [`CompiledExpr`]: a validated expression ready for evaluation
//! - [`Value`]: runtime values, including [`Record`] trait objects
//! - [`VariableScope`]: the values container seen by expressions
//! - [`FormatString`]: `{{ }}` / `#{ }` interpolated strings
//!
//! # Example
//!
//! ```ignore
//! use qweb_expr::{CompiledExpr, Map, Value};
//!
//! let expr = CompiledExpr::compile("price * qty", true)?;
//! let mut values = Map::new();
//! values.insert("price".into(), Value::Int(3));
//! values.insert("qty".into(), Value::Int(2));
//! assert_eq!(expr.evaluate(&mut values)?, Value::Int(6));
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod format;
pub mod functions;
pub mod operators;
pub mod parser;
pub mod rewriter;
pub mod safety;
pub mod tokenizer;
pub mod value;

pub use ast::Expr;
pub use engine::{EvaluationContext, VariableScope, evaluate};
pub use error::ExprError;
pub use format::{FormatPart, FormatString};
pub use functions::{Builtin, iterate};
pub use rewriter::{ALLOWED_NAMES, compile_expr};
pub use value::{Function, Map, NativeFunction, Record, Value, escape_html};

use std::sync::Arc;

/// An expression that went through rewriting and safety validation.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: Arc<str>,
    rewritten: Arc<str>,
    expr: Arc<Expr>,
}

impl CompiledExpr {
    pub fn compile(source: &str, raise_on_missing: bool) -> Result<Self, ExprError> {
        let rewritten = rewriter::rewrite(source, raise_on_missing)?;
        let parsed = parser::parse_expression(&rewritten).map_err(|e| match e {
            ExprError::Parse { message, .. } => ExprError::parse(source, message),
            other => other,
        })?;
        let expr = safety::validate(parsed, source)?;
        log::trace!("Compiled expression '{}' as '{}'", source, rewritten);
        Ok(Self {
            source: Arc::from(source),
            rewritten: Arc::from(rewritten.as_str()),
            expr: Arc::new(expr),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rewritten(&self) -> &str {
        &self.rewritten
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// True for a plain name reference such as `x`.
    pub fn as_variable(&self) -> Option<&str> {
        match self.expr.as_ref() {
            Expr::Var { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn evaluate(&self, scope: &mut dyn VariableScope) -> Result<Value, ExprError> {
        evaluate(&self.expr, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_keeps_source_and_rewrite() {
        let expr = CompiledExpr::compile("a.b", false).unwrap();
        assert_eq!(expr.source(), "a.b");
        assert_eq!(expr.rewritten(), r#"values.get("a").b"#);
        assert_eq!(expr.as_variable(), None);
        assert_eq!(CompiledExpr::compile("x", true).unwrap().as_variable(), Some("x"));
    }

    #[test]
    fn test_errors_name_the_original_source() {
        let err = CompiledExpr::compile("a +", true).unwrap_err();
        assert!(matches!(err, ExprError::Parse { ref expression, .. } if expression == "a +"));
        assert!(err.is_compile_time());
    }

    #[test]
    fn test_forbidden_attribute_is_unsafe() {
        let err = CompiledExpr::compile("obj.__class__", true).unwrap_err();
        assert!(matches!(err, ExprError::Unsafe { .. }));
    }
}
