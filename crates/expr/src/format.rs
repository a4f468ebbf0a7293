//! Format strings: literal text with `{{ expr }}` or `#{ expr }` interpolations.

use crate::engine::VariableScope;
use crate::error::ExprError;
use crate::CompiledExpr;

#[derive(Debug, Clone)]
pub enum FormatPart {
    Static(String),
    Dynamic(CompiledExpr),
}

/// A compiled format string.
#[derive(Debug, Clone)]
pub struct FormatString(pub Vec<FormatPart>);

impl FormatString {
    pub fn compile(source: &str, raise_on_missing: bool) -> Result<Self, ExprError> {
        let mut parts = Vec::new();
        let mut current_static = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            let opens = match c {
                '{' if chars.peek() == Some(&'{') => true,
                '#' if chars.peek() == Some(&'{') => true,
                _ => false,
            };
            if !opens {
                current_static.push(c);
                continue;
            }
            chars.next();
            let closing = if c == '{' { "}}" } else { "}" };

            let mut expr_str = String::new();
            let mut depth = 0;
            let mut closed = false;
            while let Some(ec) = chars.next() {
                match ec {
                    '{' => {
                        depth += 1;
                        expr_str.push(ec);
                    }
                    '}' if depth > 0 => {
                        depth -= 1;
                        expr_str.push(ec);
                    }
                    '}' => {
                        if closing == "}}" {
                            if chars.peek() != Some(&'}') {
                                expr_str.push(ec);
                                continue;
                            }
                            chars.next();
                        }
                        closed = true;
                        break;
                    }
                    _ => expr_str.push(ec),
                }
            }
            if !closed {
                return Err(ExprError::parse(
                    source,
                    format!("unterminated interpolation, expected '{}'", closing),
                ));
            }
            if !current_static.is_empty() {
                parts.push(FormatPart::Static(std::mem::take(&mut current_static)));
            }
            parts.push(FormatPart::Dynamic(CompiledExpr::compile(
                expr_str.trim(),
                raise_on_missing,
            )?));
        }

        if !current_static.is_empty() {
            parts.push(FormatPart::Static(current_static));
        }
        Ok(FormatString(parts))
    }

    pub fn is_static(&self) -> bool {
        self.0.iter().all(|p| matches!(p, FormatPart::Static(_)))
    }

    /// Concatenates the static text and the text form of every interpolated value.
    pub fn render(&self, scope: &mut dyn VariableScope) -> Result<String, ExprError> {
        let mut out = String::new();
        for part in &self.0 {
            match part {
                FormatPart::Static(s) => out.push_str(s),
                FormatPart::Dynamic(expr) => out.push_str(&expr.evaluate(scope)?.to_text()),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Map, Value};

    #[test]
    fn test_both_interpolation_styles() {
        let mut values = Map::new();
        values.insert("name".into(), Value::from("World"));
        values.insert("n".into(), Value::Int(2));
        let fmt = FormatString::compile("Hello {{ name }} #{n + 1}!", true).unwrap();
        assert!(!fmt.is_static());
        assert_eq!(fmt.render(&mut values).unwrap(), "Hello World 3!");
    }

    #[test]
    fn test_single_braces_are_literal() {
        let fmt = FormatString::compile("a {b} c", true).unwrap();
        assert!(fmt.is_static());
        assert_eq!(fmt.render(&mut Map::new()).unwrap(), "a {b} c");
    }

    #[test]
    fn test_dict_literal_inside_interpolation() {
        let fmt = FormatString::compile("#{ {a: 1}['a'] }", true).unwrap();
        assert_eq!(fmt.render(&mut Map::new()).unwrap(), "1");
    }

    #[test]
    fn test_unterminated_interpolation() {
        assert!(FormatString::compile("x {{ y", true).is_err());
    }
}
