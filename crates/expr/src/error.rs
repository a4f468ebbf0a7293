use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Tokenization error in '{expression}': {message}")]
    Tokenize { expression: String, message: String },

    #[error("Parse error in '{expression}': {message}")]
    Parse { expression: String, message: String },

    #[error("Unsafe expression '{expression}': {reason}")]
    Unsafe { expression: String, reason: String },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Name '{0}' is not defined")]
    UndefinedName(String),

    #[error("Function '{function}' error: {message}")]
    Function { function: String, message: String },

    #[error("'{type_name}' object has no attribute '{attribute}'")]
    NoAttribute { type_name: String, attribute: String },

    #[error("Index {index} out of range (size: {size})")]
    IndexOutOfRange { index: i64, size: usize },

    #[error("Key '{0}' not found")]
    KeyNotFound(String),

    #[error("Division by zero")]
    DivisionByZero,
}

impl ExprError {
    pub fn tokenize(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tokenize {
            expression: expression.into(),
            message: message.into(),
        }
    }

    pub fn parse(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            expression: expression.into(),
            message: message.into(),
        }
    }

    pub fn unsafe_expr(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unsafe {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Function {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn no_attribute(type_name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::NoAttribute {
            type_name: type_name.into(),
            attribute: attribute.into(),
        }
    }

    /// True for errors raised before any evaluation happened.
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            ExprError::Tokenize { .. } | ExprError::Parse { .. } | ExprError::Unsafe { .. }
        )
    }
}
