use crate::options::CompileOptions;
use qweb_expr::ExprError;
use qweb_traits::CollaboratorError;
use thiserror::Error;

/// The structured error surfaced by compilation and rendering.
#[derive(Error, Debug)]
pub enum QWebError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Could not parse template '{reference}': {message}")]
    Parse { reference: String, message: String },

    #[error("Invalid directive usage: {0}")]
    Directive(String),

    #[error("Expression error: {0}")]
    Expression(ExprError),

    #[error("Unsafe expression rejected: {0}")]
    Unsafe(ExprError),

    #[error("Invalid render values: {0}")]
    Values(String),

    #[error("Template '{0}' requires code generation")]
    CodeFound(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Error while compiling template '{reference}'{}: {source}", fmt_path(.path))]
    Compile {
        reference: String,
        path: Option<String>,
        options: Box<CompileOptions>,
        source: Box<QWebError>,
    },

    #[error("Error while rendering template '{reference}' at {path} (line {line}): {source}")]
    Render {
        reference: String,
        path: String,
        line: usize,
        source: Box<QWebError>,
    },
}

fn fmt_path(path: &Option<String>) -> String {
    path.as_ref()
        .map(|p| format!(" at {}", p))
        .unwrap_or_default()
}

impl QWebError {
    pub fn parse(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            reference: reference.into(),
            message: message.into(),
        }
    }

    pub fn directive(msg: impl Into<String>) -> Self {
        Self::Directive(msg.into())
    }

    pub fn values(msg: impl Into<String>) -> Self {
        Self::Values(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// The innermost error, looking through compile and render wrappers.
    pub fn root_cause(&self) -> &QWebError {
        match self {
            Self::Compile { source, .. } | Self::Render { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self, Self::Compile { .. } | Self::Render { .. })
    }
}

impl From<ExprError> for QWebError {
    fn from(err: ExprError) -> Self {
        match err {
            ExprError::Unsafe { .. } => Self::Unsafe(err),
            other => Self::Expression(other),
        }
    }
}
