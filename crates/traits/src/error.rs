use thiserror::Error;

/// Error type for calls into external collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Failed to load template '{name}': {message}")]
    LoadFailed { name: String, message: String },

    #[error("No converter registered for type '{0}'")]
    MissingConverter(String),

    #[error("Converter '{type_name}' failed: {message}")]
    Converter { type_name: String, message: String },

    #[error("Asset bundle '{bundle}' error: {message}")]
    Asset { bundle: String, message: String },

    #[error("I/O error: {0}")]
    Io(String),
}

impl CollaboratorError {
    pub fn load_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LoadFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn converter(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Converter {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn asset(bundle: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Asset {
            bundle: bundle.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        CollaboratorError::Io(err.to_string())
    }
}
