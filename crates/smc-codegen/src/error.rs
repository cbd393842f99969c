//! Code generation errors.

use thiserror::Error;

/// Errors that can occur while planning or emitting code.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// The requested target language is not supported.
    #[error("unsupported language '{name}'")]
    UnknownLanguage { name: String },

    /// A backend needs a context field attribute the model does not provide.
    #[error("context field '{field}' has no type")]
    MissingFieldType { field: String },

    /// The planner hit an inconsistency the validator should have caught.
    #[error("{path}: {message}")]
    Plan { path: String, message: String },
}

/// Result type for code generation.
pub type Result<T> = std::result::Result<T, CodegenError>;
