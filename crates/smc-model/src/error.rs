//! Error types for model loading and validation.

/// Errors that can occur while loading or validating a statechart model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// I/O error reading the input document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input document is not well-formed YAML (or has the wrong shape).
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Two decisions share a name after flattening.
    #[error("duplicate decision name '{name}' in state '{path}'")]
    DuplicateDecision {
        /// The colliding decision name.
        name: String,
        /// Display path of the state that declared the duplicate.
        path: String,
    },

    /// A well-formedness rule was violated.
    #[error("{path}: {message}")]
    Validation {
        /// Display path of the offending state or transition.
        path: String,
        /// Which rule was violated and how.
        message: String,
    },
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
