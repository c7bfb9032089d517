//! Errors raised while decoding or validating a typed request.

/// Decode, validation, or encode failure for a typed request body.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The body is not valid JSON for the operation's input shape.
    #[error("cannot decode {operation} request: {source}")]
    Decode {
        /// Operation whose input shape was expected.
        operation: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The body decoded but violates a constraint of the operation.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The typed value could not be encoded back to JSON.
    #[error("cannot encode {operation} request: {source}")]
    Encode {
        /// Operation being encoded.
        operation: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ModelError {
    /// Build a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
