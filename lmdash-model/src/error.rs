//! Error types for the `lmdash-model` crate.

use thiserror::Error;

/// Errors that can occur when talking to the model-serving API.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The server could not be reached or did not answer in time.
    #[error("Model server unavailable: {0}")]
    Unavailable(String),

    /// The server answered with an error status.
    #[error("Model server returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error detail reported by the server.
        message: String,
    },

    /// The requested model is not known to the server or the registry.
    #[error("Model '{model}' not found: {message}")]
    ModelNotFound {
        /// The requested model name.
        model: String,
        /// Error detail reported by the server.
        message: String,
    },

    /// The server answered with a body that could not be understood.
    #[error("Invalid response from model server: {0}")]
    InvalidResponse(String),

    /// A caller-supplied argument violates a precondition.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;
