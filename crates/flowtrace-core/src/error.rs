//! Error types for flowtrace.
//!
//! Only fatal conditions are errors. Degraded-precision outcomes such as a
//! tripped resource guard are reported as
//! [`ProcessingNote`](crate::notes::ProcessingNote)s instead.

use thiserror::Error;

/// Result type alias using `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can abort an analysis run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A transaction record violated the input contract.
    ///
    /// Fatal for the whole batch; raised before any graph work begins.
    #[error("Invalid input at row {row}, field `{field}`: {reason}")]
    InputError {
        /// Zero-based row index in the submitted batch.
        row: usize,
        /// Contract field that failed.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// The graph builder produced an inconsistent structure.
    #[error("Internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The blocking analysis task failed to complete.
    #[error("Analysis task failed: {0}")]
    TaskFailed(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EngineError {
    /// Create an input contract error.
    #[must_use]
    pub fn input(row: usize, field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InputError {
            row,
            field,
            reason: reason.into(),
        }
    }

    /// Create an internal invariant violation.
    #[must_use]
    pub fn invariant(msg: impl Into<String>) -> Self {
        EngineError::InternalInvariantViolation(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::ConfigError(msg.into())
    }

    /// Returns true if the error was caused by the submitted data rather
    /// than by the engine or its environment.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, EngineError::InputError { .. })
    }

    /// Returns true if the error indicates a bug in the engine itself.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            EngineError::InternalInvariantViolation(_) | EngineError::TaskFailed(_)
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::SerializationError(err.to_string())
    }
}
