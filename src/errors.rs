//! Centralized error handling for OceanReduce
//!
//! Every fallible operation in the crate returns [`Result`], carrying a
//! [`ReduceError`]. Most variants are fatal to the call that raised them;
//! [`ReduceError::MissingVariable`] is a signal that batch drivers downgrade
//! to a skip-with-warning.

use thiserror::Error;

/// Main error type for OceanReduce operations
#[derive(Debug, Error)]
pub enum ReduceError {
    /// Two arrays cannot be aligned or broadcast against each other
    #[error("shape mismatch in {context}: axis '{axis}' has length {found}, expected {expected}")]
    ShapeMismatch {
        context: String,
        axis: String,
        expected: usize,
        found: usize,
    },

    /// A physical bound excluded every index along an axis
    #[error("no levels along '{axis}' satisfy depth <= {bound} m")]
    EmptySelection { axis: String, bound: f64 },

    /// Requested variable is not present in the dataset
    #[error("variable '{var}' not found in dataset")]
    MissingVariable { var: String },

    /// A time-like or depth-like axis could not be identified
    #[error("no {role} axis found in {context}")]
    MissingDimension { role: String, context: String },

    /// Array construction or indexing error
    #[error("invalid array: {message}")]
    InvalidArray { message: String },

    /// Weight fields must be non-negative
    #[error("negative weight {value} in {context}")]
    InvalidWeight { context: String, value: f64 },

    /// Configuration could not be interpreted
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Thread pool configuration error
    #[error("thread pool error: {0}")]
    ThreadPoolError(String),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Array shape error raised by ndarray
    #[error("array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),
}

impl ReduceError {
    /// Shorthand for a [`ReduceError::ShapeMismatch`].
    pub fn shape_mismatch(
        context: impl Into<String>,
        axis: impl Into<String>,
        expected: usize,
        found: usize,
    ) -> Self {
        ReduceError::ShapeMismatch {
            context: context.into(),
            axis: axis.into(),
            expected,
            found,
        }
    }

    /// Shorthand for a [`ReduceError::InvalidArray`].
    pub fn invalid(message: impl Into<String>) -> Self {
        ReduceError::InvalidArray {
            message: message.into(),
        }
    }

    /// `false` only for signals that should not abort the enclosing call.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ReduceError::MissingVariable { .. })
    }
}

/// Result type alias for OceanReduce operations
pub type Result<T> = std::result::Result<T, ReduceError>;
