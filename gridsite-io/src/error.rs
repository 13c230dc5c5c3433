//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested resource or variable does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Authorization failure or unsupported location.
    #[error("access denied: {0}")]
    Access(String),

    /// A slice or whole-variable read failed.
    #[error("read of {variable} failed: {reason}")]
    Read { variable: String, reason: String },

    /// Variable rank does not match what the caller expects.
    #[error("{variable} has rank {actual}, expected {expected}")]
    DimensionMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },

    /// Invalid selection or request parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HDF5 library error outside of a data read.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] gridsite_core::Error),
}

impl Error {
    pub(crate) fn read(variable: &str, reason: impl std::fmt::Display) -> Self {
        Self::Read {
            variable: variable.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for invalid-input errors, including core ones.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::CoreError(_))
    }
}
