//! Error types for gridsite-core.

use thiserror::Error;

/// Result type alias for gridsite operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
///
/// Every variant is a flavour of invalid input. Storage failures live in
/// `gridsite-io`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed or out-of-domain input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Geographic coordinate outside the valid domain.
    #[error("invalid coordinate: ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// Spatial index requested over an empty site table.
    #[error("site coordinate table is empty")]
    EmptySiteTable,

    /// Metadata column lookup failed.
    #[error("{0} is not a valid column in meta")]
    MissingColumn(String),

    /// Timestamp string that none of the supported formats accept.
    #[error("unparseable timestamp: {0:?}")]
    InvalidTimestamp(String),
}
