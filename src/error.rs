//! Error types returned by index operations.

use thiserror::Error;

use crate::hnsw::NodeId;

/// Errors that can occur while building or querying an index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HnswError {
    /// A vector's length differs from the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The index dimension.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// A construction or query parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A vector component is NaN or infinite.
    #[error("invalid value at index {index}: {value}")]
    InvalidValue {
        /// Position of the component.
        index: usize,
        /// The rejected component.
        value: f32,
    },

    /// No node with this id exists.
    #[error("node {0} not found")]
    NotFound(NodeId),

    /// The setting cannot change once the index holds a node.
    #[error("{0} cannot be changed after the first insertion")]
    ConfigurationLocked(&'static str),
}

/// Result alias for index operations.
pub type Result<T, E = HnswError> = std::result::Result<T, E>;
