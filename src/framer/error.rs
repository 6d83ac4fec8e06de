//! Framer error types
//!
//! Defines all errors that can occur while building frames, resolving
//! channels, and driving an iterator over a stream.

use crate::channel::LabeledBy;
use crate::telem::DataType;
use thiserror::Error;

/// Errors that can occur in the framer, transport, and iterator layers
#[derive(Error, Debug)]
pub enum FramerError {
    /// Parallel key and array sequences differ in length
    #[error("Structural mismatch: {keys} keys but {arrays} arrays")]
    StructuralMismatch { keys: usize, arrays: usize },

    /// Frames labelled by keys and by names cannot be combined
    #[error("Label mismatch: frame is labelled by {expected} but got {actual}")]
    LabelMismatch {
        expected: LabeledBy,
        actual: LabeledBy,
    },

    /// Channel resolution failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or out-of-order response
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The remote cursor rejected a command with an error
    #[error("Remote error ({kind}): {message}")]
    Remote { kind: String, message: String },

    /// The underlying stream failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A series was decoded as the wrong sample type
    #[error("Data type mismatch: expected {expected}, got {actual}")]
    DataTypeMismatch {
        expected: DataType,
        actual: DataType,
    },

    /// A series buffer does not match its declared shape
    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    /// The stream has already been closed
    #[error("Stream closed")]
    Closed,
}

impl From<serde_json::Error> for FramerError {
    fn from(err: serde_json::Error) -> Self {
        FramerError::Serialization(err.to_string())
    }
}

/// Result type alias for framer operations
pub type FramerResult<T> = Result<T, FramerError>;
