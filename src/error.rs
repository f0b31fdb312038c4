//! Error taxonomy for the hopper and its collaborators.
//!
//! Missing columns are deliberately absent: a predicate whose columns are not
//! present yet stays pending and is never reported as a failure.

use arrow::{datatypes::DataType, error::ArrowError};
use thiserror::Error;

use crate::codec::FilterFormat;

/// Failures raised while evaluating a predicate against a record batch.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The predicate references a column the batch does not have.
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    /// Operand types cannot be compared with each other.
    #[error("type mismatch for column '{column}': {column_type:?} cannot be compared with {other}")]
    TypeMismatch {
        /// Column whose type rejected the comparison.
        column: String,
        /// Arrow type of that column.
        column_type: DataType,
        /// Description of the other operand.
        other: String,
    },
    /// The operation is not defined for the operand's type.
    #[error("{op} is not supported for column '{column}' of type {data_type:?}")]
    Unsupported {
        /// Operation name.
        op: &'static str,
        /// Column the operation was applied to.
        column: String,
        /// Arrow type of that column.
        data_type: DataType,
    },
    /// An Arrow kernel failed (including strict literal casts).
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Failures raised while encoding or decoding pending filters.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// An item does not match the declared format.
    #[error("filter #{index} is {actual}-encoded, expected {expected}")]
    FormatMismatch {
        /// Position of the offending item.
        index: usize,
        /// Format the caller declared.
        expected: FilterFormat,
        /// Format the item actually carries.
        actual: FilterFormat,
    },
    /// Binary payload could not be encoded or decoded.
    #[error("filter #{index} binary codec failed: {source}")]
    Binary {
        /// Position of the offending item.
        index: usize,
        /// Underlying bincode failure.
        source: bincode::Error,
    },
    /// JSON payload could not be encoded or decoded.
    #[error("filter #{index} json codec failed: {source}")]
    Json {
        /// Position of the offending item.
        index: usize,
        /// Underlying serde_json failure.
        source: serde_json::Error,
    },
    /// The predicate holds a value the format cannot represent.
    #[error("filter #{index} cannot be encoded as {format}: {reason}")]
    Unsupported {
        /// Position of the offending item.
        index: usize,
        /// Requested format.
        format: FilterFormat,
        /// Why the predicate was rejected.
        reason: String,
    },
    /// A schema metadata entry held malformed content.
    #[error("schema metadata entry '{key}' is malformed: {source}")]
    Metadata {
        /// Metadata key.
        key: &'static str,
        /// Underlying serde_json failure.
        source: serde_json::Error,
    },
}

/// Failures raised by frame-deriving operations.
#[derive(Debug, Error)]
pub enum FrameError {
    /// A named column does not exist in the frame.
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    /// A new column's length differs from the frame's row count.
    #[error("column '{column}' has {actual} rows, frame has {expected}")]
    LengthMismatch {
        /// Column being added.
        column: String,
        /// Row count of the frame.
        expected: usize,
        /// Length of the supplied array.
        actual: usize,
    },
    /// Arrow rejected the batch construction.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Crate-level error returned by hopper operations.
#[derive(Debug, Error)]
pub enum HopperError {
    /// A ready predicate failed inside the engine. Fatal to the current call.
    #[error("applying `{predicate}` failed: {source}")]
    Apply {
        /// Display form of the predicate that failed.
        predicate: String,
        /// Engine failure.
        source: EvalError,
    },
    /// Encoding or decoding of pending filters failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// A frame operation failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// A metadata lookup named an entry that does not exist.
    #[error("attribute not found: '{name}'")]
    AttributeNotFound {
        /// Name that was looked up.
        name: String,
    },
}
