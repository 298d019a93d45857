use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown {field} tag: {value:?}")]
    UnknownTag { field: &'static str, value: String },

    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(String),
}
