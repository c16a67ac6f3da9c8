use crate::cayenne_lpp::LppError;
use crate::script::ExecutionError;
use crate::structured::StructError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("no MAC payload in message")]
    NoMacPayload,

    #[error("invalid input: {0}")]
    InvalidInput(#[source] StructError),

    #[error("invalid output: {0}")]
    InvalidOutput(#[source] OutputError),

    #[error("invalid output type: {0}")]
    InvalidOutputType(#[source] OutputError),

    #[error("output value {value} out of range [{low}, {high}]")]
    InvalidOutputRange { value: i64, low: i64, high: i64 },

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Cause attached to [`CodecError::InvalidOutput`] and [`CodecError::InvalidOutputType`].
#[derive(Debug, Error)]
pub enum OutputError {
    #[error(transparent)]
    Lpp(#[from] LppError),

    #[error(transparent)]
    Struct(#[from] StructError),

    #[error("expected a sequence of bytes, got {found}")]
    NotSequence { found: &'static str },

    #[error("element {index} is not an integer: got {found}")]
    NotInteger { index: usize, found: &'static str },

    #[error("expected a map, got {found}")]
    NotMap { found: &'static str },

    #[error("value cannot be represented as a document: {0}")]
    Unrepresentable(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
