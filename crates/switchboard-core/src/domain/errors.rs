//! Errors - codec failures and their status classification.

use thiserror::Error;

use super::payload::DType;
use super::status::{Status, StatusCode};

/// CodecError covers everything that can go wrong while moving values
/// between wire payloads and native values.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("tensor has {actual} data bytes, expected {expected} for dtype {dtype} and shape {shape:?}")]
    TensorSize {
        dtype: DType,
        shape: Vec<u64>,
        expected: usize,
        actual: usize,
    },

    #[error("tensor shape {shape:?} is too large")]
    ShapeOverflow { shape: Vec<u64> },

    #[error("tensor shape {shape:?} holds {expected} elements but {actual} were given")]
    ElementCount {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("payloads sharing tensor reference {0} disagree on dtype or shape")]
    ConflictingReference(u32),

    #[error("tensor at argument position {0} is missing from the call lookup")]
    MissingTensor(usize),

    #[error("object payload is corrupt: {0}")]
    CorruptObject(#[source] serde_json::Error),

    #[error("dict has {keys} keys but {values} values")]
    DictMismatch { keys: usize, values: usize },

    #[error("non-finite float {0} cannot be serialized")]
    NonFinite(f64),

    #[error("object not serializable: {0}")]
    Unserializable(String),

    #[error("value nesting exceeds {0} levels")]
    TooDeep(usize),
}

impl CodecError {
    /// Structural corruption is `Internal`; anything the caller could fix by
    /// sending different values is `InvalidArgument`.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CodecError::MissingTensor(_)
            | CodecError::CorruptObject(_)
            | CodecError::DictMismatch { .. } => StatusCode::Internal,
            _ => StatusCode::InvalidArgument,
        }
    }
}

impl From<CodecError> for Status {
    fn from(err: CodecError) -> Self {
        Status::new(err.status_code(), err.to_string())
    }
}
