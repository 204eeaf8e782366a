//! Status - the fixed outcome vocabulary returned instead of a result.
//!
//! Every failure the core produces ends up here: registry errors from the
//! router, codec errors from payload decoding, and runtime failures classified
//! by the error mapper.

use serde::{Deserialize, Serialize};
use std::fmt;

/// StatusCode classifies a failed call.
///
/// Serialized as SCREAMING_SNAKE_CASE (`NOT_FOUND`, `INVALID_ARGUMENT`, ...)
/// so the names line up with what RPC transports usually carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    AlreadyExists,
    NotFound,
    InvalidArgument,
    OutOfRange,
    ResourceExhausted,
    Unimplemented,
    Aborted,
    Internal,
    Unknown,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::OutOfRange => "OUT_OF_RANGE",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::Unimplemented => "UNIMPLEMENTED",
            StatusCode::Aborted => "ABORTED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status is `{code, message}`, returned by value in place of a `CallResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StatusCode::AlreadyExists, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }
}
