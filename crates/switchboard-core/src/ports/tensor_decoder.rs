//! TensorDecoder port - turns raw tensor payloads into typed tensors.
//!
//! The tensor lookup goes through this trait instead of calling the codec
//! directly, so the decode path can be swapped or instrumented (tests count
//! decodes through it).

use crate::codec::tensor::decode_tensor;
use crate::domain::{CodecError, Tensor, TensorPayload};

pub trait TensorDecoder: Send + Sync {
    fn decode(&self, payload: &TensorPayload) -> Result<Tensor, CodecError>;
}

/// Default decoder: little-endian, row-major raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LittleEndianDecoder;

impl TensorDecoder for LittleEndianDecoder {
    fn decode(&self, payload: &TensorPayload) -> Result<Tensor, CodecError> {
        decode_tensor(payload)
    }
}
