//! Payload codec.
//!
//! Two paths: tensors as raw little-endian bytes, everything else as an
//! opaque object blob. The [`TensorLookup`] pre-decodes a call's tensors.

pub mod lookup;
pub mod object;
pub mod tensor;

pub use self::lookup::TensorLookup;
pub use self::object::{decode_object, encode_object};
pub use self::tensor::{decode_tensor, encode_tensor};

use crate::domain::{CodecError, Payload, SerializedObject};

impl Payload {
    /// Wraps an object tree as an opaque object payload.
    pub fn from_object(object: &SerializedObject) -> Result<Self, CodecError> {
        Ok(Payload::Object {
            data: encode_object(object)?,
        })
    }

    /// Reads back the object tree of an object payload. Tensor payloads come
    /// back as `SerializedObject::Tensor`.
    pub fn to_object(&self) -> Result<SerializedObject, CodecError> {
        match self {
            Payload::Tensor(tensor) => Ok(SerializedObject::Tensor(tensor.clone())),
            Payload::Object { data } => decode_object(data),
        }
    }
}
